//! # Config Store
//!
//! [`ConfigStore`] owns one config file path and is the only code that reads or
//! writes it. There is no process-wide instance; the CLI builds one from
//! `--config` (or the home directory) and hands it to whatever needs it.
//!
//! ## File layout
//!
//! ```toml
//! [settings]
//! default_server = "work"
//!
//! [servers.work]
//! url = "https://wiki.example.org/"
//! username = "alice"
//! access_token = "..."
//! ```
//!
//! Older files spell server entries as `[server.work]` or with quoted dotted
//! keys (`["server.work"]`, `"server.work.url" = ...`). Those are folded into
//! `servers` on load and written back in the `servers` form on the next save.

use crate::error::{MoinError, ParseFailure, Result};
use crate::model::{Config, ServerConfig};
use directories::BaseDirs;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CONFIG_DIR_NAME: &str = ".moin";
pub const CONFIG_FILE_NAME: &str = "config.toml";

const SERVER_KEY_PREFIX: &str = "server.";
const LEGACY_SERVER_TABLE: &str = "server";
const SERVERS_TABLE: &str = "servers";

/// `<home>/.moin/config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    let dirs = BaseDirs::new().ok_or(MoinError::NoHomeDirectory)?;
    Ok(dirs.home_dir().join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_home() -> Result<Self> {
        Ok(Self::new(default_config_path()?))
    }

    pub fn config_path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read, fold legacy keys, and validate the config file.
    pub fn load_config(&self) -> Result<Config> {
        if !self.path.exists() {
            return Err(MoinError::ConfigNotFound(self.path.clone()));
        }
        debug!(path = %self.path.display(), "loading config");

        let parse_error = |source: ParseFailure| MoinError::Parse {
            path: self.path.clone(),
            source,
        };
        let content = String::from_utf8(fs::read(&self.path)?)
            .map_err(|e| parse_error(e.into()))?;
        let table: toml::Table =
            toml::from_str(&content).map_err(|e| parse_error(e.into()))?;

        let table = fold_server_keys(table)?;
        toml::Value::Table(table).try_into().map_err(|e: toml::de::Error| {
            MoinError::Validation(format!(
                "invalid configuration in {}: {}",
                self.path.display(),
                e.message()
            ))
        })
    }

    /// Like [`load_config`](Self::load_config), but a missing file yields a
    /// fresh config whose default server is `default_alias`.
    pub fn load_or_default(&self, default_alias: &str) -> Result<Config> {
        match self.load_config() {
            Err(MoinError::ConfigNotFound(_)) => Ok(Config::new(default_alias)),
            other => other,
        }
    }

    /// Overwrite the file with `config`. The write goes to a temporary file in
    /// the same directory that is then renamed over the target, so readers
    /// never observe a partially written file.
    pub fn save_config(&self, config: &Config) -> Result<()> {
        let parent = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let content = toml::to_string_pretty(config)?;

        let mut temp = tempfile::Builder::new()
            .prefix(".config.")
            .suffix(".toml.tmp")
            .tempfile_in(&parent)?;
        temp.write_all(content.as_bytes())?;
        temp.as_file().sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp.as_file()
                .set_permissions(fs::Permissions::from_mode(0o600))?;
        }

        temp.persist(&self.path).map_err(|e| e.error)?;
        info!(path = %self.path.display(), servers = config.servers.len(), "saved config");
        Ok(())
    }

    /// Resolve `alias` (or the default server) to a standalone copy of its
    /// entry, with `name` filled in from the alias when unset.
    pub fn get_wiki_config(&self, alias: Option<&str>) -> Result<ServerConfig> {
        let config = self.load_config()?;
        resolve_server(&config, alias)
    }
}

/// Look up a server entry in an already loaded config.
pub fn resolve_server(config: &Config, alias: Option<&str>) -> Result<ServerConfig> {
    let alias = alias.unwrap_or(&config.settings.default_server);
    let server = config
        .servers
        .get(alias)
        .ok_or_else(|| MoinError::ServerNotFound {
            alias: alias.to_string(),
            available: config.aliases(),
        })?;

    let mut resolved = server.clone();
    if resolved.name.is_none() {
        resolved.name = Some(alias.to_string());
    }
    Ok(resolved)
}

/// Move `server.<alias>[.<field>...]` keys and the `[server]` table under
/// `servers`, merging with entries already there.
fn fold_server_keys(mut table: toml::Table) -> Result<toml::Table> {
    let mut folded = toml::Table::new();

    let dotted: Vec<String> = table
        .keys()
        .filter(|key| key.starts_with(SERVER_KEY_PREFIX))
        .cloned()
        .collect();
    for key in dotted {
        let Some(value) = table.remove(&key) else {
            continue;
        };
        let mut segments = key[SERVER_KEY_PREFIX.len()..].split('.');
        let alias = segments.next().unwrap_or_default();
        if alias.is_empty() {
            return Err(MoinError::Validation(format!(
                "config key '{}' does not name a server",
                key
            )));
        }
        let nested = segments.rev().fold(value, |inner, field| {
            let mut wrapper = toml::Table::new();
            wrapper.insert(field.to_string(), inner);
            toml::Value::Table(wrapper)
        });
        merge_into(&mut folded, alias.to_string(), nested);
    }

    if let Some(legacy) = table.remove(LEGACY_SERVER_TABLE) {
        match legacy {
            toml::Value::Table(entries) => {
                for (alias, entry) in entries {
                    merge_into(&mut folded, alias, entry);
                }
            }
            other => {
                return Err(MoinError::Validation(format!(
                    "'{}' must be a table, got {}",
                    LEGACY_SERVER_TABLE,
                    other.type_str()
                )))
            }
        }
    }

    if folded.is_empty() {
        return Ok(table);
    }
    debug!(count = folded.len(), "folding legacy server keys");

    let servers = table
        .entry(SERVERS_TABLE)
        .or_insert(toml::Value::Table(toml::Table::new()));
    let servers = servers.as_table_mut().ok_or_else(|| {
        MoinError::Validation(format!("'{}' must be a table", SERVERS_TABLE))
    })?;
    for (alias, entry) in folded {
        merge_into(servers, alias, entry);
    }
    Ok(table)
}

fn merge_into(target: &mut toml::Table, key: String, value: toml::Value) {
    match target.get_mut(&key) {
        Some(toml::Value::Table(existing)) if value.is_table() => {
            if let toml::Value::Table(incoming) = value {
                for (k, v) in incoming {
                    merge_into(existing, k, v);
                }
            }
        }
        _ => {
            target.insert(key, value);
        }
    }
}
