//! # Configuration Model
//!
//! Typed representation of `~/.moin/config.toml`. Every type here validates
//! itself on construction and on deserialization, so a [`Config`] value that
//! exists is always well-formed:
//!
//! - [`WikiUrl`] is an absolute `http`/`https` URL ending in exactly one `/`.
//! - [`ServerConfig::timeout`] is within `1..=300` seconds.
//! - [`McpSettings::port`] is within `1024..=65535`.
//!
//! Cross-references (e.g. `settings.default_server` naming an entry in
//! `servers`) are *not* checked here; they are resolved lazily by
//! [`crate::config::ConfigStore::get_wiki_config`].

use crate::error::{MoinError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Query string that turns a wiki base URL into its XML-RPC endpoint.
pub const RPC_ACTION_SUFFIX: &str = "?action=xmlrpc2";

pub const DEFAULT_TIMEOUT: u32 = 30;
pub const MIN_TIMEOUT: u32 = 1;
pub const MAX_TIMEOUT: u32 = 300;

pub const DEFAULT_MCP_PORT: u16 = 8000;
pub const MIN_MCP_PORT: u16 = 1024;

fn default_format() -> String {
    "markdown".to_string()
}

fn default_editor() -> String {
    "vim".to_string()
}

fn default_true() -> bool {
    true
}

fn default_mcp_host() -> String {
    "localhost".to_string()
}

/// An absolute wiki base URL, always normalized to end with a single `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WikiUrl(String);

impl WikiUrl {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let parsed = Url::parse(raw)
            .map_err(|e| MoinError::Validation(format!("invalid URL '{}': {}", raw, e)))?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(MoinError::Validation(format!(
                "invalid URL '{}': scheme must be http or https",
                raw
            )));
        }
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(MoinError::Validation(format!(
                "invalid URL '{}': missing host",
                raw
            )));
        }

        // The RPC action is appended as the query string.
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(MoinError::Validation(format!(
                "invalid URL '{}': base URL must not carry a query or fragment",
                raw
            )));
        }

        let serialized: String = parsed.into();
        Ok(Self(format!("{}/", serialized.trim_end_matches('/'))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for WikiUrl {
    type Error = MoinError;

    fn try_from(value: String) -> Result<Self> {
        WikiUrl::parse(&value)
    }
}

impl From<WikiUrl> for String {
    fn from(url: WikiUrl) -> Self {
        url.0
    }
}

impl fmt::Display for WikiUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One configured wiki connection, stored under `[servers.<alias>]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ServerRecord", into = "ServerRecord")]
pub struct ServerConfig {
    /// Display name; filled in with the alias on resolution when unset.
    pub name: Option<String>,
    pub url: WikiUrl,
    pub username: String,
    pub access_token: String,
    pub token_expires: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,
    pub verify_ssl: bool,
    /// Request timeout in seconds (1..=300)
    pub timeout: u32,
}

impl ServerConfig {
    pub fn new(url: &str, username: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: None,
            url: WikiUrl::parse(url)?,
            username: username.into(),
            access_token: access_token.into(),
            token_expires: None,
            created_at: None,
            last_used: None,
            verify_ssl: true,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_timeout(mut self, timeout: i64) -> Result<Self> {
        self.timeout = validate_timeout(timeout)?;
        Ok(self)
    }

    /// The XML-RPC endpoint for this wiki.
    pub fn rpc_endpoint(&self) -> String {
        format!("{}{}", self.url, RPC_ACTION_SUFFIX)
    }

    pub fn has_token(&self) -> bool {
        !self.access_token.trim().is_empty()
    }

    pub fn token_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.token_expires.is_some_and(|expires| expires <= now)
    }
}

pub fn validate_timeout(timeout: i64) -> Result<u32> {
    if timeout < i64::from(MIN_TIMEOUT) || timeout > i64::from(MAX_TIMEOUT) {
        return Err(MoinError::Validation(format!(
            "timeout must be between {} and {} seconds, got {}",
            MIN_TIMEOUT, MAX_TIMEOUT, timeout
        )));
    }
    Ok(timeout as u32)
}

/// On-disk shape of a server entry. Every field is optional here so that
/// missing or malformed values surface as validation errors with a useful
/// message instead of a generic deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ServerRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_expires: Option<toml::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<toml::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_used: Option<toml::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    verify_ssl: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout: Option<i64>,
}

impl TryFrom<ServerRecord> for ServerConfig {
    type Error = MoinError;

    fn try_from(record: ServerRecord) -> Result<Self> {
        let url = record.url.ok_or_else(|| missing_field("url"))?;
        let username = record.username.ok_or_else(|| missing_field("username"))?;
        let access_token = record
            .access_token
            .ok_or_else(|| missing_field("access_token"))?;

        Ok(Self {
            name: record.name,
            url: WikiUrl::parse(&url)?,
            username,
            access_token,
            token_expires: record
                .token_expires
                .map(|v| parse_timestamp("token_expires", &v))
                .transpose()?,
            created_at: record
                .created_at
                .map(|v| parse_timestamp("created_at", &v))
                .transpose()?,
            last_used: record
                .last_used
                .map(|v| parse_timestamp("last_used", &v))
                .transpose()?,
            verify_ssl: record.verify_ssl.unwrap_or(true),
            timeout: validate_timeout(record.timeout.unwrap_or(i64::from(DEFAULT_TIMEOUT)))?,
        })
    }
}

impl From<ServerConfig> for ServerRecord {
    fn from(server: ServerConfig) -> Self {
        let stamp = |ts: Option<DateTime<Utc>>| ts.map(|t| toml::Value::String(t.to_rfc3339()));
        Self {
            name: server.name,
            url: Some(server.url.into()),
            username: Some(server.username),
            access_token: Some(server.access_token),
            token_expires: stamp(server.token_expires),
            created_at: stamp(server.created_at),
            last_used: stamp(server.last_used),
            verify_ssl: Some(server.verify_ssl),
            timeout: Some(i64::from(server.timeout)),
        }
    }
}

fn missing_field(field: &str) -> MoinError {
    MoinError::Validation(format!("server entry is missing required field '{}'", field))
}

/// Accepts RFC 3339 strings, naive ISO-8601 strings (taken as UTC), and
/// native TOML datetimes.
fn parse_timestamp(field: &str, value: &toml::Value) -> Result<DateTime<Utc>> {
    let raw = match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Datetime(dt) => dt.to_string(),
        other => {
            return Err(MoinError::Validation(format!(
                "{} must be a timestamp, got {}",
                field,
                other.type_str()
            )))
        }
    };

    parse_timestamp_str(raw.trim()).ok_or_else(|| {
        MoinError::Validation(format!("{} is not a valid timestamp: '{}'", field, raw))
    })
}

pub(crate) fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Global defaults, stored under `[settings]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub default_server: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_editor")]
    pub editor: String,
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
}

impl Settings {
    pub fn new(default_server: impl Into<String>) -> Self {
        Self {
            default_server: default_server.into(),
            format: default_format(),
            editor: default_editor(),
            cache_enabled: true,
        }
    }
}

/// Optional `[mcp]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "McpRecord", into = "McpRecord")]
pub struct McpSettings {
    pub host: String,
    pub port: u16,
    pub default_server: String,
}

impl McpSettings {
    pub fn new(host: impl Into<String>, port: i64, default_server: impl Into<String>) -> Result<Self> {
        Ok(Self {
            host: host.into(),
            port: validate_port(port)?,
            default_server: default_server.into(),
        })
    }
}

fn validate_port(port: i64) -> Result<u16> {
    if port < i64::from(MIN_MCP_PORT) || port > i64::from(u16::MAX) {
        return Err(MoinError::Validation(format!(
            "mcp port must be between {} and {}, got {}",
            MIN_MCP_PORT,
            u16::MAX,
            port
        )));
    }
    Ok(port as u16)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct McpRecord {
    #[serde(default = "default_mcp_host")]
    host: String,
    #[serde(default)]
    port: Option<i64>,
    default_server: String,
}

impl TryFrom<McpRecord> for McpSettings {
    type Error = MoinError;

    fn try_from(record: McpRecord) -> Result<Self> {
        McpSettings::new(
            record.host,
            record.port.unwrap_or(i64::from(DEFAULT_MCP_PORT)),
            record.default_server,
        )
    }
}

impl From<McpSettings> for McpRecord {
    fn from(mcp: McpSettings) -> Self {
        Self {
            host: mcp.host,
            port: Some(i64::from(mcp.port)),
            default_server: mcp.default_server,
        }
    }
}

/// Root of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub settings: Settings,
    #[serde(default)]
    pub servers: BTreeMap<String, ServerConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp: Option<McpSettings>,
}

impl Config {
    pub fn new(default_server: impl Into<String>) -> Self {
        Self {
            settings: Settings::new(default_server),
            servers: BTreeMap::new(),
            mcp: None,
        }
    }

    /// Insert or replace the entry for `alias`.
    pub fn upsert_server(&mut self, alias: impl Into<String>, server: ServerConfig) {
        self.servers.insert(alias.into(), server);
    }

    pub fn aliases(&self) -> Vec<String> {
        self.servers.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_URL: &str = "https://example.com/";

    fn server_table(extra: &str) -> String {
        format!(
            "name = \"testserver\"\nurl = \"{}\"\nusername = \"testuser\"\naccess_token = \"test-token-123\"\n{}",
            VALID_URL, extra
        )
    }

    fn parse_server(toml_src: &str) -> std::result::Result<ServerConfig, toml::de::Error> {
        toml::from_str(toml_src)
    }

    #[test]
    fn server_config_minimal_defaults() {
        let server = parse_server(&server_table("")).unwrap();
        assert_eq!(server.name.as_deref(), Some("testserver"));
        assert_eq!(server.url.as_str(), VALID_URL);
        assert_eq!(server.username, "testuser");
        assert_eq!(server.access_token, "test-token-123");
        assert!(server.verify_ssl);
        assert_eq!(server.timeout, 30);
        assert!(server.created_at.is_none());
    }

    #[test]
    fn url_normalization_adds_single_trailing_slash() {
        for raw in [
            "https://example.com",
            "https://example.com/",
            "https://example.com/path",
            "https://example.com/path/",
            "https://example.com:8080/",
            "http://wiki.local/moin//",
        ] {
            let url = WikiUrl::parse(raw).unwrap();
            assert!(url.as_str().ends_with('/'), "{}", url);
            assert!(!url.as_str().ends_with("//"), "{}", url);
        }
        assert_eq!(
            WikiUrl::parse("https://example.com/path").unwrap().as_str(),
            "https://example.com/path/"
        );

        for raw in [
            "https://wiki.example.org/moin?lang=en",
            "https://wiki.example.org/moin/?",
            "https://wiki.example.org/moin#top",
        ] {
            let err = WikiUrl::parse(raw).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Validation, "{}", raw);
        }
    }

    #[test]
    fn url_normalization_is_idempotent() {
        let once = WikiUrl::parse("https://example.com/wiki").unwrap();
        let twice = WikiUrl::parse(once.as_str()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn invalid_urls_fail_validation() {
        for raw in ["not-a-url", "ftp://example.com/", ""] {
            let err = WikiUrl::parse(raw).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Validation, "{}", raw);
        }
    }

    #[test]
    fn timeout_bounds() {
        for (timeout, valid) in [(1, true), (30, true), (300, true), (0, false), (301, false), (-1, false)] {
            let built = ServerConfig::new(VALID_URL, "u", "t")
                .unwrap()
                .with_timeout(timeout);
            if valid {
                assert_eq!(built.unwrap().timeout as i64, timeout);
            } else {
                assert_eq!(
                    built.unwrap_err().kind(),
                    crate::error::ErrorKind::Validation
                );
            }

            let parsed = parse_server(&server_table(&format!("timeout = {}\n", timeout)));
            assert_eq!(parsed.is_ok(), valid, "timeout {}", timeout);
        }
    }

    #[test]
    fn optional_fields_parse() {
        let server = parse_server(&server_table(
            "token_expires = \"2030-01-01T00:00:00\"\ncreated_at = \"2024-05-01T10:00:00+02:00\"\nlast_used = 2024-06-01T12:30:00Z\nverify_ssl = false\ntimeout = 15\n",
        ))
        .unwrap();

        assert_eq!(
            server.token_expires.unwrap().to_rfc3339(),
            "2030-01-01T00:00:00+00:00"
        );
        assert_eq!(
            server.created_at.unwrap().to_rfc3339(),
            "2024-05-01T08:00:00+00:00"
        );
        assert_eq!(
            server.last_used.unwrap().to_rfc3339(),
            "2024-06-01T12:30:00+00:00"
        );
        assert!(!server.verify_ssl);
        assert_eq!(server.timeout, 15);
    }

    #[test]
    fn invalid_timestamp_is_rejected() {
        let err = parse_server(&server_table("token_expires = \"not-a-datetime\"\n")).unwrap_err();
        assert!(err.to_string().contains("token_expires"));
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        for field in ["url", "username", "access_token"] {
            let src: String = server_table("")
                .lines()
                .filter(|line| !line.starts_with(field))
                .map(|line| format!("{}\n", line))
                .collect();
            let err = parse_server(&src).unwrap_err();
            assert!(err.to_string().contains(field), "{}", err);
        }
    }

    #[test]
    fn name_is_optional() {
        let src: String = server_table("")
            .lines()
            .filter(|line| !line.starts_with("name"))
            .map(|line| format!("{}\n", line))
            .collect();
        let server = parse_server(&src).unwrap();
        assert!(server.name.is_none());
    }

    #[test]
    fn settings_defaults() {
        let settings: Settings = toml::from_str("default_server = \"testserver\"").unwrap();
        assert_eq!(settings, Settings::new("testserver"));
        assert_eq!(settings.format, "markdown");
        assert_eq!(settings.editor, "vim");
        assert!(settings.cache_enabled);
    }

    #[test]
    fn settings_require_default_server() {
        assert!(toml::from_str::<Settings>("format = \"html\"").is_err());
    }

    #[test]
    fn mcp_port_bounds() {
        for (port, valid) in [(1024, true), (8000, true), (65535, true), (1023, false), (65536, false), (0, false)] {
            let src = format!("host = \"localhost\"\nport = {}\ndefault_server = \"x\"", port);
            let parsed = toml::from_str::<McpSettings>(&src);
            assert_eq!(parsed.is_ok(), valid, "port {}", port);
            if valid {
                assert_eq!(i64::from(parsed.unwrap().port), port);
            }
        }
    }

    #[test]
    fn mcp_defaults() {
        let mcp: McpSettings = toml::from_str("default_server = \"x\"").unwrap();
        assert_eq!(mcp.host, "localhost");
        assert_eq!(mcp.port, 8000);
    }

    #[test]
    fn config_serializes_with_rfc3339_timestamps() {
        let mut config = Config::new("wiki");
        let mut server = ServerConfig::new("https://wiki.example.org", "alice", "tok")
            .unwrap()
            .with_name("wiki");
        server.created_at = parse_timestamp_str("2024-01-02T03:04:05Z");
        config.upsert_server("wiki", server);

        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("[settings]"));
        assert!(text.contains("[servers.wiki]"));
        assert!(text.contains("url = \"https://wiki.example.org/\""));
        assert!(text.contains("created_at = \"2024-01-02T03:04:05+00:00\""));

        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn rpc_endpoint_appends_action() {
        let server = ServerConfig::new("https://wiki.example.org/moin", "u", "t").unwrap();
        assert_eq!(
            server.rpc_endpoint(),
            "https://wiki.example.org/moin/?action=xmlrpc2"
        );
    }

    #[test]
    fn token_expiry() {
        let mut server = ServerConfig::new(VALID_URL, "u", "t").unwrap();
        let now = Utc::now();
        assert!(!server.token_expired_at(now));
        server.token_expires = Some(now - chrono::Duration::hours(1));
        assert!(server.token_expired_at(now));
    }
}
