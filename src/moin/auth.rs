use crate::client::WikiClient;
use crate::config::ConfigStore;
use crate::error::Result;
use crate::model::{Config, ServerConfig, WikiUrl, DEFAULT_TIMEOUT};
use crate::rpc::Transport;
use chrono::Utc;
use std::time::Duration;
use tracing::info;

/// What the user supplies to register (or re-register) a server.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub alias: String,
    pub url: String,
    pub username: String,
    pub password: String,
}

/// Timeout and TLS verification for the token request. An alias that is
/// already configured keeps its own; a new one gets the defaults.
pub fn connection_options(config: &Config, alias: &str) -> (Duration, bool) {
    match config.servers.get(alias) {
        Some(previous) => (
            Duration::from_secs(u64::from(previous.timeout)),
            previous.verify_ssl,
        ),
        None => (Duration::from_secs(u64::from(DEFAULT_TIMEOUT)), true),
    }
}

/// Obtain a token for `request` through `client` and store it under
/// `request.alias`. A missing config file is created with this alias as the
/// default server; an existing entry keeps its `created_at` and settings such
/// as timeout.
pub fn authenticate<T: Transport>(
    store: &ConfigStore,
    client: &WikiClient<T>,
    request: &AuthRequest,
) -> Result<ServerConfig> {
    let url = WikiUrl::parse(&request.url)?;
    let token = client.get_auth_token(&request.username, &request.password)?;

    let mut config = store.load_or_default(&request.alias)?;
    let now = Utc::now();
    let previous = config.servers.get(&request.alias);

    let server = ServerConfig {
        name: Some(request.alias.clone()),
        url,
        username: request.username.clone(),
        access_token: token,
        token_expires: None,
        created_at: Some(previous.and_then(|p| p.created_at).unwrap_or(now)),
        last_used: Some(now),
        verify_ssl: previous.map_or(true, |p| p.verify_ssl),
        timeout: previous.map_or(DEFAULT_TIMEOUT, |p| p.timeout),
    };

    config.upsert_server(request.alias.clone(), server.clone());
    store.save_config(&config)?;
    info!(server = %request.alias, "stored access token");
    Ok(server)
}
