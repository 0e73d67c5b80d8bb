// ⚙️ Runtime configuration from environment variables

use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_DB_PATH: &str = "zapmanejo.db";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_API_VERSION: &str = "v21.0";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid ZAP_BIND_ADDR {value:?}: {source}")]
    BindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
    /// Webhook verify token; challenges are refused while unset
    pub hub_token: Option<String>,
    pub whatsapp_token: Option<String>,
    pub whatsapp_phone_number_id: Option<String>,
    pub whatsapp_api_version: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (tests pass a map)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind = non_empty("ZAP_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind
            .parse()
            .map_err(|source| ConfigError::BindAddr { value: bind.clone(), source })?;

        Ok(Config {
            db_path: non_empty("ZAP_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            bind_addr,
            hub_token: non_empty("HUB_TOKEN"),
            whatsapp_token: non_empty("WHATSAPP_TOKEN"),
            whatsapp_phone_number_id: non_empty("WHATSAPP_PHONE_NUMBER_ID"),
            whatsapp_api_version: non_empty("WHATSAPP_API_VERSION")
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
        })
    }
}
