use crate::error::ConfigError;
use serde_derive::Deserialize;
use std::str::FromStr;
use std::time::Duration;

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl AppConfig {
    pub fn log_level(&self) -> tracing::Level {
        tracing::Level::from_str(self.log_level.as_str()).unwrap_or(tracing::Level::INFO)
    }
}

pub(crate) fn load_app_config() -> Result<AppConfig, ConfigError> {
    envy::from_env::<AppConfig>().map_err(ConfigError::env_parse)
}

fn default_base_url() -> String {
    "https://192.168.100.1".to_string()
}

// support docs don't indicate that the username can be changed
fn default_username() -> String {
    "admin".to_string()
}

fn default_status_path() -> String {
    "/cmconnectionstatus.html".to_string()
}

fn default_info_path() -> String {
    "/cmswinfo.html".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    30
}

#[derive(Deserialize, Debug, Clone)]
pub struct ModemConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_username")]
    pub username: String,
    // defaults to the last 8 digits of the serial number, so it has to be provided
    pub password: Option<String>,
    #[serde(default = "default_status_path")]
    pub status_path: String,
    #[serde(default = "default_info_path")]
    pub info_path: String,
    /// OpenSSL cipher list to offer exclusively over TLS 1.2, e.g.
    /// `AES128-GCM-SHA256`.
    pub tls_cipher_suite: Option<String>,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl ModemConfig {
    /// The password, or a missing-configuration error.
    pub fn password(&self) -> Result<&str, ConfigError> {
        match self.password.as_deref() {
            Some(p) if !p.is_empty() => Ok(p),
            _ => Err(ConfigError::missing("MODEM_PASSWORD")),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

pub(crate) fn load_modem_config() -> Result<ModemConfig, ConfigError> {
    let config = envy::prefixed("MODEM_")
        .from_env::<ModemConfig>()
        .map_err(ConfigError::env_parse)?;
    if config.username.is_empty() {
        return Err(ConfigError::missing("MODEM_USERNAME"));
    }
    config.password()?;
    if config.request_timeout_seconds == 0 {
        return Err(ConfigError::invalid(
            "request_timeout_seconds",
            "must be greater than zero",
        ));
    }
    Ok(config)
}

fn default_port() -> u16 {
    8200
}

fn default_poll_interval_seconds() -> u64 {
    60
}

fn default_relogin_interval_seconds() -> u64 {
    5
}

#[derive(Deserialize, Debug, Clone)]
pub struct ExporterConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
    // short pause before logging in again when a fresh login still served the login page
    #[serde(default = "default_relogin_interval_seconds")]
    pub relogin_interval_seconds: u64,
}

impl ExporterConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn relogin_interval(&self) -> Duration {
        Duration::from_secs(self.relogin_interval_seconds)
    }
}

pub fn load_exporter_config() -> Result<ExporterConfig, ConfigError> {
    let config = envy::prefixed("METRICS_")
        .from_env::<ExporterConfig>()
        .map_err(ConfigError::env_parse)?;
    if config.poll_interval_seconds == 0 {
        return Err(ConfigError::invalid(
            "poll_interval_seconds",
            "must be greater than zero",
        ));
    }
    if config.relogin_interval_seconds == 0 {
        return Err(ConfigError::invalid(
            "relogin_interval_seconds",
            "must be greater than zero",
        ));
    }
    Ok(config)
}
