//! Configuration utilities for testing.

use crate::config::{ExporterConfig, ModemConfig};

/// Builder for creating test modem configurations.
#[derive(Debug)]
pub struct TestModemConfigBuilder {
    base_url: String,
    username: String,
    password: Option<String>,
    tls_cipher_suite: Option<String>,
}

impl TestModemConfigBuilder {
    /// Creates a new test config builder with default values.
    pub fn new() -> Self {
        Self {
            base_url: "http://test.local".to_string(),
            username: "admin".to_string(),
            password: Some("test_password".to_string()),
            tls_cipher_suite: None,
        }
    }

    /// Sets the base URL, usually a mock server's.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn without_password(mut self) -> Self {
        self.password = None;
        self
    }

    pub fn with_tls_cipher_suite(mut self, suite: impl Into<String>) -> Self {
        self.tls_cipher_suite = Some(suite.into());
        self
    }

    /// Builds the modem configuration.
    pub fn build(self) -> ModemConfig {
        ModemConfig {
            base_url: self.base_url,
            username: self.username,
            password: self.password,
            status_path: "/cmconnectionstatus.html".to_string(),
            info_path: "/cmswinfo.html".to_string(),
            tls_cipher_suite: self.tls_cipher_suite,
            request_timeout_seconds: 5,
        }
    }
}

/// Exporter configuration with one-second intervals.
pub fn test_exporter_config() -> ExporterConfig {
    ExporterConfig {
        port: 0,
        poll_interval_seconds: 1,
        relogin_interval_seconds: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modem_config_builder() {
        let config = TestModemConfigBuilder::new()
            .with_base_url("http://127.0.0.1:1234")
            .with_password("secret")
            .with_tls_cipher_suite("AES128-GCM-SHA256")
            .build();

        assert_eq!(config.base_url, "http://127.0.0.1:1234");
        assert_eq!(config.password().unwrap(), "secret");
        assert!(config.tls_cipher_suite.is_some());
    }

    #[test]
    fn test_modem_config_without_password() {
        let config = TestModemConfigBuilder::new().without_password().build();
        assert!(config.password().is_err());
    }
}
