//! Captured modem pages used across the test suite.

/// Pages as served by the modem, trimmed but keeping the markup quirks.
pub mod pages {
    /// Connection status: startup procedure, downstream and upstream
    /// channels, and the system clock.
    pub const CONNECTION_STATUS: &str = include_str!("pages/connection_status.html");

    /// Product information.
    pub const PRODUCT_INFO: &str = include_str!("pages/product_info.html");

    /// What every page turns into once the session has expired.
    pub const LOGIN: &str = include_str!("pages/login.html");
}

/// The token the mock modem hands out.
pub const TOKEN: &str = "abc123";
