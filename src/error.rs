//! Error types for the SB8200 exporter.
//!
//! Errors are grouped by the component that raises them. The poll loop only
//! cares about how a failure should be handled, which [`ModemError::kind`]
//! answers with a [`FailureKind`].

use thiserror::Error;

/// Result type alias using our custom error types.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type that encompasses all application errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration-related errors
    #[error("configuration error")]
    Config(#[from] ConfigError),

    /// Modem communication errors
    #[error("modem error")]
    Modem(#[from] ModemError),

    /// HTML extraction and value conversion errors
    #[error("parse error")]
    Parse(#[from] ParseError),

    /// Metric registry errors
    #[error("registry error")]
    Registry(#[from] RegistryError),

    /// Generic errors that don't fit other categories
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable parsing failed
    #[error("failed to parse environment variables: {0}")]
    EnvParse(String),

    /// Required configuration value is missing
    #[error("missing required configuration: {0}")]
    Missing(String),

    /// Configuration value is invalid
    #[error("invalid configuration value for {field}: {message}")]
    Invalid { field: String, message: String },
}

/// How the poll loop should react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Wrong credentials. Polling stops.
    Authentication,
    /// The device answered badly or not at all. Try again next cycle.
    DeviceUnavailable,
    /// An authenticated request came back as the login page. Log in again.
    SessionExpired,
    /// Anything else. Logged, loop continues.
    Unclassified,
}

/// Modem communication errors.
#[derive(Error, Debug)]
pub enum ModemError {
    /// The exchange failed before a full response was read
    #[error("request to {target} failed: {source}")]
    Transport {
        target: &'static str,
        #[source]
        source: TransportError,
    },

    /// Login rejected the credentials (401)
    #[error("modem rejected the credentials; check for stray quotes in MODEM_USERNAME/MODEM_PASSWORD")]
    AuthFailed,

    /// Non-200 status from the device
    #[error("{target} returned status {status}")]
    DeviceUnavailable { target: &'static str, status: u16 },

    /// Login answered 200 but without a token
    #[error("login succeeded but the response carried no token")]
    EmptyToken,

    /// An authenticated request was answered with the login page
    #[error("{target} returned the login page; session expired")]
    SessionExpired { target: &'static str },

    /// TLS client setup failed
    #[error("TLS setup failed: {0}")]
    Tls(String),
}

/// Failures below HTTP status handling.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("connection failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] openssl::ssl::Error),

    #[error("TLS setup failed: {0}")]
    Ssl(#[from] openssl::error::ErrorStack),

    #[error(transparent)]
    Hyper(#[from] hyper::Error),

    #[error("invalid request: {0}")]
    Request(#[from] http::Error),

    #[error("invalid header value: {0}")]
    Header(#[from] http::header::InvalidHeaderValue),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("request timed out")]
    Timeout,
}

impl TransportError {
    /// Whether the device could not be reached or did not answer.
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Self::Connect(_) | Self::Handshake(_) | Self::Hyper(_) | Self::Timeout => true,
            Self::Body(_)
            | Self::Ssl(_)
            | Self::Request(_)
            | Self::Header(_)
            | Self::InvalidUrl(_) => false,
        }
    }
}

/// HTML extraction and value conversion errors.
#[derive(Error, Debug)]
pub enum ParseError {
    /// No table carries the requested section title
    #[error("section not found: {section}")]
    SectionNotFound { section: String },

    /// A single cell could not be converted
    #[error("failed to convert '{raw}' in column '{column}': {message}")]
    CellConversion {
        column: String,
        raw: String,
        message: String,
    },

    /// Invalid CSS selector
    #[error("invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// Metric registry errors.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Prometheus client error
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    /// The metric was never registered
    #[error("metric '{0}' is not registered")]
    UnknownMetric(String),

    /// The metric was used through an operation its kind does not support
    #[error("metric '{metric}' is not a {expected}")]
    KindMismatch {
        metric: String,
        expected: &'static str,
    },

    /// An enum metric was given a state it does not declare
    #[error("metric '{metric}' has no state '{state}'")]
    UnknownState { metric: String, state: String },

    /// An info metric was given a field it does not declare
    #[error("metric '{metric}' has no field '{field}'")]
    UnknownField { metric: String, field: String },
}

impl ConfigError {
    /// Creates a new environment parse error.
    pub fn env_parse(err: impl std::fmt::Display) -> Self {
        Self::EnvParse(err.to_string())
    }

    /// Creates a new missing configuration error.
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing(field.into())
    }

    /// Creates a new invalid configuration error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl ModemError {
    /// Maps a non-200 login status to the matching error.
    pub fn login_status(status: reqwest::StatusCode) -> Self {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            Self::AuthFailed
        } else {
            Self::DeviceUnavailable {
                target: "login",
                status: status.as_u16(),
            }
        }
    }

    /// Classifies the error for the poll loop.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::AuthFailed => FailureKind::Authentication,
            Self::DeviceUnavailable { .. } | Self::EmptyToken => FailureKind::DeviceUnavailable,
            Self::Transport { source, .. } if source.is_unreachable() => {
                FailureKind::DeviceUnavailable
            }
            Self::SessionExpired { .. } => FailureKind::SessionExpired,
            Self::Transport { .. } | Self::Tls(_) => FailureKind::Unclassified,
        }
    }
}

impl ParseError {
    /// Creates a section not found error.
    pub fn section_not_found(section: impl Into<String>) -> Self {
        Self::SectionNotFound {
            section: section.into(),
        }
    }

    /// Creates a cell conversion error.
    pub fn cell_conversion(
        column: impl Into<String>,
        raw: impl Into<String>,
        err: impl std::fmt::Display,
    ) -> Self {
        Self::CellConversion {
            column: column.into(),
            raw: raw.into(),
            message: err.to_string(),
        }
    }

    /// Creates an invalid selector error.
    pub fn invalid_selector(selector: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
            message: err.to_string(),
        }
    }
}

impl RegistryError {
    /// Creates a kind mismatch error.
    pub fn kind_mismatch(metric: impl Into<String>, expected: &'static str) -> Self {
        Self::KindMismatch {
            metric: metric.into(),
            expected,
        }
    }
}

impl Error {
    /// Classifies any error for the poll loop.
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Modem(e) => e.kind(),
            _ => FailureKind::Unclassified,
        }
    }
}
