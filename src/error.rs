//! Error handling for the Atlas exporter.

/// A specialized `Result` type for exporter operations.
pub type Result<T> = std::result::Result<T, ExporterError>;

/// The main error type for exporter operations.
#[derive(Debug, thiserror::Error)]
pub enum ExporterError {
    /// The Atlas API could not be reached or answered with a non-success status
    #[error("{}", http_message(.status, .message))]
    Http {
        status: Option<u16>,
        message: String,
    },

    /// A measurement's name or unit cannot be turned into a metric name
    #[error("Invalid measurement: {0}")]
    InvalidMeasurement(String),

    /// The measurement reported no samples at all
    #[error("no datapoints are available")]
    NoData,

    /// A sample carried a timestamp outside the expected format
    #[error("Invalid sample timestamp: {0}")]
    Timestamp(String),

    /// The metrics registry rejected a collector or descriptor
    #[error("Metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// An API payload could not be decoded
    #[error("Failed to decode API response: {0}")]
    Decode(#[from] serde_json::Error),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),
}

fn http_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("{}: {}", code, message),
        None => message.to_string(),
    }
}

impl ExporterError {
    /// Create a new transport error, optionally carrying the response status
    pub fn http_error(status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: msg.into(),
        }
    }

    /// Create a new measurement transformation error
    pub fn invalid_measurement(msg: impl Into<String>) -> Self {
        Self::InvalidMeasurement(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Status code used to label transport failures; `"0"` when no response arrived.
    pub fn status_label(&self) -> String {
        match self {
            Self::Http {
                status: Some(code), ..
            } => code.to_string(),
            _ => "0".to_string(),
        }
    }
}

impl From<reqwest::Error> for ExporterError {
    fn from(err: reqwest::Error) -> Self {
        Self::http_error(err.status().map(|s| s.as_u16()), err.to_string())
    }
}
