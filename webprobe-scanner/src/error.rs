use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cancelled")]
    Cancelled,
}

impl ScanError {
    /// Network, timeout and DNS failures. These count as "no evidence" for a
    /// single probe and never abort a scan.
    pub fn is_transport(&self) -> bool {
        matches!(self, ScanError::HttpError(_))
    }
}

/// Fatal setup errors. A scan never starts when one of these is returned.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {which} pattern '{pattern}': {source}")]
    InvalidPattern {
        which: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid start URL '{0}': must be an absolute http(s) URL")]
    InvalidStartUrl(String),

    #[error("invalid verification URL '{0}'")]
    InvalidVerifyUrl(String),

    #[error("payload source '{0}' not found")]
    MissingPayloads(String),

    #[error("payload source '{name}' could not be read: {source}")]
    UnreadablePayloads {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP client could not be built: {0}")]
    Client(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
