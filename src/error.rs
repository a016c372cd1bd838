//! Error types for nith-io

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// nith-io error types
///
/// Note that transport `connect()` paths deliberately do not return `Result`:
/// per the receiver contract they log the failure and report it through
/// `is_connected()`. This type covers constructors and configuration I/O.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file parse error
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration file encode error
    #[error("Configuration encode error: {0}")]
    ConfigEncode(#[from] toml::ser::Error),

    /// A parameter name not present in the protocol vocabulary
    #[error("Unknown parameter name: {0}")]
    UnknownParameter(String),

    /// Network address parse error
    #[error("Invalid address: {0}")]
    Addr(#[from] std::net::AddrParseError),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
