/// Result alias that carries the custom [`PulsedeckError`] type.
pub type Result<T> = std::result::Result<T, PulsedeckError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum PulsedeckError {
    /// A pattern name was requested that the catalog does not contain.
    #[error("unknown rhythm pattern `{0}`")]
    UnknownPattern(String),
    /// A pattern definition violated the catalog invariants.
    #[error("invalid rhythm pattern `{name}`: {reason}")]
    InvalidPattern { name: String, reason: String },
    /// A settings edit would leave the engine without any selectable pattern.
    #[error("active pattern selection cannot be empty")]
    EmptySelection,
    /// A numeric bound pair failed validation.
    #[error("invalid range for {0}: {1}")]
    InvalidRange(&'static str, String),
    /// Free-form error used where no richer variant applies, for example
    /// when a shared lock has been poisoned.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON (de)serialization errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl PulsedeckError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for PulsedeckError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for PulsedeckError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
