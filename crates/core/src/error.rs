/// Result alias that carries the custom [`PilotError`] type.
pub type Result<T> = std::result::Result<T, PilotError>;

/// Common error type for the core crate.
///
/// Degraded or missing landmarks are never reported through this type; they are
/// absorbed by the pipeline. Only configuration problems, misuse by the host and
/// sink failures surface here.
#[derive(Debug, thiserror::Error)]
pub enum PilotError {
    /// Free-form message, mostly used by hosts embedding the core.
    #[error("{0}")]
    Message(String),
    /// Rejected before the session starts processing frames.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Frames and log records must arrive with strictly increasing timestamps.
    #[error("timestamp {current} does not follow {previous}")]
    OutOfOrder { previous: f64, current: f64 },
    /// A record sink refused the write. Pending records are kept for a retry.
    #[error("record sink failed: {0}")]
    Sink(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON (de)serialisation errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl PilotError {
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl From<&str> for PilotError {
    fn from(value: &str) -> Self {
        Self::Message(value.to_string())
    }
}

impl From<String> for PilotError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_carry_their_reason() {
        let err = PilotError::config("lower threshold must be below upper");
        assert_eq!(
            err.to_string(),
            "invalid configuration: lower threshold must be below upper"
        );
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: PilotError = io.into();
        assert!(matches!(err, PilotError::Io(_)));
    }
}
