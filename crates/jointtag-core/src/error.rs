use thiserror::Error;

/// Errors that can occur while building or running a joint tagger.
#[derive(Debug, Error)]
pub enum TaggerError {
    /// The configuration is inconsistent or contains non-positive sizes.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A tensor did not have the shape a component boundary requires.
    #[error("shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Which input or parameter was malformed.
        what: String,
        /// The required dimensions.
        expected: Vec<usize>,
        /// The dimensions actually supplied.
        actual: Vec<usize>,
    },

    /// A token id is not covered by the word embedding table.
    #[error("token id {id} out of range for vocabulary of size {vocab_size}")]
    TokenOutOfRange {
        /// The offending id.
        id: u32,
        /// Rows in the word embedding table.
        vocab_size: usize,
    },

    /// A tag id is outside the tag space of its task.
    #[error("{task} tag id {id} out of range for {num_tags} tags")]
    TagOutOfRange {
        /// `"pos"` or `"chunk"`.
        task: &'static str,
        /// The offending id.
        id: u32,
        /// Size of the tag space.
        num_tags: usize,
    },

    /// A parameter was requested in create mode but already exists in the store.
    #[error("parameter {0:?} already exists; construct with ParamMode::Reuse to bind to it")]
    ParamExists(String),

    /// A parameter was requested in reuse mode but the store does not hold it.
    #[error("parameter {0:?} not found; construct with ParamMode::Create first")]
    ParamMissing(String),

    /// The parameter store lock was poisoned by a panicking thread.
    #[error("parameter store lock poisoned")]
    StorePoisoned,

    /// Configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Candle ML framework error.
    #[error("tensor error: {0}")]
    Candle(#[from] candle_core::Error),
}

/// Result type alias for tagger operations.
pub type Result<T> = std::result::Result<T, TaggerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = TaggerError::TokenOutOfRange {
            id: 42,
            vocab_size: 10,
        };
        assert_eq!(
            err.to_string(),
            "token id 42 out of range for vocabulary of size 10"
        );

        let err = TaggerError::ShapeMismatch {
            what: "tokens".into(),
            expected: vec![2, 3],
            actual: vec![2, 4],
        };
        assert!(err.to_string().contains("tokens"));
        assert!(err.to_string().contains("[2, 4]"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TaggerError>();
    }
}
