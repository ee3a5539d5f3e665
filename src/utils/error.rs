use thiserror::Error;

/// Main error type for the range coder and its models.
///
/// Every variant is fatal to the encoder or decoder that raised it; callers
/// discard the instance instead of retrying.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoderError {
    /// A probability split the interval degenerately for the requested bit
    #[error("invalid probability: {0}")]
    InvalidProbability(f64),
    /// An operation was attempted after the stream was closed
    #[error("stream is closed")]
    StreamClosed,
    /// The decoder needed more input but none remains and padding is off
    #[error("unexpected end of stream")]
    EndOfStream,
    /// A weighted-trie model could not be built from its symbols
    #[error("invalid model: {0}")]
    ModelConstruction(String),
    /// A coder parameter or value lies outside its permitted range
    #[error("value out of range: {0}")]
    Range(String),
}

/// A specialized `Result` type for range coding operations.
pub type Result<T> = std::result::Result<T, CoderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            CoderError::InvalidProbability(1.5).to_string(),
            "invalid probability: 1.5"
        );
        assert_eq!(CoderError::StreamClosed.to_string(), "stream is closed");
        assert_eq!(
            CoderError::EndOfStream.to_string(),
            "unexpected end of stream"
        );
        assert_eq!(
            CoderError::ModelConstruction("empty symbol".to_string()).to_string(),
            "invalid model: empty symbol"
        );
        assert_eq!(
            CoderError::Range("max must exceed min".to_string()).to_string(),
            "value out of range: max must exceed min"
        );
    }
}
