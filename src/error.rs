//! Errors raised while building or reading an index

use thiserror::Error;

/// Malformed universal-code input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Gamma codes only represent strictly positive integers
    #[error("cannot encode 0 with a gamma code")]
    ZeroValue,

    #[error("truncated gamma code starting at byte {offset}")]
    Truncated { offset: usize },

    /// The zero padding does not match the length announced by the unary prefix
    #[error("misaligned gamma code at byte {offset}")]
    Misaligned { offset: usize },

    #[error("gamma code at byte {offset} does not fit in 32 bits")]
    Overflow { offset: usize },

    /// Postings are (gap, frequency) pairs, so the decoded sequence must be even
    #[error("postings blob holds {count} values, expected (gap, frequency) pairs")]
    UnpairedValue { count: usize },
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupted postings: {0}")]
    Codec(#[from] CodecError),

    #[error("invalid index data: {0}")]
    Format(String),

    #[error("could not serialize the index information: {0}")]
    Serialization(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("could not read the index information: {0}")]
    Deserialization(#[from] ciborium::de::Error<std::io::Error>),

    #[error("index cannot be changed since it has been built")]
    AlreadyBuilt,

    #[error("index is not built")]
    NotBuilt,

    #[error("invalid option: {0}")]
    InvalidOption(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IndexError::from(CodecError::Truncated { offset: 12 });
        assert_eq!(
            err.to_string(),
            "corrupted postings: truncated gamma code starting at byte 12"
        );

        let err = IndexError::Format("bad header".to_string());
        assert_eq!(err.to_string(), "invalid index data: bad header");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: IndexError = io.into();
        assert!(matches!(err, IndexError::Io(_)));
    }
}
