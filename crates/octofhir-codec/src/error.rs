use octofhir_core::CoreError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("Record type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Record truncated")]
    Truncated,

    #[error("Invalid {context} tag: {tag}")]
    InvalidTag { context: &'static str, tag: u8 },

    #[error("Invalid UTF-8 in record")]
    InvalidUtf8,

    #[error("Unsupported record format version: {0}")]
    UnsupportedVersion(u8),

    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),

    #[error("Record nesting exceeds {0} levels")]
    TooDeep(usize),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<CodecError> for CoreError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::UnknownResourceType(_) => CoreError::configuration(err.to_string()),
            other => CoreError::codec(other.to_string()),
        }
    }
}

pub type CodecResult<T> = std::result::Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_mapping() {
        let err: CoreError = CodecError::UnknownResourceType("Spaceship".into()).into();
        assert!(matches!(err, CoreError::Configuration(_)));

        let err: CoreError = CodecError::Truncated.into();
        assert!(matches!(err, CoreError::Codec(_)));
        assert!(err.is_server_error());
    }
}
