use octofhir_core::CoreError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GridError {
    /// The grid was closed or never started.
    #[error("Grid '{0}' is not available")]
    Unavailable(String),

    #[error("Grid configuration error: {0}")]
    Configuration(String),
}

impl GridError {
    pub fn configuration(message: impl Into<String>) -> Self {
        GridError::Configuration(message.into())
    }
}

/// A grid that cannot serve requests is a fatal configuration problem for
/// the stores built on it.
impl From<GridError> for CoreError {
    fn from(err: GridError) -> Self {
        CoreError::configuration(err.to_string())
    }
}

pub type GridResult<T> = std::result::Result<T, GridError>;
