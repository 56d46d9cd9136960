//! Error module for the assembly calculus library.
use thiserror::Error;

/// Error types for the library.
#[derive(Debug, PartialEq, Error)]
pub enum ConnectomeError {
    /// Error for registering a population under a name already in use.
    #[error("Duplicate population name: {0}")]
    DuplicateName(String),
    /// Error for referencing a population that was never registered.
    #[error("Unknown population: {0}")]
    UnknownPopulation(String),
    /// Error for firing from an area without active neurons, i.e., never fired as a destination.
    #[error("Empty source: area {0} has no winners to project")]
    EmptySource(String),
    /// Error for invalid parameters, e.g., a cap larger than the number of neurons.
    #[error("Invalid parameters: {0}")]
    InvalidParameter(String),
    /// Error for I/O operations, e.g., while loading a configuration file.
    #[error("I/O error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for ConnectomeError {
    fn from(e: std::io::Error) -> Self {
        ConnectomeError::IOError(e.to_string())
    }
}

impl From<serde_json::Error> for ConnectomeError {
    fn from(e: serde_json::Error) -> Self {
        ConnectomeError::IOError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            ConnectomeError::DuplicateName("A".into()).to_string(),
            "Duplicate population name: A"
        );
        assert_eq!(
            ConnectomeError::EmptySource("B".into()).to_string(),
            "Empty source: area B has no winners to project"
        );
    }
}
