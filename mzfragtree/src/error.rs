use thiserror::Error;

/// Errors for everything that reads outside data: formulas, compounds and configuration. A
/// violated graph invariant is a bug and panics instead.
#[derive(Error, Debug)]
pub enum FragTreeError {
    /// A molecular formula could not be parsed
    #[error("Invalid molecular formula '{formula}': {reason}")]
    InvalidFormula {
        /// The full text that was parsed
        formula: String,
        /// Why it was rejected
        reason: String,
    },

    /// An element symbol that is not supported
    #[error("Unknown element '{0}'")]
    UnknownElement(String),

    /// The JSON could not be read
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O error while reading input
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input data that is structurally invalid, eg a compound with duplicate peak indices
    #[error("Invalid input for '{context}': {reason}")]
    InvalidInput {
        /// The compound or field concerned
        context: String,
        /// What is wrong
        reason: String,
    },

    /// A configuration value is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for all fallible operations in this crate
pub type Result<T> = std::result::Result<T, FragTreeError>;

#[cfg(test)]
#[expect(clippy::missing_panics_doc)]
mod tests {
    use super::FragTreeError;

    #[test]
    fn display() {
        let err = FragTreeError::InvalidFormula {
            formula: "C6Q".to_string(),
            reason: "unknown element".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid molecular formula 'C6Q': unknown element"
        );
        let err = FragTreeError::InvalidInput {
            context: "caffeine".to_string(),
            reason: "duplicate peak index 3".to_string(),
        };
        assert!(err.to_string().contains("caffeine"));
        assert!(err.to_string().contains("duplicate peak index 3"));
    }

    #[test]
    fn from_json_error() {
        let err: FragTreeError = serde_json::from_str::<u8>("nope").unwrap_err().into();
        assert!(matches!(err, FragTreeError::Json(_)));
        assert!(err.to_string().starts_with("JSON parsing error"));
    }
}
