//! Error types for the reconciliation engine.

use crate::operations::Operation;

/// Errors that can occur during schema reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The desired schema failed validation. Carries every error, never
    /// just the first.
    #[error("Invalid schema:\n{}", .0.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n"))]
    InvalidSchema(Vec<String>),

    /// The diff engine refused a change the underlying engine cannot
    /// perform (enum value removal or reordering).
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// After applying all computed operations, a fresh diff against the
    /// desired schema was still non-empty. Carries the remaining
    /// differences.
    #[error("Schema still differs from the desired definition after applying changes:\n{}", .0.iter().map(|op| format!("  - {}", op.description())).collect::<Vec<_>>().join("\n"))]
    SchemaMismatch(Vec<Operation>),

    /// An entry point requiring connection configuration was invoked
    /// without it.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A failure surfaced by the database collaborator, propagated
    /// unchanged.
    #[error("Execution error: {0}")]
    Execution(String),

    /// IO error (reading schema files in the CLI).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_schema_lists_every_error() {
        let err = Error::InvalidSchema(vec!["first problem".into(), "second problem".into()]);
        let message = err.to_string();
        assert!(message.contains("first problem"));
        assert!(message.contains("second problem"));
    }

    #[test]
    fn mismatch_reports_operation_descriptions() {
        let err = Error::SchemaMismatch(vec![Operation::DropTable {
            name: "stale".into(),
        }]);
        assert!(err.to_string().contains("drop table 'stale'"));
    }
}
