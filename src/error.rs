//! Error types for geomerge.

use thiserror::Error;

use crate::request::ColumnRole;

/// The main error type for merge generation.
///
/// Every validation variant is raised before any SQL text is produced.
#[derive(Debug, Error)]
pub enum MergeError {
    /// No table carries index 0.
    #[error("No main table found (expected a table key ending in '|0')")]
    MissingMainTable,

    /// A table has no selected column for a required role.
    #[error("No selected {role} column found for table {table}")]
    MissingRoleColumn { table: String, role: ColumnRole },

    /// A table has more than one selected column for a role.
    #[error("Table {table} has more than one selected {role} column")]
    AmbiguousRole { table: String, role: ColumnRole },

    /// Two selected columns share an output name (case-insensitive).
    #[error("Duplicate output column name: '{0}'")]
    DuplicateOutputName(String),

    /// Two table keys share the same index.
    #[error("Duplicate table index: {0}")]
    DuplicateTableIndex(u32),

    /// Malformed `dataset.table|index` key.
    #[error("Invalid table key '{key}': {reason}")]
    InvalidTableKey { key: String, reason: String },

    /// Source column name is not a plain SQL identifier.
    #[error("Invalid column name '{name}' in table {table}")]
    InvalidIdentifier { table: String, name: String },

    /// Output alias cannot be rendered as a quoted identifier.
    #[error("Invalid output column name '{new_name}' in table {table}")]
    InvalidOutputName { table: String, new_name: String },

    /// Output table is not `dataset.table`.
    #[error("Invalid output table '{0}': expected 'dataset.table' with lowercase letters, digits and underscores")]
    InvalidOutputTable(String),

    /// Project identifier contains characters we refuse to quote.
    #[error("Invalid project id: '{0}'")]
    InvalidProjectId(String),

    /// Request JSON could not be decoded.
    #[error("Invalid request JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MergeError {
    /// Create a missing role column error.
    pub fn missing(table: impl Into<String>, role: ColumnRole) -> Self {
        Self::MissingRoleColumn {
            table: table.into(),
            role,
        }
    }

    /// Create an ambiguous role error.
    pub fn ambiguous(table: impl Into<String>, role: ColumnRole) -> Self {
        Self::AmbiguousRole {
            table: table.into(),
            role,
        }
    }

    /// Create an invalid table key error.
    pub fn table_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTableKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the shape of the request rather than
    /// by IO, decoding or configuration.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Json(_) | Self::Config(_) | Self::Io(_))
    }
}

/// Result type alias for merge operations.
pub type MergeResult<T> = Result<T, MergeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MergeError::missing("ds.env|1", ColumnRole::Longitude);
        assert_eq!(
            err.to_string(),
            "No selected longitude column found for table ds.env|1"
        );
    }

    #[test]
    fn test_validation_classification() {
        assert!(MergeError::MissingMainTable.is_validation());
        assert!(MergeError::DuplicateOutputName("count".into()).is_validation());
        assert!(!MergeError::Config("bad".into()).is_validation());
    }
}
