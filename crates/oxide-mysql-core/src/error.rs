//! Error types for schema validation and statement compilation.

use thiserror::Error;

/// Errors raised while validating a schema or compiling a descriptor.
///
/// Every variant describes a malformed input; none of them are transient.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A `NULL` comparison was used with an ordering operator.
    #[error("null value is only allowed with 'equal' or 'not' (got '{operator}' on `{table}`.`{field}`)")]
    InvalidFilter {
        /// Table the filter applies to.
        table: String,
        /// Filtered field.
        field: String,
        /// Offending operator name.
        operator: String,
    },

    /// A descriptor references a field that the schema doesn't declare.
    #[error("table `{table}` has no field `{field}`")]
    SchemaMismatch {
        /// Table name.
        table: String,
        /// Unknown field name.
        field: String,
    },

    /// A key-matched statement is missing primary-key values.
    #[error("table `{table}` requires every primary-key field to match a row")]
    MissingPrimaryKey {
        /// Table name.
        table: String,
    },

    /// An included table isn't linked to its parent by any foreign key.
    #[error("no foreign key links `{child}` to `{parent}`")]
    MissingRelation {
        /// Parent table name.
        parent: String,
        /// Included table name.
        child: String,
    },

    /// The descriptor is structurally invalid.
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// The table schema itself is invalid.
    #[error("invalid schema for `{table}`: {reason}")]
    InvalidSchema {
        /// Table name.
        table: String,
        /// Why validation failed.
        reason: String,
    },
}

/// Result type alias for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;
