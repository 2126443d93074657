//! Error types for the repository engine.
//!
//! One error enum covers the whole engine; each variant carries the
//! context a caller needs to report or recover.

use thiserror::Error;

use crate::value::Value;

/// The main error type for Strata.
#[derive(Debug, Error)]
pub enum StrataError {
    /// A load by id matched no row. Never silently swallowed.
    #[error("record not found: {resource}")]
    RecordNotFound {
        /// Identity of the requested resource, e.g. `dogs/999`.
        resource: String,
        /// Optional context path describing how the load was reached.
        include: Option<String>,
    },

    /// The adapter reported a failed statement. Propagated unchanged;
    /// the engine performs no retries and interprets no driver codes.
    #[error("statement failed: {message}")]
    ExecutionFailed {
        /// The statement that failed.
        statement: String,
        /// The adapter's failure message.
        message: String,
    },

    /// A value cannot be coerced to a declared property type.
    #[error("cannot coerce '{value}' to {expected} for property '{property}'")]
    TypeCoercion {
        /// The property being assigned.
        property: String,
        /// The declared type name.
        expected: String,
        /// The offending value, rendered.
        value: String,
    },

    /// Get or set of a property the record type does not declare.
    #[error("unknown property '{property}' on {record}")]
    UnknownProperty {
        /// The record type name.
        record: String,
        /// The undeclared property.
        property: String,
    },

    /// A schema lookup for a type that was never registered.
    #[error("unknown record type '{name}'")]
    UnknownRecordType {
        /// The missing type name.
        name: String,
    },

    /// A record type was registered twice.
    #[error("record type '{name}' is already defined")]
    SchemaConflict {
        /// The conflicting type name.
        name: String,
    },

    /// A subtype was registered before its ancestor.
    #[error("record type '{name}' declares unknown ancestor '{parent}'")]
    MissingAncestor {
        /// The type being registered.
        name: String,
        /// The undeclared ancestor.
        parent: String,
    },
}

impl StrataError {
    /// Creates a `RecordNotFound` error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::RecordNotFound {
            resource: resource.into(),
            include: None,
        }
    }

    /// Creates a `RecordNotFound` error with a context path.
    pub fn not_found_in(resource: impl Into<String>, include: impl Into<String>) -> Self {
        Self::RecordNotFound {
            resource: resource.into(),
            include: Some(include.into()),
        }
    }

    /// Creates an `ExecutionFailed` error.
    pub fn execution(statement: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            statement: statement.into(),
            message: message.into(),
        }
    }

    /// Creates a `TypeCoercion` error.
    pub fn coercion(property: impl Into<String>, expected: impl Into<String>, value: &Value) -> Self {
        Self::TypeCoercion {
            property: property.into(),
            expected: expected.into(),
            value: value.to_string(),
        }
    }

    /// Returns true if this error is a missing-record condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound { .. })
    }
}

/// Result type for repository operations.
pub type StrataResult<T> = Result<T, StrataError>;
