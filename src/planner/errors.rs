//! Planner error types
//!
//! Raised while turning a pipeline description into operators, before any
//! row is produced.
//!
//! Error codes:
//! - OPENATTR_PIPELINE_INVALID (REJECT)
//! - OPENATTR_UNKNOWN_SOURCE (REJECT)
//! - OPENATTR_UNKNOWN_ATTRIBUTE (REJECT)
//! - OPENATTR_UNKNOWN_COLUMN (REJECT)

use std::fmt;

/// Severity levels for planner errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Pipeline rejected before execution
    Reject,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
        }
    }
}

/// Planner-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerErrorCode {
    /// Malformed pipeline structure
    PipelineInvalid,
    /// Scan over a source table that does not exist
    UnknownSource,
    /// Join or expansion over an unregistered keyword
    UnknownAttribute,
    /// Predicate or join condition names a column its input lacks
    UnknownColumn,
}

impl PlannerErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            PlannerErrorCode::PipelineInvalid => "OPENATTR_PIPELINE_INVALID",
            PlannerErrorCode::UnknownSource => "OPENATTR_UNKNOWN_SOURCE",
            PlannerErrorCode::UnknownAttribute => "OPENATTR_UNKNOWN_ATTRIBUTE",
            PlannerErrorCode::UnknownColumn => "OPENATTR_UNKNOWN_COLUMN",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        Severity::Reject
    }
}

impl fmt::Display for PlannerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Planner error type with full context
#[derive(Debug, Clone)]
pub struct PlannerError {
    code: PlannerErrorCode,
    message: String,
    /// Column name if applicable
    field: Option<String>,
}

impl PlannerError {
    /// Create a pipeline invalid error
    pub fn pipeline_invalid(reason: impl Into<String>) -> Self {
        Self {
            code: PlannerErrorCode::PipelineInvalid,
            message: reason.into(),
            field: None,
        }
    }

    /// Create an unknown source error
    pub fn unknown_source(source: impl Into<String>) -> Self {
        Self {
            code: PlannerErrorCode::UnknownSource,
            message: format!("Source table '{}' not found", source.into()),
            field: None,
        }
    }

    /// Create an unknown attribute error
    pub fn unknown_attribute(keyword: impl Into<String>) -> Self {
        Self {
            code: PlannerErrorCode::UnknownAttribute,
            message: format!("Open attribute '{}' is not registered", keyword.into()),
            field: None,
        }
    }

    /// Create an unknown column error
    pub fn unknown_column(column: impl Into<String>, node: &str) -> Self {
        let c = column.into();
        Self {
            code: PlannerErrorCode::UnknownColumn,
            message: format!("Column '{}' is not produced below {}", c, node),
            field: Some(c),
        }
    }

    pub fn code(&self) -> PlannerErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the column name if applicable
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for PlannerError {}

/// Result type for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;
