//! Executor error types
//!
//! Error codes:
//! - OPENATTR_RESOLVER_UNAVAILABLE (FATAL)
//! - OPENATTR_RESOLVER_MALFORMED_RESPONSE (FATAL)
//! - OPENATTR_INCOMPATIBLE_REPLAN (FATAL)
//! - OPENATTR_CACHE_INVARIANT (FATAL)
//! - OPENATTR_EXECUTION_FAILED (ERROR)
//!
//! Nothing is retried: every error aborts the running query.

use std::fmt;

use crate::observability::Severity;
use crate::resolver::ResolverError;

/// Executor-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorErrorCode {
    /// Resolver transport failed
    ResolverUnavailable,
    /// Resolver response could not be parsed or has the wrong shape
    ResolverMalformedResponse,
    /// Replacement pipeline cannot stand in for the running one
    IncompatibleReplan,
    /// Lookup before resolution, unknown key, or a second resolution in one scan
    CacheInvariantViolation,
    /// Pipeline misuse or a row-level failure
    ExecutionFailed,
}

impl ExecutorErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            ExecutorErrorCode::ResolverUnavailable => "OPENATTR_RESOLVER_UNAVAILABLE",
            ExecutorErrorCode::ResolverMalformedResponse => "OPENATTR_RESOLVER_MALFORMED_RESPONSE",
            ExecutorErrorCode::IncompatibleReplan => "OPENATTR_INCOMPATIBLE_REPLAN",
            ExecutorErrorCode::CacheInvariantViolation => "OPENATTR_CACHE_INVARIANT",
            ExecutorErrorCode::ExecutionFailed => "OPENATTR_EXECUTION_FAILED",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            ExecutorErrorCode::ExecutionFailed => Severity::Error,
            _ => Severity::Fatal,
        }
    }
}

impl fmt::Display for ExecutorErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Where in the execution an error was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Scan,
    Join,
    Resolve,
    Expand,
    Enumerate,
    Reoptimize,
    PlanSwap,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Scan => "SCAN",
            Stage::Join => "JOIN",
            Stage::Resolve => "RESOLVE",
            Stage::Expand => "EXPAND",
            Stage::Enumerate => "ENUMERATE",
            Stage::Reoptimize => "REOPTIMIZE",
            Stage::PlanSwap => "PLAN_SWAP",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Executor error type with full context
#[derive(Debug)]
pub struct ExecutorError {
    code: ExecutorErrorCode,
    message: String,
    stage: Stage,
    /// Keyword of the offending attribute, if any
    keyword: Option<String>,
}

impl ExecutorError {
    fn new(code: ExecutorErrorCode, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            stage,
            keyword: None,
        }
    }

    /// Map a resolver failure, naming the attribute being resolved
    pub fn from_resolver(keyword: &str, err: ResolverError) -> Self {
        let code = match err {
            ResolverError::Transport(_) => ExecutorErrorCode::ResolverUnavailable,
            ResolverError::Malformed(_) => ExecutorErrorCode::ResolverMalformedResponse,
        };
        Self::new(code, Stage::Resolve, err.to_string()).with_keyword(keyword)
    }

    /// Create a malformed-response error (FATAL)
    pub fn malformed_response(keyword: &str, reason: impl Into<String>) -> Self {
        Self::new(
            ExecutorErrorCode::ResolverMalformedResponse,
            Stage::Resolve,
            reason,
        )
        .with_keyword(keyword)
    }

    /// Create an incompatible-replan error (FATAL)
    pub fn incompatible_replan(reason: impl Into<String>) -> Self {
        Self::new(ExecutorErrorCode::IncompatibleReplan, Stage::PlanSwap, reason)
    }

    /// Create a cache invariant violation (FATAL)
    pub fn cache_invariant(stage: Stage, reason: impl Into<String>) -> Self {
        Self::new(ExecutorErrorCode::CacheInvariantViolation, stage, reason)
    }

    /// Create an execution failed error
    pub fn execution_failed(stage: Stage, reason: impl Into<String>) -> Self {
        Self::new(ExecutorErrorCode::ExecutionFailed, stage, reason)
    }

    /// Attach the offending attribute's keyword
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn code(&self) -> ExecutorErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} (",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(keyword) = &self.keyword {
            write!(f, "attribute '{}', ", keyword)?;
        }
        write!(f, "stage {})", self.stage)
    }
}

impl std::error::Error for ExecutorError {}

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;
