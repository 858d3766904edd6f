//! Error types for the reconciliation engine.
//!
//! Errors are strongly typed using thiserror and split by how callers
//! must handle them: [`ValidationError`] rejects the input set before any
//! work happens, [`InvariantViolation`] aborts an invocation rather than
//! emit output that breaks an engine guarantee, and
//! [`crate::oracle::OracleError`] (defined next to the trait it belongs
//! to) is the only recoverable tier, whose affected items degrade to
//! indeterminate instead of failing the invocation.

use thiserror::Error;

use crate::conflict::ConflictId;
use crate::oracle::OracleError;
use crate::run::RunId;

/// Input-set rejection. Nothing is emitted when one of these fires.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("reconciliation requires at least 2 runs, got {count}")]
    TooFewRuns {
        count: usize,
    },

    #[error("duplicate run id: {run}")]
    DuplicateRunId {
        run: RunId,
    },

    #[error("run {run} has an empty scope")]
    EmptyScope {
        run: RunId,
    },

    #[error("run {run} has no primary claims")]
    NoPrimaryClaims {
        run: RunId,
    },

    #[error("run {run} statement {index} is empty")]
    EmptyClaim {
        run: RunId,
        index: usize,
    },

    #[error("pair ({run_a}, {run_b}) skipped without justification: {detail}")]
    UnjustifiedSkip {
        run_a: RunId,
        run_b: RunId,
        detail: String,
    },
}

/// A broken engine guarantee, caught before it could reach the output.
#[derive(Debug, Error)]
pub enum InvariantViolation {
    #[error("conflict {conflict_id} already has a resolution attempt")]
    SecondResolutionAttempt {
        conflict_id: ConflictId,
    },

    #[error("conflict {conflict_id} is not resolvable within reconciliation")]
    AttemptOnUnresolvable {
        conflict_id: ConflictId,
    },

    #[error("no relationship recorded for pair ({run_a}, {run_b})")]
    MissingPairRelationship {
        run_a: RunId,
        run_b: RunId,
    },

    #[error("conflict {conflict_id} is malformed: {reason}")]
    MalformedConflict {
        conflict_id: ConflictId,
        reason: String,
    },
}

/// Top-level error type for the engine's public entry points.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("serialization error: {message}")]
    Serialization {
        message: String,
    },

    #[error("internal error: {message}")]
    Internal {
        message: String,
    },
}

impl EngineError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if the input set was rejected.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if an engine guarantee would have been broken.
    #[must_use]
    pub const fn is_invariant(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }

    /// Returns true if this error surfaced from the judgment oracle.
    #[must_use]
    pub const fn is_oracle(&self) -> bool {
        matches!(self, Self::Oracle(_))
    }

    /// Returns true if retrying the invocation could plausibly succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            // Same inputs produce the same rejection.
            Self::Validation(_) => false,
            Self::Oracle(_) => true,
            Self::Invariant(_) => false,
            Self::Serialization { .. } => false,
            Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
