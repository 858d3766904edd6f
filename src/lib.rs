//! # Concord - Reconciliation of Completed Run Records
//!
//! Concord takes two or more immutable run records, determines how their
//! claims relate via an external judgment oracle, and emits a single
//! immutable reconciliation record. It never re-executes runs, never
//! edits them, and never renders a semantic verdict itself; every
//! judgment call belongs to the oracle, every bookkeeping rule to the
//! engine.
//!
//! ## Core Concepts
//!
//! - **Run**: An immutable record of a completed protocol execution with
//!   a scope, primary claims, and external assumptions
//! - **Conflict**: A classified disagreement between two claims, with an
//!   upstream action when it cannot be resolved here
//! - **ReconciliationMap**: The pairwise relationship verdicts plus
//!   jointly supported claims and the most dangerous conflict
//! - **Record**: The one immutable artifact downstream systems consume
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use concord::{ProtocolKind, ReconciliationEngine, Run, ScriptedOracle};
//!
//! let a = Run::builder("rev-1", ProtocolKind::Revision)
//!     .scope("checkout flow")
//!     .claim("retries are idempotent")
//!     .build()?;
//! let b = Run::builder("aud-2", ProtocolKind::FidelityAudit)
//!     .scope("payment flow")
//!     .claim("ledger writes are ordered")
//!     .build()?;
//!
//! let engine = ReconciliationEngine::new(Arc::new(ScriptedOracle::new()));
//! let result = engine.reconcile(vec![a, b])?;
//! println!("{}", result.record.summary);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod conflict;
pub mod error;
pub mod examination;
pub mod map;
pub mod oracle;
pub mod record;
pub mod registry;
pub mod relationship;
pub mod resolution;
pub mod run;
pub mod vocabulary;

// Pipeline and serialization
pub mod codec;
pub mod engine;

// Re-export primary types at crate root for convenience
pub use conflict::{Conflict, ConflictClass, ConflictId, UpstreamAction};
pub use engine::{EngineConfig, Reconciliation, ReconciliationEngine};
pub use error::{EngineError, EngineResult, InvariantViolation, ValidationError};
pub use examination::{ExaminationEntry, ExaminationLog, ExaminationVerdict, StatementRef};
pub use map::{DangerAssessment, DangerPolicy, JointlySupportedClaim, ReconciliationMap};
pub use oracle::{
    ClaimJudgment, ClaimQuestion, FrameJudgment, FrameQuestion, JudgmentOracle, OracleError,
    ResolutionJudgment, ResolutionQuestion, ScriptedOracle, SupportJudgment, SupportQuestion,
    TermJudgment, TermQuestion,
};
pub use record::{input_fingerprint, Record, NOTHING};
pub use registry::{RunPair, RunRegistry};
pub use relationship::{
    OverallRelationship, Relationship, RelationshipKind, RunPairRelationship, RunScope,
};
pub use resolution::{AttemptLedger, AttemptOutcome, ResolutionAttempt, ResolutionMechanism};
pub use run::{ProtocolKind, Run, RunBuilder, RunId, StatementKind};
pub use vocabulary::{
    AlignmentTable, BlockReason, BlockedTerm, TermAlignment, TermMeaning, VocabularyTerm,
};
