//! The final record, the one artifact downstream systems consume.
//!
//! A record is created once per invocation and never revised; updated
//! findings require a fresh invocation over updated runs. Everything in
//! it is derived deterministically, so identical inputs plus identical
//! oracle answers serialize byte-identically. It never references
//! oracle internals.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::run::{Run, RunId};

/// Literal text used when `safe_to_build` or `blocked_until` has nothing
/// to enumerate.
pub const NOTHING: &str = "nothing";

/// The immutable summary of one reconciliation invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Version of the engine that produced this record.
    pub engine_version: String,

    /// The reconciled runs, in canonical order.
    pub input_runs: Vec<RunId>,

    /// BLAKE3 digest of the canonical serialization of the input runs.
    pub input_fingerprint: String,

    /// All detected conflicts, including synthesized vocabulary ones.
    pub total_conflicts: usize,

    /// Conflicts dissolved by a resolution attempt.
    pub resolved_conflicts: usize,

    /// Conflicts carried out of the invocation unresolved.
    pub unresolved_conflicts: usize,

    /// Number of claims asserted by two or more runs.
    pub jointly_supported_claims: usize,

    /// Plain-text rendering of the outcome.
    pub summary: String,

    /// Scopes of pairs whose relationship permits building on them, or
    /// `"nothing"`.
    pub safe_to_build: String,

    /// Outstanding upstream actions, or `"nothing"`.
    pub blocked_until: String,
}

impl Record {
    /// True when the conflict counts add up, as they must in every
    /// emitted record.
    #[must_use]
    pub const fn counts_consistent(&self) -> bool {
        self.total_conflicts == self.resolved_conflicts + self.unresolved_conflicts
    }
}

/// BLAKE3 hex digest over the canonical (registry-ordered) serialization
/// of the input runs.
///
/// Two invocations over the same runs carry the same fingerprint no
/// matter the submission order, which is what lets downstream systems
/// recognize a resubmission.
pub fn input_fingerprint(runs: &[Run]) -> EngineResult<String> {
    let bytes = serde_json::to_vec(runs).map_err(|e| EngineError::Serialization {
        message: e.to_string(),
    })?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}
