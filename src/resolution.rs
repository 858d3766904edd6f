//! Resolution attempts and the exactly-once ledger.
//!
//! A resolvable conflict gets one attempt, ever, within an invocation.
//! The ledger is what makes "exactly once" a checked guarantee instead
//! of a convention: recording a second attempt for the same conflict, or
//! any attempt for an unresolvable one, is an [`InvariantViolation`]
//! that aborts the invocation.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::conflict::{Conflict, ConflictId};
use crate::error::InvariantViolation;

/// The mechanism a resolution attempt went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMechanism {
    /// Sharpen the scope boundary between the two claims.
    ScopeClarification,
    /// Surface the unstated assumption behind the disagreement.
    AssumptionSurfacing,
    /// Align one more term and re-read the claims.
    VocabularyResolution,
}

impl fmt::Display for ResolutionMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScopeClarification => write!(f, "scope_clarification"),
            Self::AssumptionSurfacing => write!(f, "assumption_surfacing"),
            Self::VocabularyResolution => write!(f, "vocabulary_resolution"),
        }
    }
}

/// Where a resolution attempt landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The conflict dissolves under a sharper scope boundary.
    ScopeClarified {
        /// The clarified boundary.
        boundary: String,
    },

    /// An unstated assumption explains the disagreement. When `held` is
    /// false the attempt still succeeded, but the conflict hardens to
    /// structural instead of dissolving.
    AssumptionSurfaced {
        /// The surfaced assumption.
        assumption: String,
        /// Whether the assumption holds.
        held: bool,
    },

    /// One more aligned term dissolves the conflict.
    VocabularyResolved {
        /// The canonical form that resolves it.
        canonical: String,
    },

    /// No mechanism applied.
    Failed {
        /// Why the chosen mechanism did not apply.
        reason: String,
    },

    /// The oracle could not be consulted; the conflict stays unresolved.
    Indeterminate {
        /// Why no judgment was available.
        justification: String,
    },
}

/// The single permitted resolution attempt for one conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionAttempt {
    /// The conflict this attempt belongs to.
    pub conflict_id: ConflictId,
    /// The mechanism that was applied (or was being applied when the
    /// oracle became unavailable).
    pub mechanism: ResolutionMechanism,
    /// Whether the mechanism ran to a judgment. True even for a surfaced
    /// assumption that did not hold.
    pub succeeded: bool,
    /// What the attempt concluded.
    pub outcome: AttemptOutcome,
}

impl ResolutionAttempt {
    /// A successful scope clarification.
    #[must_use]
    pub fn scope_clarified(conflict_id: ConflictId, boundary: impl Into<String>) -> Self {
        Self {
            conflict_id,
            mechanism: ResolutionMechanism::ScopeClarification,
            succeeded: true,
            outcome: AttemptOutcome::ScopeClarified {
                boundary: boundary.into(),
            },
        }
    }

    /// A successful assumption surfacing; whether it dissolves the
    /// conflict depends on `held`.
    #[must_use]
    pub fn assumption_surfaced(
        conflict_id: ConflictId,
        assumption: impl Into<String>,
        held: bool,
    ) -> Self {
        Self {
            conflict_id,
            mechanism: ResolutionMechanism::AssumptionSurfacing,
            succeeded: true,
            outcome: AttemptOutcome::AssumptionSurfaced {
                assumption: assumption.into(),
                held,
            },
        }
    }

    /// A successful vocabulary resolution.
    #[must_use]
    pub fn vocabulary_resolved(conflict_id: ConflictId, canonical: impl Into<String>) -> Self {
        Self {
            conflict_id,
            mechanism: ResolutionMechanism::VocabularyResolution,
            succeeded: true,
            outcome: AttemptOutcome::VocabularyResolved {
                canonical: canonical.into(),
            },
        }
    }

    /// A failed attempt under the given mechanism.
    #[must_use]
    pub fn failed(
        conflict_id: ConflictId,
        mechanism: ResolutionMechanism,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            conflict_id,
            mechanism,
            succeeded: false,
            outcome: AttemptOutcome::Failed {
                reason: reason.into(),
            },
        }
    }

    /// An attempt cut short by oracle unavailability. Recorded against
    /// scope clarification, the mechanism every consultation starts with.
    #[must_use]
    pub fn indeterminate(conflict_id: ConflictId, justification: impl Into<String>) -> Self {
        Self {
            conflict_id,
            mechanism: ResolutionMechanism::ScopeClarification,
            succeeded: false,
            outcome: AttemptOutcome::Indeterminate {
                justification: justification.into(),
            },
        }
    }

    /// True if this attempt dissolved the conflict.
    #[must_use]
    pub fn resolves(&self) -> bool {
        match &self.outcome {
            AttemptOutcome::ScopeClarified { .. } | AttemptOutcome::VocabularyResolved { .. } => {
                true
            }
            AttemptOutcome::AssumptionSurfaced { held, .. } => *held,
            AttemptOutcome::Failed { .. } | AttemptOutcome::Indeterminate { .. } => false,
        }
    }
}

/// Exactly-once bookkeeping for resolution attempts.
///
/// `record` is the single write path: it refuses a second attempt for a
/// conflict and any attempt on an unresolvable conflict, which is what
/// keeps repeated retries from manufacturing a favorable outcome.
#[derive(Debug, Default)]
pub struct AttemptLedger {
    attempts: Vec<ResolutionAttempt>,
    seen: BTreeSet<ConflictId>,
}

impl AttemptLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the attempt for `conflict`.
    ///
    /// The conflict must be resolvable and must not have an attempt yet;
    /// either violation aborts the invocation.
    pub fn record(
        &mut self,
        conflict: &Conflict,
        attempt: ResolutionAttempt,
    ) -> Result<(), InvariantViolation> {
        if !conflict.resolvable_within_rcp {
            return Err(InvariantViolation::AttemptOnUnresolvable {
                conflict_id: conflict.id,
            });
        }
        if !self.seen.insert(attempt.conflict_id) {
            return Err(InvariantViolation::SecondResolutionAttempt {
                conflict_id: attempt.conflict_id,
            });
        }
        self.attempts.push(attempt);
        Ok(())
    }

    /// Attempts in recording order.
    #[must_use]
    pub fn attempts(&self) -> &[ResolutionAttempt] {
        &self.attempts
    }

    /// The attempt recorded for a conflict, if any.
    #[must_use]
    pub fn attempt_for(&self, conflict_id: ConflictId) -> Option<&ResolutionAttempt> {
        self.attempts
            .iter()
            .find(|attempt| attempt.conflict_id == conflict_id)
    }

    /// True if the conflict already has its attempt.
    #[must_use]
    pub fn has_attempt(&self, conflict_id: ConflictId) -> bool {
        self.seen.contains(&conflict_id)
    }

    /// Number of recorded attempts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    /// True if nothing was attempted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Consumes the ledger, yielding attempts in recording order.
    #[must_use]
    pub fn into_attempts(self) -> Vec<ResolutionAttempt> {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::UpstreamAction;
    use crate::run::{ProtocolKind, RunId};

    fn resolvable(coordinates: &str) -> Conflict {
        Conflict::scope_mismatch(
            ConflictId::derive(coordinates),
            RunId::new("a"),
            RunId::new("b"),
            "claim a",
            "claim b",
            "apparent scope artifact",
        )
    }

    #[test]
    fn test_scope_clarified_resolves() {
        let attempt = ResolutionAttempt::scope_clarified(
            ConflictId::derive("x"),
            "a covers steady-state, b covers failover",
        );
        assert!(attempt.succeeded);
        assert!(attempt.resolves());
        assert_eq!(attempt.mechanism, ResolutionMechanism::ScopeClarification);
    }

    #[test]
    fn test_unheld_assumption_succeeds_without_resolving() {
        let attempt =
            ResolutionAttempt::assumption_surfaced(ConflictId::derive("x"), "cache stays warm", false);
        assert!(attempt.succeeded);
        assert!(!attempt.resolves());
    }

    #[test]
    fn test_held_assumption_resolves() {
        let attempt =
            ResolutionAttempt::assumption_surfaced(ConflictId::derive("x"), "cache stays warm", true);
        assert!(attempt.resolves());
    }

    #[test]
    fn test_failed_and_indeterminate_do_not_resolve() {
        let failed = ResolutionAttempt::failed(
            ConflictId::derive("x"),
            ResolutionMechanism::VocabularyResolution,
            "no candidate canonical form",
        );
        assert!(!failed.succeeded);
        assert!(!failed.resolves());

        let indeterminate = ResolutionAttempt::indeterminate(
            ConflictId::derive("y"),
            "oracle_unavailable: scripted outage",
        );
        assert!(!indeterminate.succeeded);
        assert!(!indeterminate.resolves());
    }

    #[test]
    fn test_ledger_records_one_attempt_per_conflict() {
        let conflict = resolvable("a|0|b|primary|0");
        let mut ledger = AttemptLedger::new();

        ledger
            .record(
                &conflict,
                ResolutionAttempt::scope_clarified(conflict.id, "boundary"),
            )
            .unwrap();
        assert!(ledger.has_attempt(conflict.id));
        assert_eq!(ledger.len(), 1);

        let err = ledger
            .record(
                &conflict,
                ResolutionAttempt::vocabulary_resolved(conflict.id, "delay"),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            InvariantViolation::SecondResolutionAttempt { .. }
        ));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_ledger_rejects_unresolvable_conflict() {
        let conflict = Conflict::structural(
            ConflictId::derive("a|0|b|primary|0"),
            RunId::new("a"),
            RunId::new("b"),
            "claim a",
            "claim b",
            "hard contradiction",
            UpstreamAction::new(ProtocolKind::Revision, "revisit the design"),
        );
        let mut ledger = AttemptLedger::new();

        let err = ledger
            .record(
                &conflict,
                ResolutionAttempt::scope_clarified(conflict.id, "boundary"),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            InvariantViolation::AttemptOnUnresolvable { .. }
        ));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_attempt_for_lookup() {
        let first = resolvable("first");
        let second = resolvable("second");
        let mut ledger = AttemptLedger::new();

        ledger
            .record(&first, ResolutionAttempt::scope_clarified(first.id, "b1"))
            .unwrap();
        ledger
            .record(
                &second,
                ResolutionAttempt::failed(
                    second.id,
                    ResolutionMechanism::AssumptionSurfacing,
                    "nothing to surface",
                ),
            )
            .unwrap();

        assert!(ledger.attempt_for(first.id).unwrap().resolves());
        assert!(!ledger.attempt_for(second.id).unwrap().resolves());
        assert!(ledger.attempt_for(ConflictId::derive("third")).is_none());
    }

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let attempt = ResolutionAttempt::failed(
            ConflictId::derive("x"),
            ResolutionMechanism::ScopeClarification,
            "claims overlap entirely",
        );
        let json = serde_json::to_string(&attempt).unwrap();
        assert!(json.contains("\"outcome\":\"failed\""));
        assert!(json.contains("\"mechanism\":\"scope_clarification\""));
    }
}
