//! Conflicts between runs and the upstream actions they demand.
//!
//! A conflict is detected once, identified deterministically from its
//! detection coordinates, and never detected again within an invocation.
//! Its class decides its fate: scope mismatches and assumption conflicts
//! are candidates for resolution, structural conflicts and vocabulary
//! blocks are not: those must carry the upstream action that would unblock
//! them.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::InvariantViolation;
use crate::registry::RunPair;
use crate::run::{ProtocolKind, RunId};

/// Namespace for deriving conflict ids from detection coordinates.
const CONFLICT_NAMESPACE: Uuid = Uuid::from_bytes(*b"concord.conflict");

/// Stable identifier of a detected conflict.
///
/// Derived (UUID v5) from the detection coordinates, so the same input
/// set yields the same ids on every invocation. Id order is the
/// tie-break wherever the engine must pick one conflict among equals.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ConflictId(Uuid);

impl ConflictId {
    /// Derives the id for the given detection coordinates.
    #[must_use]
    pub fn derive(coordinates: &str) -> Self {
        Self(Uuid::new_v5(&CONFLICT_NAMESPACE, coordinates.as_bytes()))
    }

    /// Mints a random id, for conflicts created outside detection.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ConflictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of disagreement a conflict is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictClass {
    /// The runs' only shared claims use a blocked term.
    VocabularyConflict,
    /// The claims disagree because their scopes differ.
    ScopeMismatch,
    /// The claims rest on contradictory assumptions.
    AssumptionConflict,
    /// A genuine contradiction reconciliation cannot dissolve.
    StructuralConflict,
}

impl ConflictClass {
    /// Whether conflicts of this class may receive a resolution attempt.
    #[must_use]
    pub const fn resolvable(self) -> bool {
        matches!(self, Self::ScopeMismatch | Self::AssumptionConflict)
    }
}

impl fmt::Display for ConflictClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VocabularyConflict => write!(f, "vocabulary_conflict"),
            Self::ScopeMismatch => write!(f, "scope_mismatch"),
            Self::AssumptionConflict => write!(f, "assumption_conflict"),
            Self::StructuralConflict => write!(f, "structural_conflict"),
        }
    }
}

/// The upstream step that would unblock an unresolvable conflict.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UpstreamAction {
    /// Which protocol to re-run.
    pub protocol: ProtocolKind,
    /// The input to supply to that protocol.
    pub input: String,
}

impl UpstreamAction {
    /// Creates an upstream action.
    #[must_use]
    pub fn new(protocol: ProtocolKind, input: impl Into<String>) -> Self {
        Self {
            protocol,
            input: input.into(),
        }
    }

    /// The concept-boundary step that disambiguates a blocked term.
    #[must_use]
    pub fn disambiguation<'a>(term: &str, runs: impl Iterator<Item = &'a RunId>) -> Self {
        let runs: Vec<&str> = runs.map(RunId::as_str).collect();
        Self::new(
            ProtocolKind::ConceptBoundary,
            format!("disambiguate term '{}' across runs {}", term, runs.join(", ")),
        )
    }

    /// Resubmission of the whole reconciliation, the only remedy when the
    /// oracle could not be consulted.
    #[must_use]
    pub fn resubmission(detail: impl Into<String>) -> Self {
        Self::new(
            ProtocolKind::Reconciliation,
            format!(
                "resubmit once the judgment oracle is available: {}",
                detail.into()
            ),
        )
    }
}

impl fmt::Display for UpstreamAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "re-run {} with input: {}", self.protocol, self.input)
    }
}

/// One detected disagreement between two runs.
///
/// Immutable once detected, except for reclassification: a resolution
/// attempt that fails (or surfaces an assumption that does not hold)
/// hardens the conflict into a structural one carrying an upstream
/// action. Two invariants hold throughout: a structural or vocabulary
/// conflict is never resolvable, and an unresolvable conflict always
/// names its upstream action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// Deterministic identifier.
    pub id: ConflictId,

    /// The conflict's class.
    pub class: ConflictClass,

    /// The pair's lower-id run.
    pub run_a: RunId,

    /// The pair's higher-id run.
    pub run_b: RunId,

    /// `run_a`'s claim, post-alignment.
    pub claim_a: String,

    /// `run_b`'s statement, post-alignment.
    pub claim_b: String,

    /// The oracle's (or detector's) reasoning.
    pub argument: String,

    /// Whether a resolution attempt is permitted.
    pub resolvable_within_rcp: bool,

    /// The unblocking step; present exactly when unresolvable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_action: Option<UpstreamAction>,
}

impl Conflict {
    /// Creates a resolvable scope-mismatch conflict.
    #[must_use]
    pub fn scope_mismatch(
        id: ConflictId,
        run_a: RunId,
        run_b: RunId,
        claim_a: impl Into<String>,
        claim_b: impl Into<String>,
        argument: impl Into<String>,
    ) -> Self {
        Self {
            id,
            class: ConflictClass::ScopeMismatch,
            run_a,
            run_b,
            claim_a: claim_a.into(),
            claim_b: claim_b.into(),
            argument: argument.into(),
            resolvable_within_rcp: true,
            upstream_action: None,
        }
    }

    /// Creates a resolvable assumption conflict.
    #[must_use]
    pub fn assumption_conflict(
        id: ConflictId,
        run_a: RunId,
        run_b: RunId,
        claim_a: impl Into<String>,
        claim_b: impl Into<String>,
        argument: impl Into<String>,
    ) -> Self {
        Self {
            id,
            class: ConflictClass::AssumptionConflict,
            run_a,
            run_b,
            claim_a: claim_a.into(),
            claim_b: claim_b.into(),
            argument: argument.into(),
            resolvable_within_rcp: true,
            upstream_action: None,
        }
    }

    /// Creates a structural conflict with its mandatory upstream action.
    #[must_use]
    pub fn structural(
        id: ConflictId,
        run_a: RunId,
        run_b: RunId,
        claim_a: impl Into<String>,
        claim_b: impl Into<String>,
        argument: impl Into<String>,
        action: UpstreamAction,
    ) -> Self {
        Self {
            id,
            class: ConflictClass::StructuralConflict,
            run_a,
            run_b,
            claim_a: claim_a.into(),
            claim_b: claim_b.into(),
            argument: argument.into(),
            resolvable_within_rcp: false,
            upstream_action: Some(action),
        }
    }

    /// Creates a vocabulary conflict for a pair whose shared claims are
    /// all blocked, with its mandatory upstream action.
    #[must_use]
    pub fn vocabulary(
        id: ConflictId,
        run_a: RunId,
        run_b: RunId,
        claim_a: impl Into<String>,
        claim_b: impl Into<String>,
        argument: impl Into<String>,
        action: UpstreamAction,
    ) -> Self {
        Self {
            id,
            class: ConflictClass::VocabularyConflict,
            run_a,
            run_b,
            claim_a: claim_a.into(),
            claim_b: claim_b.into(),
            argument: argument.into(),
            resolvable_within_rcp: false,
            upstream_action: Some(action),
        }
    }

    /// Hardens this conflict into a structural one after a resolution
    /// attempt that did not dissolve it. The argument is extended with
    /// the reclassification reason; the upstream action is mandatory from
    /// here on.
    pub fn reclassify_structural(&mut self, reason: &str, action: UpstreamAction) {
        self.class = ConflictClass::StructuralConflict;
        self.resolvable_within_rcp = false;
        self.argument = format!("{}; {reason}", self.argument);
        self.upstream_action = Some(action);
    }

    /// The pair this conflict belongs to.
    #[must_use]
    pub fn pair(&self) -> RunPair {
        RunPair::new(self.run_a.clone(), self.run_b.clone())
    }

    /// True if this conflict is between the members of `pair`.
    #[must_use]
    pub fn touches(&self, pair: &RunPair) -> bool {
        pair.contains(&self.run_a) && pair.contains(&self.run_b)
    }

    /// Re-checks the class invariants.
    ///
    /// The constructors make violations impossible; this exists for
    /// conflicts that arrive from outside them.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        if self.resolvable_within_rcp != self.class.resolvable() {
            return Err(InvariantViolation::MalformedConflict {
                conflict_id: self.id,
                reason: format!(
                    "class {} cannot have resolvable_within_rcp = {}",
                    self.class, self.resolvable_within_rcp
                ),
            });
        }
        if !self.resolvable_within_rcp && self.upstream_action.is_none() {
            return Err(InvariantViolation::MalformedConflict {
                conflict_id: self.id,
                reason: "unresolvable conflict has no upstream action".to_string(),
            });
        }
        Ok(())
    }
}
