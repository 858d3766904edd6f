//! The reconciliation map: the complete pairwise matrix plus aggregate
//! findings.
//!
//! The map is the primary artifact. Its cardinality invariant is hard:
//! exactly one relationship per C(n,2) pair, verified before anything is
//! emitted. "Not examined" is not a relationship.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::conflict::{ConflictId, UpstreamAction};
use crate::error::InvariantViolation;
use crate::registry::{RunPair, RunRegistry};
use crate::relationship::{
    OverallRelationship, Relationship, RelationshipKind, RunPairRelationship,
};
use crate::run::RunId;

/// A claim asserted verbatim (post-alignment) by two or more runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointlySupportedClaim {
    /// The claim, post-alignment.
    pub claim: String,
    /// The runs asserting it; always at least two.
    pub supporting_runs: BTreeSet<RunId>,
    /// Whether the support is genuinely independent. False when the
    /// supporters trace to one source, and false when the oracle could
    /// not judge: corroboration is never assumed.
    pub independent: bool,
    /// The common source, when support is not independent and the
    /// oracle named one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_source: Option<String>,
}

/// The conflict singled out as most dangerous, with the reasoning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DangerAssessment {
    /// The selected conflict.
    pub conflict_id: ConflictId,
    /// Why it was selected.
    pub argument: String,
}

/// How the most dangerous conflict is chosen among unresolved
/// structural conflicts.
///
/// The selection is a policy, not a derived fact; both policies are
/// deterministic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DangerPolicy {
    /// The conflict appearing in the most conflicted pairs; ties broken
    /// by smallest conflict id.
    #[default]
    PairCoverage,
    /// The first unresolved structural conflict in detection order.
    FirstDetected,
}

/// The full pairwise relationship matrix plus aggregate findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationMap {
    /// One entry per pair, in canonical pair order.
    pub pairs: Vec<RunPairRelationship>,
    /// Claims asserted by two or more runs, in claim order.
    pub jointly_supported_claims: Vec<JointlySupportedClaim>,
    /// The most dangerous unresolved structural conflict, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_dangerous_conflict: Option<DangerAssessment>,
    /// Every outstanding upstream action, deduplicated, in first-seen
    /// order.
    pub upstream_actions_required: Vec<UpstreamAction>,
    /// The rolled-up verdict across all pairs.
    pub overall_relationship: OverallRelationship,
}

impl ReconciliationMap {
    /// The relationship recorded for a pair, if present.
    #[must_use]
    pub fn relationship_for(&self, pair: &RunPair) -> Option<&Relationship> {
        self.pairs
            .iter()
            .find(|entry| &entry.pair == pair)
            .map(|entry| &entry.relationship)
    }

    /// Pair counts per relationship kind.
    #[must_use]
    pub fn kind_counts(&self) -> BTreeMap<RelationshipKind, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.pairs {
            *counts.entry(entry.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Verifies the cardinality invariant against the registry: every
    /// declared pair must have a relationship.
    pub fn verify_complete(&self, registry: &RunRegistry) -> Result<(), InvariantViolation> {
        let present: BTreeSet<&RunPair> = self.pairs.iter().map(|entry| &entry.pair).collect();
        for pair in registry.ordered_pairs() {
            if !present.contains(&pair) {
                return Err(InvariantViolation::MissingPairRelationship {
                    run_a: pair.a,
                    run_b: pair.b,
                });
            }
        }
        Ok(())
    }
}
