//! Overall outcome classification.

use std::collections::BTreeSet;

use crate::relationship::{OverallRelationship, RelationshipKind, RunPairRelationship};

/// Rolls the pair relationships up into the single overall verdict.
///
/// One distinct kind gives that kind; more than one gives
/// [`OverallRelationship::Mixed`]. An empty slice cannot arise from a valid
/// registry and classifies as compatible by vacuity.
pub(crate) fn classify(pairs: &[RunPairRelationship]) -> OverallRelationship {
    let kinds: BTreeSet<RelationshipKind> = pairs.iter().map(RunPairRelationship::kind).collect();
    let mut distinct = kinds.into_iter();
    match (distinct.next(), distinct.next()) {
        (Some(kind), None) => OverallRelationship::from(kind),
        (None, _) => OverallRelationship::Compatible,
        (Some(_), Some(_)) => OverallRelationship::Mixed,
    }
}
