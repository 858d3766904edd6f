//! Record emission, the last phase.
//!
//! Everything here is a pure rendering of state the earlier phases
//! produced. No oracle calls, no new decisions; the record must follow
//! mechanically from the map and the conflict ledger so that identical
//! inputs and identical oracle answers yield a byte-identical record.

use crate::engine::resolver::ResolutionOutcome;
use crate::error::EngineResult;
use crate::map::ReconciliationMap;
use crate::record::{input_fingerprint, Record, NOTHING};
use crate::registry::RunRegistry;
use crate::relationship::{Relationship, RelationshipKind};
use crate::run::RunId;

/// Renders the final record.
pub(crate) fn emit(
    registry: &RunRegistry,
    resolution: &ResolutionOutcome,
    map: &ReconciliationMap,
) -> EngineResult<Record> {
    let total_conflicts = resolution.conflicts.len();
    let resolved_conflicts = resolution.resolved.len();
    let unresolved_conflicts = total_conflicts - resolved_conflicts;

    Ok(Record {
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
        input_runs: registry.runs().iter().map(|run| run.id.clone()).collect(),
        input_fingerprint: input_fingerprint(registry.runs())?,
        total_conflicts,
        resolved_conflicts,
        unresolved_conflicts,
        jointly_supported_claims: map.jointly_supported_claims.len(),
        summary: render_summary(registry, map, total_conflicts, resolved_conflicts),
        safe_to_build: render_safe_to_build(registry, map),
        blocked_until: render_blocked_until(map),
    })
}

fn render_summary(
    registry: &RunRegistry,
    map: &ReconciliationMap,
    total: usize,
    resolved: usize,
) -> String {
    let counts = map.kind_counts();
    let count = |kind: RelationshipKind| counts.get(&kind).copied().unwrap_or(0);
    format!(
        "{runs} runs across {pairs} pairs: {compatible} compatible, {reconciled} reconciled, \
         {conflicted} conflicted, {incommensurable} incommensurable; \
         {total} conflicts ({resolved} resolved, {unresolved} unresolved); \
         {joint} jointly supported claims; overall {overall}",
        runs = registry.len(),
        pairs = registry.pair_count(),
        compatible = count(RelationshipKind::Compatible),
        reconciled = count(RelationshipKind::Reconciled),
        conflicted = count(RelationshipKind::Conflicted),
        incommensurable = count(RelationshipKind::Incommensurable),
        unresolved = total - resolved,
        joint = map.jointly_supported_claims.len(),
        overall = map.overall_relationship,
    )
}

/// Lists the scopes of pairs that came out compatible or reconciled, the
/// only relationships a downstream build may rest on.
fn render_safe_to_build(registry: &RunRegistry, map: &ReconciliationMap) -> String {
    let mut entries = Vec::new();
    for entry in &map.pairs {
        if !matches!(
            entry.relationship,
            Relationship::Compatible { .. } | Relationship::Reconciled { .. }
        ) {
            continue;
        }
        entries.push(format!(
            "{}: {} + {}",
            entry.pair,
            scope_of(registry, &entry.pair.a),
            scope_of(registry, &entry.pair.b)
        ));
    }
    if entries.is_empty() {
        NOTHING.to_string()
    } else {
        entries.join("; ")
    }
}

fn render_blocked_until(map: &ReconciliationMap) -> String {
    if map.upstream_actions_required.is_empty() {
        return NOTHING.to_string();
    }
    map.upstream_actions_required
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn scope_of(registry: &RunRegistry, id: &RunId) -> String {
    registry
        .get(id)
        .map(|run| run.scope.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::conflict::{Conflict, ConflictId, UpstreamAction};
    use crate::registry::RunPair;
    use crate::relationship::{OverallRelationship, RunPairRelationship};
    use crate::resolution::AttemptLedger;
    use crate::run::{ProtocolKind, Run};

    fn run(id: &str, scope: &str) -> Run {
        Run::builder(id, ProtocolKind::Revision)
            .scope(scope)
            .claim(format!("claim from {id}"))
            .build()
            .unwrap()
    }

    fn outcome(conflicts: Vec<Conflict>, resolved: Vec<ConflictId>) -> ResolutionOutcome {
        ResolutionOutcome {
            conflicts,
            ledger: AttemptLedger::new(),
            resolved: resolved.into_iter().collect(),
        }
    }

    fn map_for(pairs: Vec<RunPairRelationship>, actions: Vec<UpstreamAction>) -> ReconciliationMap {
        let overall = crate::engine::outcome::classify(&pairs);
        ReconciliationMap {
            pairs,
            jointly_supported_claims: Vec::new(),
            most_dangerous_conflict: None,
            upstream_actions_required: actions,
            overall_relationship: overall,
        }
    }

    #[test]
    fn test_clean_record_names_real_scopes() {
        let registry =
            RunRegistry::register(vec![run("fa-1", "checkout"), run("ov-2", "sensors")]).unwrap();
        let pair = RunPair::new("fa-1".into(), "ov-2".into());
        let map = map_for(
            vec![RunPairRelationship::new(
                pair,
                Relationship::Compatible { scopes: Vec::new() },
            )],
            Vec::new(),
        );

        let record = emit(&registry, &outcome(Vec::new(), Vec::new()), &map).unwrap();

        assert!(record.counts_consistent());
        assert_eq!(record.total_conflicts, 0);
        assert_eq!(record.input_runs.len(), 2);
        assert_eq!(record.engine_version, env!("CARGO_PKG_VERSION"));
        assert_eq!(record.input_fingerprint.len(), 64);
        assert_eq!(record.safe_to_build, "(fa-1, ov-2): checkout + sensors");
        assert_eq!(record.blocked_until, NOTHING);
        assert!(record.summary.contains("overall compatible"));
    }

    #[test]
    fn test_conflicted_record_blocks_and_builds_nothing() {
        let registry =
            RunRegistry::register(vec![run("r1", "scope one"), run("r2", "scope two")]).unwrap();
        let action = UpstreamAction::new(ProtocolKind::Revision, "reexamine claim 'x'");
        let conflict = Conflict::structural(
            ConflictId::derive("r1|0|r2|primary|0"),
            "r1".into(),
            "r2".into(),
            "x",
            "not x",
            "direct contradiction",
            action.clone(),
        );
        let id = conflict.id;
        let pair = RunPair::new("r1".into(), "r2".into());
        let map = map_for(
            vec![RunPairRelationship::new(
                pair,
                Relationship::Conflicted {
                    unresolved_conflicts: vec![id],
                    upstream_actions: vec![action.clone()],
                },
            )],
            vec![action.clone()],
        );

        let record = emit(&registry, &outcome(vec![conflict], Vec::new()), &map).unwrap();

        assert!(record.counts_consistent());
        assert_eq!(record.total_conflicts, 1);
        assert_eq!(record.unresolved_conflicts, 1);
        assert_eq!(record.safe_to_build, NOTHING);
        assert_eq!(record.blocked_until, action.to_string());
        assert!(record.summary.contains("1 conflicted"));
    }

    #[test]
    fn test_reconciled_pair_counts_as_buildable() {
        let registry =
            RunRegistry::register(vec![run("r1", "scope one"), run("r2", "scope two")]).unwrap();
        let conflict = Conflict::scope_mismatch(
            ConflictId::derive("r1|0|r2|primary|0"),
            "r1".into(),
            "r2".into(),
            "a",
            "b",
            "scopes differ",
        );
        let id = conflict.id;
        let pair = RunPair::new("r1".into(), "r2".into());
        let map = map_for(
            vec![RunPairRelationship::new(
                pair,
                Relationship::Reconciled {
                    resolved_conflicts: vec![id],
                },
            )],
            Vec::new(),
        );

        let record = emit(&registry, &outcome(vec![conflict], vec![id]), &map).unwrap();

        assert_eq!(record.resolved_conflicts, 1);
        assert_eq!(record.unresolved_conflicts, 0);
        assert_eq!(record.safe_to_build, "(r1, r2): scope one + scope two");
        assert_eq!(map.overall_relationship, OverallRelationship::Reconciled);
    }

    #[test]
    fn test_blocked_until_joins_actions_in_map_order() {
        let registry =
            RunRegistry::register(vec![run("r1", "scope one"), run("r2", "scope two")]).unwrap();
        let first = UpstreamAction::new(ProtocolKind::Revision, "reexamine claim 'x'");
        let second = UpstreamAction::new(ProtocolKind::ConceptBoundary, "disambiguate term 'drift'");
        let pair = RunPair::new("r1".into(), "r2".into());
        let map = map_for(
            vec![RunPairRelationship::new(
                pair,
                Relationship::Conflicted {
                    unresolved_conflicts: Vec::new(),
                    upstream_actions: vec![first.clone()],
                },
            )],
            vec![first.clone(), second.clone()],
        );

        let record = emit(&registry, &outcome(Vec::new(), Vec::new()), &map).unwrap();

        assert_eq!(
            record.blocked_until,
            format!("{first}; {second}")
        );
    }
}
