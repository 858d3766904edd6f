//! Resolution of resolvable conflicts.
//!
//! Each resolvable conflict gets exactly one oracle consultation. Whatever
//! comes back is final for this invocation: success dissolves the conflict,
//! anything else hardens it into a structural conflict with an upstream
//! action attached. The ledger enforces the one-attempt rule; a second
//! attempt for the same conflict is an engine bug, not an input problem.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::conflict::{Conflict, ConflictId, UpstreamAction};
use crate::engine::runtime::OraclePool;
use crate::error::EngineResult;
use crate::oracle::{ResolutionJudgment, ResolutionQuestion};
use crate::registry::RunRegistry;
use crate::resolution::{AttemptLedger, ResolutionAttempt};
use crate::run::{ProtocolKind, RunId};

/// What resolution produced: the conflicts as they stand after attempts,
/// the attempt ledger, and the ids that dissolved.
pub(crate) struct ResolutionOutcome {
    pub(crate) conflicts: Vec<Conflict>,
    pub(crate) ledger: AttemptLedger,
    pub(crate) resolved: BTreeSet<ConflictId>,
}

/// Attempts to resolve every resolvable conflict, once each.
///
/// Questions go out in detection order and are joined in the same order.
/// Unresolvable conflicts are never submitted. An oracle failure records an
/// indeterminate attempt and hardens the conflict with a resubmission
/// action; the invocation continues.
pub(crate) fn resolve(
    registry: &RunRegistry,
    mut conflicts: Vec<Conflict>,
    pool: &OraclePool,
    timeout: Duration,
) -> EngineResult<ResolutionOutcome> {
    let mut pending = Vec::new();
    for (index, conflict) in conflicts.iter().enumerate() {
        if !conflict.resolvable_within_rcp {
            continue;
        }
        let handle = pool.submit_resolution(ResolutionQuestion {
            conflict: conflict.clone(),
            scope_a: run_scope(registry, &conflict.run_a),
            scope_b: run_scope(registry, &conflict.run_b),
        });
        pending.push((index, handle));
    }

    let mut ledger = AttemptLedger::new();
    let mut resolved = BTreeSet::new();
    for (index, handle) in pending {
        let conflict = &mut conflicts[index];
        let id = conflict.id;
        match handle.join_timeout(timeout) {
            Ok(ResolutionJudgment::ScopeClarified { boundary }) => {
                ledger.record(conflict, ResolutionAttempt::scope_clarified(id, boundary))?;
                resolved.insert(id);
            }
            Ok(ResolutionJudgment::VocabularyResolved { canonical }) => {
                ledger.record(conflict, ResolutionAttempt::vocabulary_resolved(id, canonical))?;
                resolved.insert(id);
            }
            Ok(ResolutionJudgment::AssumptionSurfaced { assumption, held }) => {
                ledger.record(
                    conflict,
                    ResolutionAttempt::assumption_surfaced(id, assumption.clone(), held),
                )?;
                if held {
                    resolved.insert(id);
                } else {
                    // The attempt itself succeeded; the conflict hardens.
                    let protocol = run_protocol(registry, &conflict.run_b);
                    conflict.reclassify_structural(
                        &format!("surfaced assumption does not hold: {assumption}"),
                        UpstreamAction::new(
                            protocol,
                            format!("revisit the assumption '{assumption}'"),
                        ),
                    );
                }
            }
            Ok(ResolutionJudgment::Failed { mechanism, reason }) => {
                ledger.record(
                    conflict,
                    ResolutionAttempt::failed(id, mechanism, reason.clone()),
                )?;
                let protocol = run_protocol(registry, &conflict.run_b);
                let claim = conflict.claim_b.clone();
                conflict.reclassify_structural(
                    &format!("resolution failed under {mechanism}: {reason}"),
                    UpstreamAction::new(protocol, format!("reexamine claim '{claim}': {reason}")),
                );
            }
            Err(err) => {
                ledger.record(
                    conflict,
                    ResolutionAttempt::indeterminate(id, format!("oracle_unavailable: {err}")),
                )?;
                conflict.reclassify_structural(
                    &format!("oracle_unavailable: {err}"),
                    UpstreamAction::resubmission(format!(
                        "conflict {id} awaits a resolution attempt"
                    )),
                );
            }
        }
    }

    Ok(ResolutionOutcome {
        conflicts,
        ledger,
        resolved,
    })
}

fn run_scope(registry: &RunRegistry, id: &RunId) -> String {
    registry
        .get(id)
        .map(|run| run.scope.clone())
        .unwrap_or_default()
}

fn run_protocol(registry: &RunRegistry, id: &RunId) -> ProtocolKind {
    registry
        .get(id)
        .map_or(ProtocolKind::Reconciliation, |run| run.protocol_kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use crate::conflict::ConflictClass;
    use crate::oracle::ScriptedOracle;
    use crate::resolution::{AttemptOutcome, ResolutionMechanism};
    use crate::run::Run;

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn registry() -> RunRegistry {
        let r1 = Run::builder("r1", ProtocolKind::Revision)
            .version("1.0.0")
            .outcome("succeeded")
            .scope("batch ingestion")
            .claim("checkpoints are atomic")
            .build()
            .unwrap();
        let r2 = Run::builder("r2", ProtocolKind::Deprecation)
            .version("1.0.0")
            .outcome("succeeded")
            .scope("stream ingestion")
            .claim("checkpoints tear under load")
            .build()
            .unwrap();
        RunRegistry::register(vec![r1, r2]).unwrap()
    }

    fn scope_conflict() -> Conflict {
        Conflict::scope_mismatch(
            ConflictId::derive("r1|0|r2|primary|0"),
            "r1".into(),
            "r2".into(),
            "checkpoints are atomic",
            "checkpoints tear under load",
            "claims concern different ingestion paths",
        )
    }

    #[test]
    fn test_scope_clarified_resolves_the_conflict() {
        let oracle = ScriptedOracle::new().resolution(
            "checkpoints are atomic",
            "checkpoints tear under load",
            ResolutionJudgment::ScopeClarified {
                boundary: "atomicity holds per batch, not per stream".to_string(),
            },
        );
        let pool = OraclePool::start(Arc::new(oracle), 2, 16);

        let outcome = resolve(&registry(), vec![scope_conflict()], &pool, TIMEOUT).unwrap();

        let id = outcome.conflicts[0].id;
        assert!(outcome.resolved.contains(&id));
        assert_eq!(outcome.ledger.len(), 1);
        let attempt = outcome.ledger.attempt_for(id).unwrap();
        assert!(attempt.succeeded);
        assert!(attempt.resolves());
        assert_eq!(attempt.mechanism, ResolutionMechanism::ScopeClarification);
        // A resolved conflict keeps its detected class.
        assert_eq!(outcome.conflicts[0].class, ConflictClass::ScopeMismatch);
    }

    #[test]
    fn test_held_assumption_downgrades_the_conflict() {
        let oracle = ScriptedOracle::new().resolution(
            "checkpoints are atomic",
            "checkpoints tear under load",
            ResolutionJudgment::AssumptionSurfaced {
                assumption: "load stays under the checkpoint budget".to_string(),
                held: true,
            },
        );
        let pool = OraclePool::start(Arc::new(oracle), 2, 16);

        let outcome = resolve(&registry(), vec![scope_conflict()], &pool, TIMEOUT).unwrap();

        let id = outcome.conflicts[0].id;
        assert!(outcome.resolved.contains(&id));
        assert!(outcome.conflicts[0].resolvable_within_rcp);
    }

    #[test]
    fn test_unheld_assumption_reclassifies_as_structural() {
        let oracle = ScriptedOracle::new().resolution(
            "checkpoints are atomic",
            "checkpoints tear under load",
            ResolutionJudgment::AssumptionSurfaced {
                assumption: "load stays under the checkpoint budget".to_string(),
                held: false,
            },
        );
        let pool = OraclePool::start(Arc::new(oracle), 2, 16);

        let outcome = resolve(&registry(), vec![scope_conflict()], &pool, TIMEOUT).unwrap();

        let conflict = &outcome.conflicts[0];
        assert!(!outcome.resolved.contains(&conflict.id));
        assert_eq!(conflict.class, ConflictClass::StructuralConflict);
        assert!(!conflict.resolvable_within_rcp);
        assert!(conflict.argument.contains("does not hold"));
        // The attempt succeeded even though the conflict hardened.
        let attempt = outcome.ledger.attempt_for(conflict.id).unwrap();
        assert!(attempt.succeeded);
        assert!(!attempt.resolves());
        // The action targets the conflicting run's own protocol.
        let action = conflict.upstream_action.as_ref().unwrap();
        assert_eq!(action.protocol, ProtocolKind::Deprecation);
        assert!(action.input.contains("load stays under the checkpoint budget"));
    }

    #[test]
    fn test_failed_attempt_carries_the_conflict_as_structural() {
        let oracle = ScriptedOracle::new().resolution(
            "checkpoints are atomic",
            "checkpoints tear under load",
            ResolutionJudgment::Failed {
                mechanism: ResolutionMechanism::VocabularyResolution,
                reason: "no mechanism applies".to_string(),
            },
        );
        let pool = OraclePool::start(Arc::new(oracle), 2, 16);

        let outcome = resolve(&registry(), vec![scope_conflict()], &pool, TIMEOUT).unwrap();

        let conflict = &outcome.conflicts[0];
        assert!(outcome.resolved.is_empty());
        assert_eq!(conflict.class, ConflictClass::StructuralConflict);
        let attempt = outcome.ledger.attempt_for(conflict.id).unwrap();
        assert!(!attempt.succeeded);
        assert_eq!(attempt.mechanism, ResolutionMechanism::VocabularyResolution);
        let action = conflict.upstream_action.as_ref().unwrap();
        assert_eq!(action.protocol, ProtocolKind::Deprecation);
        assert!(action.input.contains("no mechanism applies"));
    }

    #[test]
    fn test_unresolvable_conflicts_are_never_submitted() {
        let structural = Conflict::structural(
            ConflictId::derive("r1|0|r2|primary|0"),
            "r1".into(),
            "r2".into(),
            "checkpoints are atomic",
            "checkpoints tear under load",
            "direct contradiction",
            UpstreamAction::new(ProtocolKind::Deprecation, "reexamine the claim"),
        );
        // An outage for this key would surface if the conflict were submitted.
        let oracle = ScriptedOracle::new()
            .fail_resolution("checkpoints are atomic", "checkpoints tear under load");
        let pool = OraclePool::start(Arc::new(oracle), 2, 16);

        let outcome = resolve(&registry(), vec![structural], &pool, TIMEOUT).unwrap();

        assert!(outcome.ledger.is_empty());
        assert!(outcome.resolved.is_empty());
        assert_eq!(outcome.conflicts[0].class, ConflictClass::StructuralConflict);
    }

    #[test]
    fn test_outage_records_indeterminate_and_resubmission_action() {
        let oracle = ScriptedOracle::new()
            .fail_resolution("checkpoints are atomic", "checkpoints tear under load");
        let pool = OraclePool::start(Arc::new(oracle), 2, 16);

        let outcome = resolve(&registry(), vec![scope_conflict()], &pool, TIMEOUT).unwrap();

        let conflict = &outcome.conflicts[0];
        assert!(!outcome.resolved.contains(&conflict.id));
        let attempt = outcome.ledger.attempt_for(conflict.id).unwrap();
        assert!(!attempt.succeeded);
        let AttemptOutcome::Indeterminate { justification } = &attempt.outcome else {
            panic!("expected indeterminate outcome, got {:?}", attempt.outcome);
        };
        assert!(justification.starts_with("oracle_unavailable"));
        let action = conflict.upstream_action.as_ref().unwrap();
        assert_eq!(action.protocol, ProtocolKind::Reconciliation);
        assert!(action.input.contains("resubmit"));
    }

    #[test]
    fn test_every_resolvable_conflict_gets_exactly_one_attempt() {
        let second = Conflict::assumption_conflict(
            ConflictId::derive("r1|1|r2|primary|0"),
            "r1".into(),
            "r2".into(),
            "recovery is bounded",
            "checkpoints tear under load",
            "premises disagree",
        );
        let oracle = ScriptedOracle::new().default_resolution(ResolutionJudgment::ScopeClarified {
            boundary: "split by ingestion path".to_string(),
        });
        let pool = OraclePool::start(Arc::new(oracle), 2, 16);

        let outcome = resolve(
            &registry(),
            vec![scope_conflict(), second],
            &pool,
            TIMEOUT,
        )
        .unwrap();

        assert_eq!(outcome.ledger.len(), 2);
        let ids: BTreeSet<_> = outcome
            .ledger
            .attempts()
            .iter()
            .map(|attempt| attempt.conflict_id)
            .collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(outcome.resolved.len(), 2);
    }
}
