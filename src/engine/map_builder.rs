//! Relationship map construction.
//!
//! Classification is mechanical given what the earlier phases produced:
//! unresolved conflicts or unexamined combinations make a pair conflicted,
//! fully resolved conflicts make it reconciled, and only a pair nothing
//! touched goes to the oracle for the frame comparison that separates
//! compatible from incommensurable. The oracle is also consulted once per
//! jointly asserted claim to rule on support independence. Every aggregate
//! in the map is rebuilt from the pair relationships, so the map never
//! disagrees with itself.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::conflict::{Conflict, ConflictClass, ConflictId, UpstreamAction};
use crate::engine::outcome;
use crate::engine::resolver::ResolutionOutcome;
use crate::engine::runtime::{OracleHandle, OraclePool};
use crate::error::EngineResult;
use crate::examination::ExaminationLog;
use crate::map::{DangerAssessment, DangerPolicy, JointlySupportedClaim, ReconciliationMap};
use crate::oracle::{FrameJudgment, FrameQuestion, SupportJudgment, SupportQuestion, SupportingRun};
use crate::registry::{RunPair, RunRegistry};
use crate::relationship::{Relationship, RunPairRelationship, RunScope};
use crate::vocabulary::AlignmentTable;

enum PairState {
    Done(Relationship),
    AwaitingFrames(OracleHandle<FrameJudgment>),
}

/// Builds the reconciliation map from everything the earlier phases found.
pub(crate) fn build(
    registry: &RunRegistry,
    table: &AlignmentTable,
    log: &ExaminationLog,
    resolution: &ResolutionOutcome,
    pool: &OraclePool,
    timeout: Duration,
    danger_policy: DangerPolicy,
) -> EngineResult<ReconciliationMap> {
    let mut states: Vec<(RunPair, PairState)> = Vec::with_capacity(registry.pair_count());
    for pair in registry.ordered_pairs() {
        let state = classify_pair(registry, log, resolution, pool, &pair);
        states.push((pair, state));
    }

    let mut pairs = Vec::with_capacity(states.len());
    for (pair, state) in states {
        let relationship = match state {
            PairState::Done(relationship) => relationship,
            PairState::AwaitingFrames(handle) => match handle.join_timeout(timeout) {
                Ok(FrameJudgment::SharedFrame) => Relationship::Compatible {
                    scopes: pair_scopes(registry, &pair),
                },
                Ok(FrameJudgment::NoCommonFrame { argument }) => {
                    Relationship::Incommensurable { argument }
                }
                // An unanswered frame question must not become compatible.
                Err(err) => Relationship::Conflicted {
                    unresolved_conflicts: Vec::new(),
                    upstream_actions: vec![UpstreamAction::resubmission(format!(
                        "pair {pair} awaits frame comparison: {err}"
                    ))],
                },
            },
        };
        pairs.push(RunPairRelationship::new(pair, relationship));
    }

    let jointly_supported_claims = assess_joint_claims(registry, table, pool, timeout)?;
    let upstream_actions_required = aggregate_actions(&pairs, table);
    let most_dangerous_conflict = select_danger(resolution, &pairs, danger_policy);
    let overall_relationship = outcome::classify(&pairs);

    let map = ReconciliationMap {
        pairs,
        jointly_supported_claims,
        most_dangerous_conflict,
        upstream_actions_required,
        overall_relationship,
    };
    map.verify_complete(registry)?;
    Ok(map)
}

/// Classifies one pair from the conflict and examination evidence, or
/// submits the frame question when nothing touched the pair.
fn classify_pair(
    registry: &RunRegistry,
    log: &ExaminationLog,
    resolution: &ResolutionOutcome,
    pool: &OraclePool,
    pair: &RunPair,
) -> PairState {
    let touching: Vec<&Conflict> = resolution
        .conflicts
        .iter()
        .filter(|conflict| conflict.touches(pair))
        .collect();
    let unresolved: Vec<&Conflict> = touching
        .iter()
        .copied()
        .filter(|conflict| !resolution.resolved.contains(&conflict.id))
        .collect();
    let has_indeterminate = log.has_indeterminate_for(pair);

    if !unresolved.is_empty() || has_indeterminate {
        let mut seen = BTreeSet::new();
        let mut upstream_actions = Vec::new();
        for conflict in &unresolved {
            if let Some(action) = &conflict.upstream_action {
                if seen.insert(action.clone()) {
                    upstream_actions.push(action.clone());
                }
            }
        }
        if has_indeterminate {
            let action = UpstreamAction::resubmission(format!(
                "pair {pair} has unexamined claim combinations"
            ));
            if seen.insert(action.clone()) {
                upstream_actions.push(action);
            }
        }
        return PairState::Done(Relationship::Conflicted {
            unresolved_conflicts: unresolved.iter().map(|conflict| conflict.id).collect(),
            upstream_actions,
        });
    }

    if !touching.is_empty() {
        return PairState::Done(Relationship::Reconciled {
            resolved_conflicts: touching.iter().map(|conflict| conflict.id).collect(),
        });
    }

    let handle = pool.submit_frames(FrameQuestion {
        run_a: pair.a.clone(),
        scope_a: run_scope(registry, &pair.a),
        run_b: pair.b.clone(),
        scope_b: run_scope(registry, &pair.b),
    });
    PairState::AwaitingFrames(handle)
}

/// Groups post-alignment claims asserted by two or more runs and asks the
/// oracle whether each group's support is independent.
fn assess_joint_claims(
    registry: &RunRegistry,
    table: &AlignmentTable,
    pool: &OraclePool,
    timeout: Duration,
) -> EngineResult<Vec<JointlySupportedClaim>> {
    let mut groups: BTreeMap<String, BTreeSet<&crate::run::RunId>> = BTreeMap::new();
    for run in registry.runs() {
        for claim in &run.primary_claims {
            // A claim using a blocked term cannot be read in one
            // vocabulary, so it cannot corroborate anything.
            if table.statement_blocked(claim).is_some() {
                continue;
            }
            let aligned = table.normalize(&run.id, claim)?;
            groups.entry(aligned).or_default().insert(&run.id);
        }
    }
    groups.retain(|_, supporters| supporters.len() >= 2);

    let mut pending = Vec::with_capacity(groups.len());
    for (claim, supporters) in groups {
        let question_supporters = registry
            .runs()
            .iter()
            .filter(|run| supporters.contains(&run.id))
            .map(|run| SupportingRun {
                run: run.id.clone(),
                source: run.source.clone(),
            })
            .collect();
        let handle = pool.submit_support(SupportQuestion {
            claim: claim.clone(),
            supporters: question_supporters,
        });
        let owned: BTreeSet<_> = supporters.into_iter().cloned().collect();
        pending.push((claim, owned, handle));
    }

    let mut claims = Vec::with_capacity(pending.len());
    for (claim, supporting_runs, handle) in pending {
        let (independent, shared_source) = match handle.join_timeout(timeout) {
            Ok(SupportJudgment::Independent) => (true, None),
            Ok(SupportJudgment::CommonSource { source }) => (false, Some(source)),
            // Corroboration is never assumed on an unanswered question.
            Err(_) => (false, None),
        };
        claims.push(JointlySupportedClaim {
            claim,
            supporting_runs,
            independent,
            shared_source,
        });
    }
    Ok(claims)
}

/// Every outstanding upstream action: the conflicted pairs' actions in pair
/// order, then a disambiguation step per blocked term. First occurrence
/// wins; duplicates collapse.
fn aggregate_actions(pairs: &[RunPairRelationship], table: &AlignmentTable) -> Vec<UpstreamAction> {
    let mut seen = BTreeSet::new();
    let mut actions = Vec::new();
    for entry in pairs {
        let Relationship::Conflicted {
            upstream_actions, ..
        } = &entry.relationship
        else {
            continue;
        };
        for action in upstream_actions {
            if seen.insert(action.clone()) {
                actions.push(action.clone());
            }
        }
    }
    for blocker in table.blocked_terms() {
        let action = UpstreamAction::disambiguation(&blocker.term, blocker.runs.iter());
        if seen.insert(action.clone()) {
            actions.push(action);
        }
    }
    actions
}

/// Applies the danger policy over unresolved structural conflicts.
fn select_danger(
    resolution: &ResolutionOutcome,
    pairs: &[RunPairRelationship],
    policy: DangerPolicy,
) -> Option<DangerAssessment> {
    let candidates: Vec<&Conflict> = resolution
        .conflicts
        .iter()
        .filter(|conflict| {
            conflict.class == ConflictClass::StructuralConflict
                && !resolution.resolved.contains(&conflict.id)
        })
        .collect();

    match policy {
        DangerPolicy::FirstDetected => candidates.first().map(|conflict| DangerAssessment {
            conflict_id: conflict.id,
            argument: "first unresolved structural conflict in detection order".to_string(),
        }),
        DangerPolicy::PairCoverage => {
            let mut coverage: BTreeMap<ConflictId, usize> = BTreeMap::new();
            for entry in pairs {
                let Relationship::Conflicted {
                    unresolved_conflicts,
                    ..
                } = &entry.relationship
                else {
                    continue;
                };
                for id in unresolved_conflicts {
                    *coverage.entry(*id).or_insert(0) += 1;
                }
            }
            candidates
                .iter()
                .min_by_key(|conflict| {
                    (
                        Reverse(coverage.get(&conflict.id).copied().unwrap_or(0)),
                        conflict.id,
                    )
                })
                .map(|conflict| {
                    let count = coverage.get(&conflict.id).copied().unwrap_or(0);
                    DangerAssessment {
                        conflict_id: conflict.id,
                        argument: format!(
                            "appears in {count} conflicted pair relationships; ties break to the smallest conflict id"
                        ),
                    }
                })
        }
    }
}

fn run_scope(registry: &RunRegistry, id: &crate::run::RunId) -> String {
    registry
        .get(id)
        .map(|run| run.scope.clone())
        .unwrap_or_default()
}

fn pair_scopes(registry: &RunRegistry, pair: &RunPair) -> Vec<RunScope> {
    vec![
        RunScope::new(pair.a.clone(), run_scope(registry, &pair.a)),
        RunScope::new(pair.b.clone(), run_scope(registry, &pair.b)),
    ]
}
