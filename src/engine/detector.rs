//! Conflict detection.
//!
//! Every ordered pair of runs is examined claim by claim: each primary claim
//! of the lower-id run against every statement of the higher-id run. The
//! alignment table decides which combinations are comparable at all and the
//! oracle judges the comparable ones. Nothing drops out silently: every
//! combination lands in the examination log as examined, excluded, or
//! indeterminate, and the log is audited for completeness before the phase
//! returns.

use std::time::Duration;

use crate::conflict::{Conflict, ConflictId, UpstreamAction};
use crate::engine::runtime::{OracleHandle, OraclePool};
use crate::error::EngineResult;
use crate::examination::{ExaminationEntry, ExaminationLog, ExaminationVerdict, StatementRef};
use crate::oracle::{ClaimJudgment, ClaimQuestion};
use crate::registry::{RunPair, RunRegistry};
use crate::run::{ProtocolKind, Run, StatementKind};
use crate::vocabulary::{AlignmentTable, BlockedTerm};

/// What detection produced: the conflicts and the paper trail.
pub(crate) struct Detection {
    pub(crate) conflicts: Vec<Conflict>,
    pub(crate) log: ExaminationLog,
}

enum ComboSource {
    Excluded {
        term: String,
    },
    Pending {
        handle: OracleHandle<ClaimJudgment>,
        aligned_a: String,
        aligned_b: String,
        protocol_b: ProtocolKind,
    },
}

struct Combo {
    pair: RunPair,
    claim_a: StatementRef,
    claim_b: StatementRef,
    source: ComboSource,
}

/// Examines every claim combination of every pair and returns the detected
/// conflicts with the audited examination log.
///
/// Questions are submitted in pair-then-combination order and joined in the
/// same order. An oracle failure marks only the affected combination
/// indeterminate; the phase itself fails only on an audit gap or an internal
/// error.
pub(crate) fn detect(
    registry: &RunRegistry,
    table: &AlignmentTable,
    pool: &OraclePool,
    timeout: Duration,
) -> EngineResult<Detection> {
    let mut log = ExaminationLog::new();
    let mut conflicts: Vec<Conflict> = Vec::new();
    let mut combos: Vec<Combo> = Vec::new();

    for pair in registry.ordered_pairs() {
        let (Some(run_a), Some(run_b)) = (registry.get(&pair.a), registry.get(&pair.b)) else {
            continue;
        };

        if both_fully_blocked(table, run_a, run_b) {
            let terms = blocking_terms(table, run_a, run_b);
            let Some(first) = terms.first() else {
                continue;
            };
            let listed = listed_terms(&terms);
            log.record_skip(
                pair.clone(),
                format!("every claim combination uses a blocked term: {listed}"),
            );
            conflicts.push(Conflict::vocabulary(
                ConflictId::derive(&format!("{}|{}|vocabulary", pair.a, pair.b)),
                pair.a.clone(),
                pair.b.clone(),
                run_a.primary_claims.first().cloned().unwrap_or_default(),
                run_b
                    .statements()
                    .next()
                    .map(|(_, _, text)| text.to_string())
                    .unwrap_or_default(),
                format!("the runs share no usable vocabulary: {listed}"),
                UpstreamAction::disambiguation(&first.term, first.runs.iter()),
            ));
            continue;
        }

        for (index_a, text_a) in run_a.primary_claims.iter().enumerate() {
            for (kind_b, index_b, text_b) in run_b.statements() {
                let claim_a =
                    StatementRef::new(pair.a.clone(), StatementKind::Primary, index_a, text_a);
                let claim_b = StatementRef::new(pair.b.clone(), kind_b, index_b, text_b);
                let source = match (
                    table.statement_blocked(text_a),
                    table.statement_blocked(text_b),
                ) {
                    (Some(blocker), _) | (None, Some(blocker)) => ComboSource::Excluded {
                        term: blocker.term.clone(),
                    },
                    (None, None) => {
                        let aligned_a = table.normalize(&pair.a, text_a)?;
                        let aligned_b = table.normalize(&pair.b, text_b)?;
                        let handle = pool.submit_claims(ClaimQuestion {
                            run_a: pair.a.clone(),
                            claim_a: aligned_a.clone(),
                            scope_a: run_a.scope.clone(),
                            run_b: pair.b.clone(),
                            claim_b: aligned_b.clone(),
                            scope_b: run_b.scope.clone(),
                            kind_b,
                        });
                        ComboSource::Pending {
                            handle,
                            aligned_a,
                            aligned_b,
                            protocol_b: run_b.protocol_kind,
                        }
                    }
                };
                combos.push(Combo {
                    pair: pair.clone(),
                    claim_a,
                    claim_b,
                    source,
                });
            }
        }
    }

    for combo in combos {
        let Combo {
            pair,
            claim_a,
            claim_b,
            source,
        } = combo;
        let (verdict, conflict) = match source {
            ComboSource::Excluded { term } => (ExaminationVerdict::Excluded { term }, None),
            ComboSource::Pending {
                handle,
                aligned_a,
                aligned_b,
                protocol_b,
            } => match handle.join_timeout(timeout) {
                Ok(answer) => {
                    let conflict = conflict_from_answer(
                        &pair, &claim_a, &claim_b, &aligned_a, &aligned_b, protocol_b, &answer,
                    );
                    (ExaminationVerdict::Examined { answer }, conflict)
                }
                Err(err) => (
                    ExaminationVerdict::Indeterminate {
                        justification: format!("oracle_unavailable: {err}"),
                    },
                    None,
                ),
            },
        };
        let conflict_id = conflict.as_ref().map(|found| found.id);
        if let Some(found) = conflict {
            conflicts.push(found);
        }
        log.record(ExaminationEntry {
            pair,
            claim_a,
            claim_b,
            verdict,
            conflict: conflict_id,
        });
    }

    // A pair that is not fully blocked can still lose every combination to
    // exclusion (one side's statements all use blocked terms). It produced
    // no judgments, so it gets the same synthesized conflict a skipped pair
    // gets rather than passing for examined.
    for pair in registry.ordered_pairs() {
        if log.is_skipped(&pair) || log.examined_for(&pair) != 0 {
            continue;
        }
        let excluded = log.excluded_terms_for(&pair);
        let Some(first_term) = excluded.iter().next() else {
            continue;
        };
        let Some(entry) = log.entries().iter().find(|entry| {
            entry.pair == pair && matches!(entry.verdict, ExaminationVerdict::Excluded { .. })
        }) else {
            continue;
        };
        let listed = excluded
            .iter()
            .map(|term| match table.blocker_for(term) {
                Some(blocker) => blocker.to_string(),
                None => format!("'{term}'"),
            })
            .collect::<Vec<_>>()
            .join(", ");
        let runs = match table.blocker_for(first_term) {
            Some(blocker) => blocker.runs.clone(),
            None => [pair.a.clone(), pair.b.clone()].into_iter().collect(),
        };
        conflicts.push(Conflict::vocabulary(
            ConflictId::derive(&format!("{}|{}|vocabulary", pair.a, pair.b)),
            pair.a.clone(),
            pair.b.clone(),
            entry.claim_a.text.clone(),
            entry.claim_b.text.clone(),
            format!("no claim combination could be examined: {listed}"),
            UpstreamAction::disambiguation(first_term, runs.iter()),
        ));
    }

    log.audit(registry, table)?;
    Ok(Detection { conflicts, log })
}

fn both_fully_blocked(table: &AlignmentTable, run_a: &Run, run_b: &Run) -> bool {
    table.all_blocked(run_a.primary_claims.iter().map(String::as_str))
        && table.all_blocked(run_b.statements().map(|(_, _, text)| text))
}

/// The blockers a fully blocked pair trips over, first-seen order.
fn blocking_terms<'a>(
    table: &'a AlignmentTable,
    run_a: &'a Run,
    run_b: &'a Run,
) -> Vec<&'a BlockedTerm> {
    let mut seen = std::collections::BTreeSet::new();
    let mut out = Vec::new();
    let statements = run_a
        .primary_claims
        .iter()
        .map(String::as_str)
        .chain(run_b.statements().map(|(_, _, text)| text));
    for text in statements {
        if let Some(blocker) = table.statement_blocked(text) {
            if seen.insert(blocker.term.clone()) {
                out.push(blocker);
            }
        }
    }
    out
}

fn listed_terms(terms: &[&BlockedTerm]) -> String {
    terms
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn conflict_from_answer(
    pair: &RunPair,
    claim_a: &StatementRef,
    claim_b: &StatementRef,
    aligned_a: &str,
    aligned_b: &str,
    protocol_b: ProtocolKind,
    answer: &ClaimJudgment,
) -> Option<Conflict> {
    let id = ConflictId::derive(&format!(
        "{}|{}|{}|{}|{}",
        pair.a, claim_a.index, pair.b, claim_b.kind, claim_b.index
    ));
    match answer {
        ClaimJudgment::NoConflict => None,
        ClaimJudgment::ScopeMismatch { argument } => Some(Conflict::scope_mismatch(
            id,
            pair.a.clone(),
            pair.b.clone(),
            aligned_a,
            aligned_b,
            argument.clone(),
        )),
        ClaimJudgment::AssumptionConflict { argument } => Some(Conflict::assumption_conflict(
            id,
            pair.a.clone(),
            pair.b.clone(),
            aligned_a,
            aligned_b,
            argument.clone(),
        )),
        ClaimJudgment::StructuralConflict { argument } => Some(Conflict::structural(
            id,
            pair.a.clone(),
            pair.b.clone(),
            aligned_a,
            aligned_b,
            argument.clone(),
            UpstreamAction::new(
                protocol_b,
                format!("reexamine claim '{aligned_b}': {argument}"),
            ),
        )),
    }
}
