//! Vocabulary alignment.
//!
//! Shared terms are classified once per invocation, before any claims are
//! compared. Every term used by more than one run goes to the oracle with its
//! full usage context, and the answers build the [`AlignmentTable`] the rest
//! of the pipeline reads. A term the oracle cannot classify is blocked rather
//! than guessed at: its statements drop out of comparison, the blockage is
//! reported, and reconciliation continues.

use std::time::Duration;

use crate::engine::runtime::OraclePool;
use crate::oracle::{TermJudgment, TermQuestion, TermUsage};
use crate::registry::RunRegistry;
use crate::vocabulary::{
    shared_terms, tokenize, AlignmentTable, BlockReason, BlockedTerm, VocabularyTerm,
};

/// Classifies every shared term and returns the alignment table.
///
/// Questions are submitted in lexicographic term order and joined in the same
/// order, so the table is identical across invocations with the same runs and
/// the same oracle answers.
pub(crate) fn align(registry: &RunRegistry, pool: &OraclePool, timeout: Duration) -> AlignmentTable {
    let shared = shared_terms(registry.runs());

    let mut pending = Vec::with_capacity(shared.len());
    for (term, users) in shared {
        let usages = registry
            .runs()
            .iter()
            .filter(|run| users.contains(&run.id))
            .map(|run| TermUsage {
                run: run.id.clone(),
                scope: run.scope.clone(),
                statements: run
                    .statements()
                    .filter(|(_, _, text)| tokenize(text).any(|token| token == term))
                    .map(|(_, _, text)| text.to_string())
                    .collect(),
            })
            .collect();
        let handle = pool.submit_term(TermQuestion {
            term: term.clone(),
            usages,
        });
        pending.push((term, users, handle));
    }

    let mut table = AlignmentTable::new();
    for (term, users, handle) in pending {
        match handle.join_timeout(timeout) {
            Ok(TermJudgment::Consistent) => {}
            Ok(TermJudgment::Synonym { canonical, variants }) => {
                table.insert(VocabularyTerm::synonym(term, canonical, variants));
            }
            Ok(TermJudgment::Homonym {
                meanings,
                scope_resolvable,
            }) => {
                table.insert(VocabularyTerm::homonym(
                    term,
                    meanings,
                    scope_resolvable,
                    users,
                ));
            }
            Ok(TermJudgment::Neologism {
                introduced_by,
                definition,
            }) => {
                table.insert(VocabularyTerm::neologism(term, introduced_by, definition));
            }
            Err(_) => {
                table.block(BlockedTerm {
                    term,
                    reason: BlockReason::OracleUnavailable,
                    runs: users,
                });
            }
        }
    }
    table
}
