//! The pairwise examination log and its completeness audit.
//!
//! Exhaustiveness is a guarantee, not a hope: every claim combination of
//! every pair is either examined, excluded with a named blocked term, or
//! indeterminate with a justification, and fully blocked pairs may be
//! skipped wholesale with the blocking recorded. The audit re-derives
//! the expected combinations and refuses any log that cannot account for
//! one of them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::conflict::ConflictId;
use crate::error::ValidationError;
use crate::oracle::ClaimJudgment;
use crate::registry::{RunPair, RunRegistry};
use crate::run::{RunId, StatementKind};
use crate::vocabulary::AlignmentTable;

/// Coordinates of one statement inside one run, with its post-alignment
/// text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementRef {
    /// The run the statement belongs to.
    pub run: RunId,
    /// Which list it came from.
    pub kind: StatementKind,
    /// Index within that list.
    pub index: usize,
    /// The statement text as it was (or would have been) compared.
    pub text: String,
}

impl StatementRef {
    /// Creates a statement reference.
    #[must_use]
    pub fn new(run: RunId, kind: StatementKind, index: usize, text: impl Into<String>) -> Self {
        Self {
            run,
            kind,
            index,
            text: text.into(),
        }
    }
}

/// What happened to one claim combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum ExaminationVerdict {
    /// The oracle judged the combination.
    Examined {
        /// The oracle's answer, including `no_conflict`.
        answer: ClaimJudgment,
    },

    /// The combination was never put to the oracle because a statement
    /// uses a blocked term.
    Excluded {
        /// The blocking term.
        term: String,
    },

    /// The oracle could not be consulted for this combination.
    Indeterminate {
        /// Why no judgment was available.
        justification: String,
    },
}

/// One logged claim combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExaminationEntry {
    /// The pair under examination.
    pub pair: RunPair,
    /// The first run's primary claim.
    pub claim_a: StatementRef,
    /// The second run's statement.
    pub claim_b: StatementRef,
    /// What happened.
    pub verdict: ExaminationVerdict,
    /// The conflict this combination produced, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictId>,
}

/// A wholesale pair skip, legal only when both members are fully
/// vocabulary-blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairSkip {
    /// The skipped pair.
    pub pair: RunPair,
    /// Why skipping was justified.
    pub justification: String,
}

/// The complete phase-2 paper trail for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExaminationLog {
    entries: Vec<ExaminationEntry>,
    skips: Vec<PairSkip>,
}

impl ExaminationLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an examination entry.
    pub fn record(&mut self, entry: ExaminationEntry) {
        self.entries.push(entry);
    }

    /// Records a wholesale pair skip with its justification.
    pub fn record_skip(&mut self, pair: RunPair, justification: impl Into<String>) {
        self.skips.push(PairSkip {
            pair,
            justification: justification.into(),
        });
    }

    /// Entries in examination order.
    #[must_use]
    pub fn entries(&self) -> &[ExaminationEntry] {
        &self.entries
    }

    /// Pair skips in pair order.
    #[must_use]
    pub fn skips(&self) -> &[PairSkip] {
        &self.skips
    }

    /// Number of logged combinations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing was logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.skips.is_empty()
    }

    /// True if the pair was skipped wholesale.
    #[must_use]
    pub fn is_skipped(&self, pair: &RunPair) -> bool {
        self.skips.iter().any(|skip| &skip.pair == pair)
    }

    /// Number of oracle-examined combinations for the pair.
    #[must_use]
    pub fn examined_for(&self, pair: &RunPair) -> usize {
        self.entries
            .iter()
            .filter(|entry| {
                &entry.pair == pair
                    && matches!(entry.verdict, ExaminationVerdict::Examined { .. })
            })
            .count()
    }

    /// Number of blocked-term exclusions for the pair.
    #[must_use]
    pub fn excluded_for(&self, pair: &RunPair) -> usize {
        self.entries
            .iter()
            .filter(|entry| {
                &entry.pair == pair
                    && matches!(entry.verdict, ExaminationVerdict::Excluded { .. })
            })
            .count()
    }

    /// True if any combination of the pair went indeterminate.
    #[must_use]
    pub fn has_indeterminate_for(&self, pair: &RunPair) -> bool {
        self.entries.iter().any(|entry| {
            &entry.pair == pair
                && matches!(entry.verdict, ExaminationVerdict::Indeterminate { .. })
        })
    }

    /// The terms that excluded combinations of the pair, in term order.
    #[must_use]
    pub fn excluded_terms_for(&self, pair: &RunPair) -> BTreeSet<String> {
        self.entries
            .iter()
            .filter(|entry| &entry.pair == pair)
            .filter_map(|entry| match &entry.verdict {
                ExaminationVerdict::Excluded { term } => Some(term.clone()),
                ExaminationVerdict::Examined { .. } | ExaminationVerdict::Indeterminate { .. } => {
                    None
                }
            })
            .collect()
    }

    /// Verifies that every expected combination of every pair is
    /// accounted for.
    ///
    /// A pair is accounted for either by a wholesale skip (legal only
    /// when both members are fully blocked) or by one entry per
    /// combination of `A.primary_claims` against `B`'s statements. Any
    /// gap is an unjustified skip and aborts the phase.
    pub fn audit(
        &self,
        registry: &RunRegistry,
        table: &AlignmentTable,
    ) -> Result<(), ValidationError> {
        let mut covered: BTreeSet<(&RunId, usize, &RunId, StatementKind, usize)> = BTreeSet::new();
        for entry in &self.entries {
            covered.insert((
                &entry.claim_a.run,
                entry.claim_a.index,
                &entry.claim_b.run,
                entry.claim_b.kind,
                entry.claim_b.index,
            ));
        }

        for pair in registry.ordered_pairs() {
            let (Some(run_a), Some(run_b)) = (registry.get(&pair.a), registry.get(&pair.b))
            else {
                continue;
            };

            if self.is_skipped(&pair) {
                let a_blocked = table.all_blocked(run_a.primary_claims.iter().map(String::as_str));
                let b_blocked = table.all_blocked(run_b.statements().map(|(_, _, text)| text));
                if !(a_blocked && b_blocked) {
                    return Err(ValidationError::UnjustifiedSkip {
                        run_a: pair.a.clone(),
                        run_b: pair.b.clone(),
                        detail: "skip recorded but the pair is not fully vocabulary-blocked"
                            .to_string(),
                    });
                }
                continue;
            }

            for index_a in 0..run_a.primary_claims.len() {
                for (kind_b, index_b, _) in run_b.statements() {
                    let key = (&pair.a, index_a, &pair.b, kind_b, index_b);
                    if !covered.contains(&key) {
                        return Err(ValidationError::UnjustifiedSkip {
                            run_a: pair.a.clone(),
                            run_b: pair.b.clone(),
                            detail: format!("primary {index_a} x {kind_b} {index_b} missing"),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
