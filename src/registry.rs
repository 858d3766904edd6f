//! Run registry: validated, deterministically ordered input sets.
//!
//! Every invocation starts here: the registry enforces the input
//! invariants (at least two runs, distinct ids, non-empty scope and
//! claims) and fixes the canonical order every later phase iterates in.
//! Pair enumeration lives here too, so "all C(n,2) pairs, lower id
//! first" is defined in exactly one place.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::run::{Run, RunId};

/// An unordered pair of runs, stored with the lower id first.
///
/// Pairs are the unit of reconciliation: relationships, conflicts, and
/// examination entries all attach to a pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunPair {
    /// Lexicographically smaller run id.
    pub a: RunId,
    /// Lexicographically larger run id.
    pub b: RunId,
}

impl RunPair {
    /// Creates a pair, normalizing order so the smaller id is `a`.
    #[must_use]
    pub fn new(x: RunId, y: RunId) -> Self {
        if x <= y {
            Self { a: x, b: y }
        } else {
            Self { a: y, b: x }
        }
    }

    /// True if the given run is one of the pair's members.
    #[must_use]
    pub fn contains(&self, run: &RunId) -> bool {
        &self.a == run || &self.b == run
    }
}

impl std::fmt::Display for RunPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.a, self.b)
    }
}

/// The validated input set of one reconciliation invocation.
///
/// Construction sorts runs ascending by id; that order is the canonical
/// iteration order for every downstream phase, which is what makes the
/// final record independent of submission order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRegistry {
    runs: Vec<Run>,
}

impl RunRegistry {
    /// Validates and registers an input set.
    ///
    /// Rejects sets with fewer than two runs, duplicate ids, or any run
    /// that fails its own shape validation.
    pub fn register(mut runs: Vec<Run>) -> Result<Self, ValidationError> {
        if runs.len() < 2 {
            return Err(ValidationError::TooFewRuns { count: runs.len() });
        }
        for run in &runs {
            run.validate()?;
        }
        runs.sort_by(|x, y| x.id.cmp(&y.id));
        for window in runs.windows(2) {
            if window[0].id == window[1].id {
                return Err(ValidationError::DuplicateRunId {
                    run: window[0].id.clone(),
                });
            }
        }
        Ok(Self { runs })
    }

    /// Runs in canonical (ascending id) order.
    #[must_use]
    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Number of registered runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// True if the registry holds no runs. Unreachable after `register`,
    /// kept for the usual len/is_empty pairing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Looks up a run by id.
    #[must_use]
    pub fn get(&self, id: &RunId) -> Option<&Run> {
        self.runs
            .binary_search_by(|run| run.id.cmp(id))
            .ok()
            .map(|idx| &self.runs[idx])
    }

    /// All C(n,2) pairs in canonical order: outer loop ascending by the
    /// lower id, inner loop ascending by the higher.
    #[must_use]
    pub fn ordered_pairs(&self) -> Vec<RunPair> {
        let mut pairs = Vec::with_capacity(self.runs.len() * (self.runs.len() - 1) / 2);
        for i in 0..self.runs.len() {
            for j in (i + 1)..self.runs.len() {
                pairs.push(RunPair {
                    a: self.runs[i].id.clone(),
                    b: self.runs[j].id.clone(),
                });
            }
        }
        pairs
    }

    /// Number of pairs the map must cover.
    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.runs.len() * (self.runs.len() - 1) / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::ProtocolKind;

    fn run(id: &str) -> Run {
        Run::builder(id, ProtocolKind::Revision)
            .scope("shared scope")
            .claim(format!("claim from {id}"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_sorts_by_id() {
        let registry = RunRegistry::register(vec![run("c"), run("a"), run("b")]).unwrap();
        let ids: Vec<_> = registry.runs().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_register_rejects_single_run() {
        let err = RunRegistry::register(vec![run("a")]).unwrap_err();
        assert!(matches!(err, ValidationError::TooFewRuns { count: 1 }));
    }

    #[test]
    fn test_register_rejects_duplicate_ids() {
        let err = RunRegistry::register(vec![run("a"), run("b"), run("a")]).unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateRunId { .. }));
    }

    #[test]
    fn test_register_rejects_invalid_run() {
        let mut bad = run("a");
        bad.scope = String::new();
        let err = RunRegistry::register(vec![bad, run("b")]).unwrap_err();
        assert!(matches!(err, ValidationError::EmptyScope { .. }));
    }

    #[test]
    fn test_ordered_pairs_complete() {
        let registry =
            RunRegistry::register(vec![run("d"), run("b"), run("a"), run("c")]).unwrap();
        let pairs = registry.ordered_pairs();

        assert_eq!(pairs.len(), 6);
        assert_eq!(pairs.len(), registry.pair_count());
        assert_eq!(pairs[0], RunPair::new(RunId::new("a"), RunId::new("b")));
        assert_eq!(pairs[5], RunPair::new(RunId::new("c"), RunId::new("d")));
        // Lower id always first.
        for pair in &pairs {
            assert!(pair.a < pair.b);
        }
    }

    #[test]
    fn test_pair_normalizes_order() {
        let pair = RunPair::new(RunId::new("z"), RunId::new("a"));
        assert_eq!(pair.a, RunId::new("a"));
        assert_eq!(pair.b, RunId::new("z"));
        assert!(pair.contains(&RunId::new("z")));
        assert!(!pair.contains(&RunId::new("m")));
    }

    #[test]
    fn test_get_by_id() {
        let registry = RunRegistry::register(vec![run("b"), run("a")]).unwrap();
        assert!(registry.get(&RunId::new("a")).is_some());
        assert!(registry.get(&RunId::new("missing")).is_none());
    }

    #[test]
    fn test_registration_is_submission_order_independent() {
        let forward = RunRegistry::register(vec![run("a"), run("b"), run("c")]).unwrap();
        let reverse = RunRegistry::register(vec![run("c"), run("b"), run("a")]).unwrap();
        assert_eq!(
            serde_json::to_string(&forward.ordered_pairs()).unwrap(),
            serde_json::to_string(&reverse.ordered_pairs()).unwrap()
        );
    }
}
