//! The judgment oracle seam.
//!
//! Every semantic question the engine cannot answer itself (does this term
//! mean the same thing in both runs, do these two claims conflict, can
//! this conflict be resolved) goes through [`JudgmentOracle`]. The engine
//! owns enumeration, ordering, and bookkeeping; the oracle owns judgment.
//! Oracle failures are the one recoverable error tier: the affected item
//! degrades to blocked or indeterminate and the invocation continues.
//!
//! [`ScriptedOracle`] is the bundled implementation: answers are keyed by
//! question content, so a script plus a fixed input set replays the same
//! invocation every time. It backs the test suites and serves as the
//! reference for wiring a live oracle.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conflict::Conflict;
use crate::resolution::ResolutionMechanism;
use crate::run::{RunId, StatementKind};
use crate::vocabulary::TermMeaning;

/// Failure of an individual oracle consultation.
///
/// These never abort an invocation: the item under judgment degrades
/// (blocked term, indeterminate examination, unresolved conflict) and
/// the degradation is visible in the output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// No answer arrived within the configured deadline.
    #[error("oracle timed out after {duration_ms}ms")]
    Timeout {
        /// How long the engine waited, in milliseconds.
        duration_ms: u64,
    },

    /// The oracle could not be reached at all.
    #[error("oracle unavailable: {message}")]
    Unavailable {
        /// Transport-level detail.
        message: String,
    },

    /// The oracle answered, but the answer could not be interpreted.
    #[error("oracle answer malformed: {message}")]
    Malformed {
        /// What was wrong with the answer.
        message: String,
    },
}

impl OracleError {
    /// Creates an `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// One run's usage context for a term under classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermUsage {
    /// The run using the term.
    pub run: RunId,
    /// That run's declared scope.
    pub scope: String,
    /// The run's statements that use the term, in producer order.
    pub statements: Vec<String>,
}

/// Is this shared term used consistently across runs?
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermQuestion {
    /// The term (lowercase).
    pub term: String,
    /// Usage context per run, in canonical run order.
    pub usages: Vec<TermUsage>,
}

/// The oracle's classification of a shared term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum TermJudgment {
    /// Same form, same meaning; no table entry needed.
    Consistent,

    /// Different surface forms, one meaning.
    Synonym {
        /// The form comparisons should rewrite to.
        canonical: String,
        /// Each run's surface form.
        variants: BTreeMap<RunId, String>,
    },

    /// One surface form, diverging meanings.
    Homonym {
        /// Per-run meaning and scope.
        meanings: Vec<TermMeaning>,
        /// Whether declared scopes disambiguate the meanings.
        scope_resolvable: bool,
    },

    /// A coined term; other usages defer to the coiner's definition.
    Neologism {
        /// The run that introduced the term.
        introduced_by: RunId,
        /// The introducing run's definition.
        definition: String,
    },
}

/// Do these two statements, read in one vocabulary, contradict?
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimQuestion {
    /// The first run.
    pub run_a: RunId,
    /// A primary claim of `run_a`, post-alignment.
    pub claim_a: String,
    /// `run_a`'s declared scope.
    pub scope_a: String,
    /// The second run.
    pub run_b: RunId,
    /// A statement of `run_b`, post-alignment.
    pub claim_b: String,
    /// `run_b`'s declared scope.
    pub scope_b: String,
    /// Whether `claim_b` is a primary claim or an imported assumption.
    pub kind_b: StatementKind,
}

/// The oracle's verdict on one statement combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum ClaimJudgment {
    /// The statements can both hold.
    NoConflict,

    /// The statements disagree only because their scopes differ.
    ScopeMismatch {
        /// Why the oracle reads this as a scope artifact.
        argument: String,
    },

    /// The statements rest on contradictory assumptions.
    AssumptionConflict {
        /// Which assumptions collide.
        argument: String,
    },

    /// A genuine contradiction that reconciliation cannot dissolve.
    StructuralConflict {
        /// Why the contradiction is structural.
        argument: String,
    },
}

/// Can this conflict be dissolved inside reconciliation?
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionQuestion {
    /// The conflict under resolution.
    pub conflict: Conflict,
    /// Declared scope of the conflict's first run.
    pub scope_a: String,
    /// Declared scope of the conflict's second run.
    pub scope_b: String,
}

/// The oracle's single resolution attempt for a conflict.
///
/// The oracle tries the mechanisms in protocol order (scope
/// clarification, then assumption surfacing, then vocabulary resolution)
/// and reports where it landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum ResolutionJudgment {
    /// A sharper scope boundary dissolves the conflict.
    ScopeClarified {
        /// The clarified boundary between the two claims.
        boundary: String,
    },

    /// An unstated assumption explains the disagreement.
    AssumptionSurfaced {
        /// The surfaced assumption.
        assumption: String,
        /// Whether the assumption holds; `false` hardens the conflict.
        held: bool,
    },

    /// Aligning one more term dissolves the conflict.
    VocabularyResolved {
        /// The canonical form that resolves it.
        canonical: String,
    },

    /// No mechanism applied; the conflict stands.
    Failed {
        /// The last mechanism tried.
        mechanism: ResolutionMechanism,
        /// Why it did not apply.
        reason: String,
    },
}

/// Do these two runs share a frame at all?
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameQuestion {
    /// The first run.
    pub run_a: RunId,
    /// `run_a`'s declared scope.
    pub scope_a: String,
    /// The second run.
    pub run_b: RunId,
    /// `run_b`'s declared scope.
    pub scope_b: String,
}

/// The oracle's verdict on frame commensurability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum FrameJudgment {
    /// The runs evaluate the world in comparable terms.
    SharedFrame,

    /// No comparison is meaningful between these runs.
    NoCommonFrame {
        /// Why the frames cannot be brought together.
        argument: String,
    },
}

/// One run backing a jointly supported claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportingRun {
    /// The supporting run.
    pub run: RunId,
    /// Its declared evidence source, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Is the support behind this claim independent or one source repeated?
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportQuestion {
    /// The claim, post-alignment.
    pub claim: String,
    /// The runs asserting it, in canonical run order.
    pub supporters: Vec<SupportingRun>,
}

/// The oracle's verdict on support independence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum SupportJudgment {
    /// The runs reached the claim along independent evidence paths.
    Independent,

    /// Every supporter leans on the same source.
    CommonSource {
        /// The shared source.
        source: String,
    },
}

/// External judgment provider consulted by every engine phase.
///
/// Implementations must be thread-safe: the engine fans questions out
/// across a worker pool. Each method answers one question with no
/// session state; the engine guarantees it never asks the same question
/// twice within an invocation, so implementations need no memoization
/// for correctness.
pub trait JudgmentOracle: Send + Sync {
    /// Classifies one shared term across the runs using it.
    fn classify_term(&self, question: &TermQuestion) -> Result<TermJudgment, OracleError>;

    /// Judges one claim-vs-statement combination.
    fn classify_claims(&self, question: &ClaimQuestion) -> Result<ClaimJudgment, OracleError>;

    /// Makes the single permitted resolution attempt for a conflict.
    fn attempt_resolution(
        &self,
        question: &ResolutionQuestion,
    ) -> Result<ResolutionJudgment, OracleError>;

    /// Judges whether two conflict-free runs share a frame.
    fn compare_frames(&self, question: &FrameQuestion) -> Result<FrameJudgment, OracleError>;

    /// Judges whether the support behind a shared claim is independent.
    fn assess_support(&self, question: &SupportQuestion) -> Result<SupportJudgment, OracleError>;
}

/// Deterministic oracle with pre-scripted answers.
///
/// Unscripted questions fall back to the quiet defaults (consistent
/// terms, no conflict, shared frame, independent support, failed
/// resolution), each overridable. `fail_*` entries simulate an outage
/// for exactly the keyed question.
///
/// # Examples
///
/// ```
/// use concord::oracle::{ClaimJudgment, JudgmentOracle, ScriptedOracle};
///
/// let oracle = ScriptedOracle::new().claims(
///     "retries are safe",
///     "retries corrupt the ledger",
///     ClaimJudgment::StructuralConflict {
///         argument: "both cannot hold under any scope split".to_string(),
///     },
/// );
/// ```
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    term_answers: HashMap<String, TermJudgment>,
    term_outages: HashMap<String, OracleError>,
    claim_answers: HashMap<(String, String), ClaimJudgment>,
    claim_outages: HashMap<(String, String), OracleError>,
    resolution_answers: HashMap<(String, String), ResolutionJudgment>,
    resolution_outages: HashMap<(String, String), OracleError>,
    frame_answers: HashMap<(RunId, RunId), FrameJudgment>,
    frame_outages: HashMap<(RunId, RunId), OracleError>,
    support_answers: HashMap<String, SupportJudgment>,
    support_outages: HashMap<String, OracleError>,
    claim_default: Option<ClaimJudgment>,
    resolution_default: Option<ResolutionJudgment>,
}

impl ScriptedOracle {
    /// Creates an oracle with only the quiet defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The error every `fail_*` entry answers with.
    #[must_use]
    pub fn outage() -> OracleError {
        OracleError::unavailable("scripted outage")
    }

    /// Scripts the classification of a term.
    #[must_use]
    pub fn term(mut self, term: impl Into<String>, judgment: TermJudgment) -> Self {
        self.term_answers.insert(term.into(), judgment);
        self
    }

    /// Makes classification of a term fail.
    #[must_use]
    pub fn fail_term(mut self, term: impl Into<String>) -> Self {
        self.term_outages.insert(term.into(), Self::outage());
        self
    }

    /// Scripts the verdict for a claim combination, keyed by the two
    /// post-alignment texts.
    #[must_use]
    pub fn claims(
        mut self,
        claim_a: impl Into<String>,
        claim_b: impl Into<String>,
        judgment: ClaimJudgment,
    ) -> Self {
        self.claim_answers
            .insert((claim_a.into(), claim_b.into()), judgment);
        self
    }

    /// Makes one claim combination fail.
    #[must_use]
    pub fn fail_claims(mut self, claim_a: impl Into<String>, claim_b: impl Into<String>) -> Self {
        self.claim_outages
            .insert((claim_a.into(), claim_b.into()), Self::outage());
        self
    }

    /// Scripts the resolution attempt for the conflict between two claims.
    #[must_use]
    pub fn resolution(
        mut self,
        claim_a: impl Into<String>,
        claim_b: impl Into<String>,
        judgment: ResolutionJudgment,
    ) -> Self {
        self.resolution_answers
            .insert((claim_a.into(), claim_b.into()), judgment);
        self
    }

    /// Makes one resolution attempt fail.
    #[must_use]
    pub fn fail_resolution(
        mut self,
        claim_a: impl Into<String>,
        claim_b: impl Into<String>,
    ) -> Self {
        self.resolution_outages
            .insert((claim_a.into(), claim_b.into()), Self::outage());
        self
    }

    /// Scripts the frame verdict for a pair (lower run id first, matching
    /// how the engine asks).
    #[must_use]
    pub fn frames(
        mut self,
        run_a: impl Into<RunId>,
        run_b: impl Into<RunId>,
        judgment: FrameJudgment,
    ) -> Self {
        self.frame_answers
            .insert((run_a.into(), run_b.into()), judgment);
        self
    }

    /// Makes one frame comparison fail.
    #[must_use]
    pub fn fail_frames(mut self, run_a: impl Into<RunId>, run_b: impl Into<RunId>) -> Self {
        self.frame_outages
            .insert((run_a.into(), run_b.into()), Self::outage());
        self
    }

    /// Scripts the support verdict for a claim.
    #[must_use]
    pub fn support(mut self, claim: impl Into<String>, judgment: SupportJudgment) -> Self {
        self.support_answers.insert(claim.into(), judgment);
        self
    }

    /// Makes one support assessment fail.
    #[must_use]
    pub fn fail_support(mut self, claim: impl Into<String>) -> Self {
        self.support_outages.insert(claim.into(), Self::outage());
        self
    }

    /// Replaces the default claim verdict (normally `NoConflict`).
    #[must_use]
    pub fn default_claims(mut self, judgment: ClaimJudgment) -> Self {
        self.claim_default = Some(judgment);
        self
    }

    /// Replaces the default resolution verdict (normally `Failed`).
    #[must_use]
    pub fn default_resolution(mut self, judgment: ResolutionJudgment) -> Self {
        self.resolution_default = Some(judgment);
        self
    }
}

impl JudgmentOracle for ScriptedOracle {
    fn classify_term(&self, question: &TermQuestion) -> Result<TermJudgment, OracleError> {
        if let Some(err) = self.term_outages.get(&question.term) {
            return Err(err.clone());
        }
        Ok(self
            .term_answers
            .get(&question.term)
            .cloned()
            .unwrap_or(TermJudgment::Consistent))
    }

    fn classify_claims(&self, question: &ClaimQuestion) -> Result<ClaimJudgment, OracleError> {
        let key = (question.claim_a.clone(), question.claim_b.clone());
        if let Some(err) = self.claim_outages.get(&key) {
            return Err(err.clone());
        }
        Ok(self
            .claim_answers
            .get(&key)
            .or(self.claim_default.as_ref())
            .cloned()
            .unwrap_or(ClaimJudgment::NoConflict))
    }

    fn attempt_resolution(
        &self,
        question: &ResolutionQuestion,
    ) -> Result<ResolutionJudgment, OracleError> {
        let key = (
            question.conflict.claim_a.clone(),
            question.conflict.claim_b.clone(),
        );
        if let Some(err) = self.resolution_outages.get(&key) {
            return Err(err.clone());
        }
        Ok(self
            .resolution_answers
            .get(&key)
            .or(self.resolution_default.as_ref())
            .cloned()
            .unwrap_or(ResolutionJudgment::Failed {
                mechanism: ResolutionMechanism::ScopeClarification,
                reason: "no resolution scripted".to_string(),
            }))
    }

    fn compare_frames(&self, question: &FrameQuestion) -> Result<FrameJudgment, OracleError> {
        let key = (question.run_a.clone(), question.run_b.clone());
        if let Some(err) = self.frame_outages.get(&key) {
            return Err(err.clone());
        }
        Ok(self
            .frame_answers
            .get(&key)
            .cloned()
            .unwrap_or(FrameJudgment::SharedFrame))
    }

    fn assess_support(&self, question: &SupportQuestion) -> Result<SupportJudgment, OracleError> {
        if let Some(err) = self.support_outages.get(&question.claim) {
            return Err(err.clone());
        }
        Ok(self
            .support_answers
            .get(&question.claim)
            .cloned()
            .unwrap_or(SupportJudgment::Independent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term_question(term: &str) -> TermQuestion {
        TermQuestion {
            term: term.to_string(),
            usages: Vec::new(),
        }
    }

    fn claim_question(a: &str, b: &str) -> ClaimQuestion {
        ClaimQuestion {
            run_a: RunId::new("ra"),
            claim_a: a.to_string(),
            scope_a: "scope a".to_string(),
            run_b: RunId::new("rb"),
            claim_b: b.to_string(),
            scope_b: "scope b".to_string(),
            kind_b: StatementKind::Primary,
        }
    }

    #[test]
    fn test_unscripted_term_is_consistent() {
        let oracle = ScriptedOracle::new();
        let judgment = oracle.classify_term(&term_question("cache")).unwrap();
        assert_eq!(judgment, TermJudgment::Consistent);
    }

    #[test]
    fn test_scripted_term_answer() {
        let oracle = ScriptedOracle::new().term(
            "window",
            TermJudgment::Homonym {
                meanings: Vec::new(),
                scope_resolvable: false,
            },
        );
        let judgment = oracle.classify_term(&term_question("window")).unwrap();
        assert!(matches!(
            judgment,
            TermJudgment::Homonym {
                scope_resolvable: false,
                ..
            }
        ));
    }

    #[test]
    fn test_failed_term_returns_outage() {
        let oracle = ScriptedOracle::new().fail_term("window");
        let err = oracle.classify_term(&term_question("window")).unwrap_err();
        assert!(matches!(err, OracleError::Unavailable { .. }));
        // Unrelated terms still answer.
        assert!(oracle.classify_term(&term_question("cache")).is_ok());
    }

    #[test]
    fn test_claims_keyed_by_both_texts() {
        let oracle = ScriptedOracle::new().claims(
            "x holds",
            "x does not hold",
            ClaimJudgment::StructuralConflict {
                argument: "direct negation".to_string(),
            },
        );

        let hit = oracle
            .classify_claims(&claim_question("x holds", "x does not hold"))
            .unwrap();
        assert!(matches!(hit, ClaimJudgment::StructuralConflict { .. }));

        let miss = oracle
            .classify_claims(&claim_question("x does not hold", "x holds"))
            .unwrap();
        assert_eq!(miss, ClaimJudgment::NoConflict);
    }

    #[test]
    fn test_default_claims_override() {
        let oracle = ScriptedOracle::new().default_claims(ClaimJudgment::ScopeMismatch {
            argument: "scopes never overlap".to_string(),
        });
        let judgment = oracle.classify_claims(&claim_question("a", "b")).unwrap();
        assert!(matches!(judgment, ClaimJudgment::ScopeMismatch { .. }));
    }

    #[test]
    fn test_unscripted_resolution_fails() {
        use crate::conflict::{Conflict, ConflictId};

        let conflict = Conflict::scope_mismatch(
            ConflictId::derive("a|0|b|primary|0"),
            RunId::new("a"),
            RunId::new("b"),
            "claim a",
            "claim b",
            "scope artifact",
        );
        let question = ResolutionQuestion {
            conflict,
            scope_a: "sa".to_string(),
            scope_b: "sb".to_string(),
        };
        let judgment = ScriptedOracle::new().attempt_resolution(&question).unwrap();
        assert!(matches!(
            judgment,
            ResolutionJudgment::Failed {
                mechanism: ResolutionMechanism::ScopeClarification,
                ..
            }
        ));
    }

    #[test]
    fn test_frame_and_support_defaults() {
        let oracle = ScriptedOracle::new();

        let frames = oracle
            .compare_frames(&FrameQuestion {
                run_a: RunId::new("a"),
                scope_a: "sa".to_string(),
                run_b: RunId::new("b"),
                scope_b: "sb".to_string(),
            })
            .unwrap();
        assert_eq!(frames, FrameJudgment::SharedFrame);

        let support = oracle
            .assess_support(&SupportQuestion {
                claim: "shared claim".to_string(),
                supporters: Vec::new(),
            })
            .unwrap();
        assert_eq!(support, SupportJudgment::Independent);
    }

    #[test]
    fn test_scripted_frame_outage() {
        let oracle = ScriptedOracle::new().fail_frames("a", "b");
        let err = oracle
            .compare_frames(&FrameQuestion {
                run_a: RunId::new("a"),
                scope_a: "sa".to_string(),
                run_b: RunId::new("b"),
                scope_b: "sb".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, OracleError::Unavailable { .. }));
    }
}
