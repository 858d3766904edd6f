//! Vocabulary alignment: shared terms, their cross-run classification, and
//! blocked-term bookkeeping.
//!
//! Before any claims are compared, every term used by more than one run is
//! classified (synonym, homonym, neologism) so that comparisons happen in
//! one vocabulary. A homonym that declared scopes cannot disambiguate
//! becomes a *blocker*: claims using it are excluded from conflict
//! detection for the rest of the invocation, and the concept-boundary
//! protocol is named as the upstream remedy.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{OnceLock, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::run::{Run, RunId};

const REGEX_CACHE_MAX: usize = 1024;

static REGEX_CACHE: OnceLock<RwLock<HashMap<String, regex::Regex>>> = OnceLock::new();

fn cached_regex(pattern: &str) -> EngineResult<regex::Regex> {
    let cache = REGEX_CACHE.get_or_init(|| RwLock::new(HashMap::new()));

    {
        let guard = cache
            .read()
            .map_err(|_| EngineError::internal("vocabulary regex cache lock poisoned"))?;
        if let Some(re) = guard.get(pattern) {
            return Ok(re.clone());
        }
    }

    let compiled = regex::Regex::new(pattern)
        .map_err(|e| EngineError::internal(format!("invalid vocabulary pattern '{pattern}': {e}")))?;

    let mut guard = cache
        .write()
        .map_err(|_| EngineError::internal("vocabulary regex cache lock poisoned"))?;

    if guard.len() >= REGEX_CACHE_MAX {
        // Keep the cache bounded to avoid unbounded memory usage.
        guard.clear();
    }

    // Another thread may have inserted it while we compiled.
    guard
        .entry(pattern.to_string())
        .or_insert_with(|| compiled.clone());
    Ok(compiled)
}

/// Splits a statement into lowercase alphanumeric terms.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_ascii_lowercase)
}

/// Terms appearing in more than one run's claims or assumptions, mapped to
/// the runs using them. Keys are lowercase tokens; iteration order is the
/// canonical classification order for phase 1.
#[must_use]
pub fn shared_terms(runs: &[Run]) -> BTreeMap<String, BTreeSet<RunId>> {
    let mut usage: BTreeMap<String, BTreeSet<RunId>> = BTreeMap::new();
    for run in runs {
        for statement in run
            .primary_claims
            .iter()
            .chain(run.external_assumptions.iter())
        {
            for token in tokenize(statement) {
                usage.entry(token).or_default().insert(run.id.clone());
            }
        }
    }
    usage.retain(|_, users| users.len() > 1);
    usage
}

/// Why a term is blocked for this invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// A homonym whose declared scopes do not disambiguate its meanings.
    NotScopeResolvable,

    /// The oracle could not be consulted for this term.
    OracleUnavailable,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotScopeResolvable => write!(f, "not_scope_resolvable"),
            Self::OracleUnavailable => write!(f, "oracle_unavailable"),
        }
    }
}

/// A term excluded from comparison for the rest of the invocation.
///
/// A blocker never halts the run: claims using the term are skipped with
/// this record as justification, and disambiguating the term is surfaced
/// as an upstream action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedTerm {
    /// The blocked term (lowercase).
    pub term: String,
    /// Why it is blocked.
    pub reason: BlockReason,
    /// Runs whose statements use the term.
    pub runs: BTreeSet<RunId>,
}

impl fmt::Display for BlockedTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' ({})", self.term, self.reason)
    }
}

/// One run's usage of a homonymous term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermMeaning {
    /// The run using the term.
    pub run: RunId,
    /// What the term means in that run.
    pub meaning: String,
    /// The scope under which that meaning applies.
    pub scope: String,
}

/// How a shared term relates across the runs that use it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TermAlignment {
    /// Different surface forms, one meaning. `variants` maps each run to
    /// the form it uses; comparison rewrites variants to `canonical`.
    Synonym {
        /// The canonical form used after rewriting.
        canonical: String,
        /// Per-run surface forms.
        variants: BTreeMap<RunId, String>,
    },

    /// One surface form, diverging meanings.
    Homonym {
        /// Per-run meaning and scope.
        meanings: Vec<TermMeaning>,
        /// Whether declared scopes disambiguate the meanings.
        scope_resolvable: bool,
        /// Present exactly when `scope_resolvable` is false.
        #[serde(skip_serializing_if = "Option::is_none")]
        blocker: Option<BlockedTerm>,
    },

    /// A term one run coined; other usages defer to its definition.
    Neologism {
        /// The run that introduced the term.
        introduced_by: RunId,
        /// The introducing run's definition.
        definition: String,
    },
}

/// A classified vocabulary entry for one shared term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyTerm {
    /// The term (lowercase).
    pub term: String,
    /// Its cross-run classification.
    pub alignment: TermAlignment,
}

impl VocabularyTerm {
    /// Creates a synonym entry.
    #[must_use]
    pub fn synonym(
        term: impl Into<String>,
        canonical: impl Into<String>,
        variants: BTreeMap<RunId, String>,
    ) -> Self {
        Self {
            term: term.into(),
            alignment: TermAlignment::Synonym {
                canonical: canonical.into(),
                variants,
            },
        }
    }

    /// Creates a homonym entry.
    ///
    /// When `scope_resolvable` is false the entry carries a blocker for
    /// `affected` runs, keeping the not-resolvable-implies-blocker
    /// invariant true by construction.
    #[must_use]
    pub fn homonym(
        term: impl Into<String>,
        meanings: Vec<TermMeaning>,
        scope_resolvable: bool,
        affected: BTreeSet<RunId>,
    ) -> Self {
        let term = term.into();
        let blocker = if scope_resolvable {
            None
        } else {
            Some(BlockedTerm {
                term: term.clone(),
                reason: BlockReason::NotScopeResolvable,
                runs: affected,
            })
        };
        Self {
            term,
            alignment: TermAlignment::Homonym {
                meanings,
                scope_resolvable,
                blocker,
            },
        }
    }

    /// Creates a neologism entry.
    #[must_use]
    pub fn neologism(
        term: impl Into<String>,
        introduced_by: RunId,
        definition: impl Into<String>,
    ) -> Self {
        Self {
            term: term.into(),
            alignment: TermAlignment::Neologism {
                introduced_by,
                definition: definition.into(),
            },
        }
    }

    /// The blocker carried by this entry, if any.
    #[must_use]
    pub fn blocker(&self) -> Option<&BlockedTerm> {
        match &self.alignment {
            TermAlignment::Homonym { blocker, .. } => blocker.as_ref(),
            TermAlignment::Synonym { .. } | TermAlignment::Neologism { .. } => None,
        }
    }
}

/// The finalized output of vocabulary alignment.
///
/// Holds every classified term plus an index of blocked terms. The table
/// is consulted for two things: rewriting claim text into the canonical
/// vocabulary, and deciding whether a statement is excluded from
/// comparison because it uses a blocked term.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentTable {
    terms: BTreeMap<String, VocabularyTerm>,
    blocked: BTreeMap<String, BlockedTerm>,
}

impl AlignmentTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a classified term, indexing its blocker if it carries one.
    pub fn insert(&mut self, entry: VocabularyTerm) {
        if let Some(blocker) = entry.blocker() {
            self.blocked.insert(blocker.term.clone(), blocker.clone());
        }
        self.terms.insert(entry.term.clone(), entry);
    }

    /// Records a blocker that has no vocabulary entry (the oracle could
    /// not classify the term at all).
    pub fn block(&mut self, blocker: BlockedTerm) {
        self.blocked.insert(blocker.term.clone(), blocker);
    }

    /// Classified entries in term order.
    pub fn terms(&self) -> impl Iterator<Item = &VocabularyTerm> {
        self.terms.values()
    }

    /// Blocked terms in term order.
    pub fn blocked_terms(&self) -> impl Iterator<Item = &BlockedTerm> {
        self.blocked.values()
    }

    /// Number of classified terms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// True if no terms were classified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Number of blocked terms.
    #[must_use]
    pub fn blocked_count(&self) -> usize {
        self.blocked.len()
    }

    /// True if the given term (lowercase) is blocked.
    #[must_use]
    pub fn is_blocked(&self, term: &str) -> bool {
        self.blocked.contains_key(term)
    }

    /// The blocker for the given term (lowercase), if it is blocked.
    #[must_use]
    pub fn blocker_for(&self, term: &str) -> Option<&BlockedTerm> {
        self.blocked.get(term)
    }

    /// The first blocked term a statement uses, in token order.
    ///
    /// Returns `None` when the statement is clear to examine.
    #[must_use]
    pub fn statement_blocked(&self, text: &str) -> Option<&BlockedTerm> {
        tokenize(text).find_map(|token| self.blocked.get(&token))
    }

    /// True if every one of the given statements uses a blocked term.
    pub fn all_blocked<'a>(&self, mut statements: impl Iterator<Item = &'a str>) -> bool {
        statements.all(|text| self.statement_blocked(text).is_some())
    }

    /// Rewrites a statement into the canonical vocabulary for comparison.
    ///
    /// Only synonym entries rewrite: the given run's variant form is
    /// replaced (whole word, case-insensitive) with the canonical form.
    /// Homonyms and neologisms keep their surface text.
    pub fn normalize(&self, run: &RunId, text: &str) -> EngineResult<String> {
        let mut out = text.to_string();
        for entry in self.terms.values() {
            let TermAlignment::Synonym { canonical, variants } = &entry.alignment else {
                continue;
            };
            let Some(variant) = variants.get(run) else {
                continue;
            };
            if variant == canonical {
                continue;
            }
            let pattern = format!(r"(?i)\b{}\b", regex::escape(variant));
            let re = cached_regex(&pattern)?;
            out = re.replace_all(&out, canonical.as_str()).into_owned();
        }
        Ok(out)
    }
}
