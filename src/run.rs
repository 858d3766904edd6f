//! Run records, the immutable inputs to reconciliation.
//!
//! A `Run` is one externally produced analysis output: the ruling of an
//! upstream protocol, carrying its scope, primary claims, external
//! assumptions, and acknowledged limitations. The engine never mutates a
//! run; it only reads, orders, and compares them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Stable identifier of a run, assigned by the producing protocol.
///
/// Run ids are opaque strings; the engine only requires them to be
/// distinct and sortable (registry order is ascending by id).
///
/// # Examples
///
/// ```
/// use concord::RunId;
///
/// let id = RunId::new("fa-2026-011");
/// assert_eq!(id.as_str(), "fa-2026-011");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Creates a run id from the producing protocol's identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RunId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RunId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The upstream protocol that produced a run (or that an upstream action
/// asks to be re-run).
///
/// `ConceptBoundary` is the vocabulary disambiguation protocol named by
/// blocker actions; `Reconciliation` is this engine's own protocol, named
/// when the only remedy is resubmitting the whole invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    /// Revision ruling on an existing artifact.
    Revision,
    /// Deprecation ruling on an existing artifact.
    Deprecation,
    /// Fidelity audit of an implementation against its contract.
    FidelityAudit,
    /// Validation of an observed behavior or measurement.
    ObservationValidation,
    /// Prioritization ranking across candidate work.
    Prioritization,
    /// Adversarial design exploration.
    AdversarialDesign,
    /// Concept boundary (vocabulary disambiguation) protocol.
    ConceptBoundary,
    /// The reconciliation protocol itself.
    Reconciliation,
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Revision => write!(f, "revision"),
            Self::Deprecation => write!(f, "deprecation"),
            Self::FidelityAudit => write!(f, "fidelity_audit"),
            Self::ObservationValidation => write!(f, "observation_validation"),
            Self::Prioritization => write!(f, "prioritization"),
            Self::AdversarialDesign => write!(f, "adversarial_design"),
            Self::ConceptBoundary => write!(f, "concept_boundary"),
            Self::Reconciliation => write!(f, "reconciliation"),
        }
    }
}

/// Which statement list of a run a statement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    /// One of the run's `primary_claims`.
    Primary,
    /// One of the run's `external_assumptions`.
    Assumption,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Assumption => write!(f, "assumption"),
        }
    }
}

/// One externally produced, immutable analysis output.
///
/// Runs arrive fully populated from their producing protocols; the engine
/// validates shape (non-empty `scope` and `primary_claims`) and never
/// attempts to infer missing fields.
///
/// # Examples
///
/// ```
/// use concord::{ProtocolKind, Run};
///
/// let run = Run::builder("fa-7", ProtocolKind::FidelityAudit)
///     .version("1.2")
///     .outcome("pass with caveats")
///     .scope("checkout service, steady-state load")
///     .claim("p99 latency stays under 200ms")
///     .assumption("cache hit rate remains above 90%")
///     .build()
///     .unwrap();
/// assert_eq!(run.primary_claims.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    /// Identifier assigned by the producing protocol.
    pub id: RunId,

    /// Which protocol produced this run.
    pub protocol_kind: ProtocolKind,

    /// Producer-reported version of the protocol or ruleset.
    pub version: String,

    /// The run's own verdict, free text.
    pub outcome: String,

    /// What the run covers; free text, never empty.
    pub scope: String,

    /// Primary assertions, in producer order; never empty.
    pub primary_claims: Vec<String>,

    /// Assumptions the run imports from outside its own scope.
    #[serde(default)]
    pub external_assumptions: Vec<String>,

    /// Limitations the producer acknowledged.
    #[serde(default)]
    pub acknowledged_limitations: Vec<String>,

    /// Declared evidence source, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Run {
    /// Starts a builder for a run with the given id and producing protocol.
    #[must_use]
    pub fn builder(id: impl Into<RunId>, protocol_kind: ProtocolKind) -> RunBuilder {
        RunBuilder::new(id, protocol_kind)
    }

    /// Validates the run's shape.
    ///
    /// Returns `ValidationError` if `scope` is empty, `primary_claims` is
    /// empty, or any claim/assumption is blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.scope.trim().is_empty() {
            return Err(ValidationError::EmptyScope {
                run: self.id.clone(),
            });
        }
        if self.primary_claims.is_empty() {
            return Err(ValidationError::NoPrimaryClaims {
                run: self.id.clone(),
            });
        }
        for (index, claim) in self.primary_claims.iter().enumerate() {
            if claim.trim().is_empty() {
                return Err(ValidationError::EmptyClaim {
                    run: self.id.clone(),
                    index,
                });
            }
        }
        for (index, assumption) in self.external_assumptions.iter().enumerate() {
            if assumption.trim().is_empty() {
                return Err(ValidationError::EmptyClaim {
                    run: self.id.clone(),
                    index: self.primary_claims.len() + index,
                });
            }
        }
        Ok(())
    }

    /// Total number of comparable statements (claims plus assumptions).
    #[must_use]
    pub fn statement_count(&self) -> usize {
        self.primary_claims.len() + self.external_assumptions.len()
    }

    /// Statements of this run as comparison targets: primary claims
    /// first, then external assumptions, each indexed within its own
    /// list.
    pub fn statements(&self) -> impl Iterator<Item = (StatementKind, usize, &str)> {
        let claims = self
            .primary_claims
            .iter()
            .enumerate()
            .map(|(index, text)| (StatementKind::Primary, index, text.as_str()));
        let assumptions = self
            .external_assumptions
            .iter()
            .enumerate()
            .map(|(index, text)| (StatementKind::Assumption, index, text.as_str()));
        claims.chain(assumptions)
    }
}

/// Fluent builder for [`Run`].
///
/// `build()` enforces the run invariants so malformed runs are rejected at
/// construction rather than at registry time.
#[derive(Debug, Clone)]
pub struct RunBuilder {
    id: RunId,
    protocol_kind: ProtocolKind,
    version: Option<String>,
    outcome: Option<String>,
    scope: Option<String>,
    primary_claims: Vec<String>,
    external_assumptions: Vec<String>,
    acknowledged_limitations: Vec<String>,
    source: Option<String>,
}

impl RunBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(id: impl Into<RunId>, protocol_kind: ProtocolKind) -> Self {
        Self {
            id: id.into(),
            protocol_kind,
            version: None,
            outcome: None,
            scope: None,
            primary_claims: Vec::new(),
            external_assumptions: Vec::new(),
            acknowledged_limitations: Vec::new(),
            source: None,
        }
    }

    /// Sets the producer-reported version (default: "1.0").
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the run's own verdict text.
    #[must_use]
    pub fn outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }

    /// Sets the coverage scope (required).
    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Appends a primary claim (at least one required).
    #[must_use]
    pub fn claim(mut self, claim: impl Into<String>) -> Self {
        self.primary_claims.push(claim.into());
        self
    }

    /// Appends an external assumption.
    #[must_use]
    pub fn assumption(mut self, assumption: impl Into<String>) -> Self {
        self.external_assumptions.push(assumption.into());
        self
    }

    /// Appends an acknowledged limitation.
    #[must_use]
    pub fn limitation(mut self, limitation: impl Into<String>) -> Self {
        self.acknowledged_limitations.push(limitation.into());
        self
    }

    /// Sets the declared evidence source.
    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Builds the run.
    ///
    /// Returns `ValidationError` if the scope is missing/blank or no
    /// primary claim was supplied.
    pub fn build(self) -> Result<Run, ValidationError> {
        let run = Run {
            id: self.id,
            protocol_kind: self.protocol_kind,
            version: self.version.unwrap_or_else(|| "1.0".to_string()),
            outcome: self.outcome.unwrap_or_default(),
            scope: self.scope.unwrap_or_default(),
            primary_claims: self.primary_claims,
            external_assumptions: self.external_assumptions,
            acknowledged_limitations: self.acknowledged_limitations,
            source: self.source,
        };
        run.validate()?;
        Ok(run)
    }
}
