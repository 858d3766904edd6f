//! Pair relationships and the overall verdict they roll up into.
//!
//! Every pair gets exactly one relationship, and each relationship
//! variant carries its own evidence: you cannot claim `reconciled`
//! without the resolved conflict ids, or `conflicted` without the
//! unresolved ids and their upstream actions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::conflict::{ConflictId, UpstreamAction};
use crate::registry::RunPair;
use crate::run::RunId;

/// A run's declared scope, carried as compatibility evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunScope {
    /// The run.
    pub run: RunId,
    /// Its declared scope.
    pub scope: String,
}

impl RunScope {
    /// Creates a scope record.
    #[must_use]
    pub fn new(run: RunId, scope: impl Into<String>) -> Self {
        Self {
            run,
            scope: scope.into(),
        }
    }
}

/// The determination for one pair, with variant-specific evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "relationship", rename_all = "snake_case")]
pub enum Relationship {
    /// No conflict touched the pair and the runs share a frame.
    Compatible {
        /// Both runs' declared scopes.
        scopes: Vec<RunScope>,
    },

    /// Conflicts touched the pair; every one was resolved.
    Reconciled {
        /// The resolved conflicts, in detection order.
        resolved_conflicts: Vec<ConflictId>,
    },

    /// At least one unresolved conflict (or an indeterminate
    /// examination) touches the pair.
    Conflicted {
        /// The unresolved conflicts, in detection order.
        unresolved_conflicts: Vec<ConflictId>,
        /// The steps that would unblock the pair.
        upstream_actions: Vec<UpstreamAction>,
    },

    /// No common frame of comparison exists; a terminal classification,
    /// not an error.
    Incommensurable {
        /// Why the frames cannot be brought together.
        argument: String,
    },
}

impl Relationship {
    /// The evidence-free kind of this relationship.
    #[must_use]
    pub const fn kind(&self) -> RelationshipKind {
        match self {
            Self::Compatible { .. } => RelationshipKind::Compatible,
            Self::Reconciled { .. } => RelationshipKind::Reconciled,
            Self::Conflicted { .. } => RelationshipKind::Conflicted,
            Self::Incommensurable { .. } => RelationshipKind::Incommensurable,
        }
    }
}

/// Relationship discriminant, used for counting and aggregation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// Both runs can hold as stated.
    Compatible,
    /// Conflicts existed and were all resolved.
    Reconciled,
    /// Unresolved conflicts remain.
    Conflicted,
    /// No common frame of comparison.
    Incommensurable,
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compatible => write!(f, "compatible"),
            Self::Reconciled => write!(f, "reconciled"),
            Self::Conflicted => write!(f, "conflicted"),
            Self::Incommensurable => write!(f, "incommensurable"),
        }
    }
}

/// The single verdict over the whole input set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallRelationship {
    /// Every pair is compatible.
    Compatible,
    /// Every pair is reconciled.
    Reconciled,
    /// Every pair is conflicted.
    Conflicted,
    /// Every pair is incommensurable.
    Incommensurable,
    /// The pairs disagree about their relationship.
    Mixed,
}

impl From<RelationshipKind> for OverallRelationship {
    fn from(kind: RelationshipKind) -> Self {
        match kind {
            RelationshipKind::Compatible => Self::Compatible,
            RelationshipKind::Reconciled => Self::Reconciled,
            RelationshipKind::Conflicted => Self::Conflicted,
            RelationshipKind::Incommensurable => Self::Incommensurable,
        }
    }
}

impl fmt::Display for OverallRelationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compatible => write!(f, "compatible"),
            Self::Reconciled => write!(f, "reconciled"),
            Self::Conflicted => write!(f, "conflicted"),
            Self::Incommensurable => write!(f, "incommensurable"),
            Self::Mixed => write!(f, "mixed"),
        }
    }
}

/// One pair's relationship, keyed by the pair itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPairRelationship {
    /// The pair.
    pub pair: RunPair,
    /// Its determination.
    pub relationship: Relationship,
}

impl RunPairRelationship {
    /// Creates a pair relationship.
    #[must_use]
    pub const fn new(pair: RunPair, relationship: Relationship) -> Self {
        Self { pair, relationship }
    }

    /// The relationship's kind.
    #[must_use]
    pub const fn kind(&self) -> RelationshipKind {
        self.relationship.kind()
    }
}
