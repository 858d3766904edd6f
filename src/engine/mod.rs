//! The reconciliation engine.
//!
//! This module wires the phases into one synchronous pipeline: register
//! the runs, align vocabulary, examine every claim combination, attempt
//! resolution once per resolvable conflict, build the relationship map,
//! emit the record. Each phase consults the judgment oracle through a
//! worker pool but submits and joins its questions in a fixed order, so
//! the artifacts depend only on the inputs and the oracle's answers,
//! never on thread scheduling.

mod aligner;
mod detector;
mod emitter;
mod map_builder;
mod outcome;
mod resolver;
mod runtime;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::conflict::Conflict;
use crate::error::EngineResult;
use crate::examination::ExaminationLog;
use crate::map::{DangerPolicy, ReconciliationMap};
use crate::oracle::JudgmentOracle;
use crate::record::Record;
use crate::registry::RunRegistry;
use crate::resolution::ResolutionAttempt;
use crate::run::Run;
use crate::vocabulary::AlignmentTable;

use self::detector::Detection;
use self::runtime::OraclePool;

/// Engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Oracle worker threads spawned per invocation.
    pub oracle_workers: usize,

    /// Bound on queued oracle questions; a full queue blocks submission
    /// rather than degrading any answer.
    pub queue_capacity: usize,

    /// How long to wait for any single oracle answer before treating it
    /// as an outage.
    pub oracle_timeout: Duration,

    /// How the most dangerous unresolved conflict is chosen.
    pub danger_policy: DangerPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            oracle_workers: 2,
            queue_capacity: 1024,
            oracle_timeout: Duration::from_secs(30),
            danger_policy: DangerPolicy::default(),
        }
    }
}

/// Everything one invocation produced: the record plus the evidence
/// trail behind it.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// The registered runs, in canonical order.
    pub registry: RunRegistry,

    /// The vocabulary alignment table, including blocked terms.
    pub alignment: AlignmentTable,

    /// Every claim combination examined, excluded, or left
    /// indeterminate, with any wholesale pair skips.
    pub examinations: ExaminationLog,

    /// Every conflict in detection order, carrying post-resolution
    /// classes.
    pub conflicts: Vec<Conflict>,

    /// Every resolution attempt, at most one per conflict.
    pub attempts: Vec<ResolutionAttempt>,

    /// The pairwise relationship map.
    pub map: ReconciliationMap,

    /// The immutable record downstream systems consume.
    pub record: Record,

    /// When the invocation finished. Not part of the record, so it never
    /// disturbs byte-identical reproduction.
    pub completed_at: DateTime<Utc>,
}

/// The reconciliation engine.
///
/// One engine serves any number of invocations; each `reconcile` call is
/// independent and runs its own oracle worker pool for the duration of
/// the pipeline.
pub struct ReconciliationEngine {
    oracle: Arc<dyn JudgmentOracle>,
    config: EngineConfig,
}

impl ReconciliationEngine {
    /// Creates an engine over the given oracle with default settings.
    #[must_use]
    pub fn new(oracle: Arc<dyn JudgmentOracle>) -> Self {
        Self::with_config(oracle, EngineConfig::default())
    }

    /// Creates an engine with explicit settings.
    #[must_use]
    pub fn with_config(oracle: Arc<dyn JudgmentOracle>, config: EngineConfig) -> Self {
        Self { oracle, config }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Reconciles a set of runs into a record.
    ///
    /// Rejects fewer than two runs and duplicate run ids. An oracle
    /// outage never aborts the invocation; the affected items degrade to
    /// indeterminate or blocked and the record still comes out complete.
    pub fn reconcile(&self, runs: Vec<Run>) -> EngineResult<Reconciliation> {
        let registry = RunRegistry::register(runs)?;
        let pool = OraclePool::start(
            Arc::clone(&self.oracle),
            self.config.oracle_workers,
            self.config.queue_capacity,
        );
        let timeout = self.config.oracle_timeout;

        let alignment = aligner::align(&registry, &pool, timeout);
        let Detection { conflicts, log } = detector::detect(&registry, &alignment, &pool, timeout)?;
        let resolution = resolver::resolve(&registry, conflicts, &pool, timeout)?;
        let map = map_builder::build(
            &registry,
            &alignment,
            &log,
            &resolution,
            &pool,
            timeout,
            self.config.danger_policy,
        )?;
        let record = emitter::emit(&registry, &resolution, &map)?;

        Ok(Reconciliation {
            registry,
            alignment,
            examinations: log,
            conflicts: resolution.conflicts,
            attempts: resolution.ledger.into_attempts(),
            map,
            record,
            completed_at: Utc::now(),
        })
    }
}
