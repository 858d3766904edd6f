//! JSON helpers for the engine's wire formats.
//!
//! Serde already provides the serialization; this module centralizes the
//! convenience helpers used at the boundaries (runs in, record and map
//! out) and keeps their error mapping in one place.

use crate::error::{EngineError, EngineResult};
use crate::map::ReconciliationMap;
use crate::record::Record;
use crate::run::Run;

fn serialization_error(context: &str, e: &serde_json::Error) -> EngineError {
    EngineError::Serialization {
        message: format!("{context}: {e}"),
    }
}

/// Deserializes one run from JSON.
///
/// Shape validation happens at registration, not here.
pub fn run_from_json(s: &str) -> EngineResult<Run> {
    serde_json::from_str::<Run>(s).map_err(|e| serialization_error("deserialize run", &e))
}

/// Deserializes a run set from a JSON array.
pub fn runs_from_json(s: &str) -> EngineResult<Vec<Run>> {
    serde_json::from_str::<Vec<Run>>(s).map_err(|e| serialization_error("deserialize runs", &e))
}

/// Serializes a record to pretty JSON.
pub fn record_to_json_pretty(record: &Record) -> EngineResult<String> {
    serde_json::to_string_pretty(record).map_err(|e| serialization_error("serialize record", &e))
}

/// Deserializes a record from JSON.
pub fn record_from_json(s: &str) -> EngineResult<Record> {
    serde_json::from_str::<Record>(s).map_err(|e| serialization_error("deserialize record", &e))
}

/// Serializes a reconciliation map to pretty JSON.
pub fn map_to_json_pretty(map: &ReconciliationMap) -> EngineResult<String> {
    serde_json::to_string_pretty(map).map_err(|e| serialization_error("serialize map", &e))
}
