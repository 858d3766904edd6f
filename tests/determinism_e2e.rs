//! Identical inputs plus identical oracle answers must reproduce the
//! record byte for byte, regardless of worker count or submission order.

use std::sync::Arc;

use concord::codec::record_to_json_pretty;
use concord::{
    ClaimJudgment, EngineConfig, ProtocolKind, Reconciliation, ReconciliationEngine,
    ResolutionJudgment, Run, ScriptedOracle, SupportJudgment,
};

fn runs() -> Vec<Run> {
    let a = Run::builder("a", ProtocolKind::Revision)
        .version("3.1.0")
        .outcome("succeeded")
        .scope("commit path")
        .claim("commits are totally ordered")
        .claim("fsync happens per batch")
        .build()
        .unwrap();
    let b = Run::builder("b", ProtocolKind::ObservationValidation)
        .version("3.1.0")
        .outcome("succeeded")
        .scope("replica path")
        .claim("commits interleave on replicas")
        .build()
        .unwrap();
    let c = Run::builder("c", ProtocolKind::FidelityAudit)
        .version("3.1.0")
        .outcome("succeeded")
        .scope("batching")
        .claim("fsync happens per batch")
        .source("perf harness")
        .build()
        .unwrap();
    vec![a, b, c]
}

fn oracle() -> ScriptedOracle {
    ScriptedOracle::new()
        .claims(
            "commits are totally ordered",
            "commits interleave on replicas",
            ClaimJudgment::StructuralConflict {
                argument: "total order and interleaving cannot both hold".to_string(),
            },
        )
        .claims(
            "fsync happens per batch",
            "commits interleave on replicas",
            ClaimJudgment::ScopeMismatch {
                argument: "batching was only measured on the primary".to_string(),
            },
        )
        .resolution(
            "fsync happens per batch",
            "commits interleave on replicas",
            ResolutionJudgment::ScopeClarified {
                boundary: "batch fsync applies to the primary only".to_string(),
            },
        )
        .support(
            "fsync happens per batch",
            SupportJudgment::CommonSource {
                source: "perf harness".to_string(),
            },
        )
}

fn reconcile_with(config: EngineConfig, input: Vec<Run>) -> Reconciliation {
    ReconciliationEngine::with_config(Arc::new(oracle()), config)
        .reconcile(input)
        .unwrap()
}

#[test]
fn identical_inputs_reproduce_the_record_byte_for_byte() {
    let first = reconcile_with(EngineConfig::default(), runs());
    let second = reconcile_with(EngineConfig::default(), runs());

    assert_eq!(
        first.record.input_fingerprint,
        second.record.input_fingerprint
    );
    assert_eq!(
        record_to_json_pretty(&first.record).unwrap(),
        record_to_json_pretty(&second.record).unwrap()
    );

    // The scenario is non-trivial: one structural conflict survives, one
    // scope mismatch resolves, one claim is jointly supported.
    assert_eq!(first.record.total_conflicts, 2);
    assert_eq!(first.record.resolved_conflicts, 1);
    assert_eq!(first.record.unresolved_conflicts, 1);
    assert_eq!(first.record.jointly_supported_claims, 1);
    assert!(first.map.most_dangerous_conflict.is_some());
}

#[test]
fn worker_count_does_not_change_the_record() {
    let serial = reconcile_with(
        EngineConfig {
            oracle_workers: 1,
            queue_capacity: 2,
            ..EngineConfig::default()
        },
        runs(),
    );
    let parallel = reconcile_with(
        EngineConfig {
            oracle_workers: 4,
            queue_capacity: 64,
            ..EngineConfig::default()
        },
        runs(),
    );

    assert_eq!(
        record_to_json_pretty(&serial.record).unwrap(),
        record_to_json_pretty(&parallel.record).unwrap()
    );
    // The full artifacts agree too, not only the record.
    assert_eq!(serial.map, parallel.map);
    assert_eq!(serial.conflicts, parallel.conflicts);
    assert_eq!(serial.attempts, parallel.attempts);
}

#[test]
fn submission_order_does_not_change_the_record() {
    let forward = reconcile_with(EngineConfig::default(), runs());
    let mut reversed_runs = runs();
    reversed_runs.reverse();
    let reversed = reconcile_with(EngineConfig::default(), reversed_runs);

    assert_eq!(
        forward.record.input_fingerprint,
        reversed.record.input_fingerprint
    );
    assert_eq!(
        record_to_json_pretty(&forward.record).unwrap(),
        record_to_json_pretty(&reversed.record).unwrap()
    );
    assert_eq!(forward.record.input_runs, reversed.record.input_runs);
}
