mod common;

use common::{registry_with, vars, FailWhen, Slow};
use playcore::{SkillStep, Workflow};
use playruntime::{BatchError, BatchOptions, BatchRunner, ExecutionEngine};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn fail_workflow() -> Workflow {
    Workflow::new("guarded").with_step(
        SkillStep::new("check", "fail_when")
            .with_input("fail", "{{ fail }}")
            .with_output_var("check"),
    )
}

fn slow_workflow() -> Workflow {
    Workflow::new("slow").with_step(SkillStep::new("nap", "slow").with_input("delay_ms", "{{ delay_ms }}"))
}

fn inputs_failing_at(count: usize, failing: usize) -> Vec<playcore::Variables> {
    (0..count)
        .map(|i| vars(json!({"fail": i == failing, "n": i})))
        .collect()
}

#[tokio::test]
async fn test_failures_are_isolated_per_input() {
    let runner = BatchRunner::new(Arc::new(ExecutionEngine::new(registry_with(vec![Arc::new(FailWhen)]))));

    let results = runner
        .run_batch(&fail_workflow(), inputs_failing_at(5, 2), BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(results.total(), 5);
    assert_eq!(results.success_count(), 4);
    assert_eq!(results.failure_count(), 1);

    let indexes: Vec<usize> = results.results.iter().map(|r| r.index).collect();
    assert_eq!(indexes, vec![0, 1, 2, 3, 4]);

    let failed = &results.results[2];
    assert!(!failed.success);
    assert!(failed.error.as_deref().unwrap().contains("asked to fail"));
    assert_eq!(failed.input_context["n"], json!(2));
    assert!(!failed.trace.as_ref().unwrap().success);

    for ok in results.results.iter().filter(|r| r.index != 2) {
        assert!(ok.success);
        assert_eq!(ok.trace.as_ref().unwrap().final_context["n"], json!(ok.index));
    }
}

#[tokio::test]
async fn test_results_follow_input_order_not_completion_order() {
    let runner = BatchRunner::new(Arc::new(ExecutionEngine::new(registry_with(vec![Arc::new(Slow::default())]))));
    let inputs = vec![
        vars(json!({"delay_ms": 60})),
        vars(json!({"delay_ms": 30})),
        vars(json!({"delay_ms": 1})),
    ];

    let results = runner
        .run_batch(
            &slow_workflow(),
            inputs,
            BatchOptions {
                max_concurrency: 3,
                continue_on_error: true,
            },
        )
        .await
        .unwrap();

    let delays: Vec<_> = results
        .results
        .iter()
        .map(|r| r.input_context["delay_ms"].clone())
        .collect();
    assert_eq!(delays, vec![json!(60), json!(30), json!(1)]);
}

#[tokio::test]
async fn test_single_slot_serializes_executions() {
    let slow = Arc::new(Slow::default());
    let runner = BatchRunner::new(Arc::new(ExecutionEngine::new(registry_with(vec![slow.clone()]))));
    let inputs = (0..4).map(|_| vars(json!({"delay_ms": 40}))).collect();

    let started = Instant::now();
    let results = runner
        .run_batch(
            &slow_workflow(),
            inputs,
            BatchOptions {
                max_concurrency: 1,
                continue_on_error: true,
            },
        )
        .await
        .unwrap();

    assert_eq!(results.success_count(), 4);
    assert_eq!(slow.max_in_flight.load(Ordering::SeqCst), 1);
    assert!(started.elapsed() >= Duration::from_millis(160));
}

#[tokio::test]
async fn test_concurrency_never_exceeds_limit() {
    let slow = Arc::new(Slow::default());
    let runner = BatchRunner::new(Arc::new(ExecutionEngine::new(registry_with(vec![slow.clone()]))));
    let inputs = (0..6).map(|_| vars(json!({"delay_ms": 20}))).collect();

    runner
        .run_batch(
            &slow_workflow(),
            inputs,
            BatchOptions {
                max_concurrency: 2,
                continue_on_error: true,
            },
        )
        .await
        .unwrap();

    assert!(slow.max_in_flight.load(Ordering::SeqCst) <= 2);
    assert_eq!(slow.calls.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_stop_on_error_aborts_pending_inputs() {
    let slow = Arc::new(Slow::default());
    let runner = BatchRunner::new(Arc::new(ExecutionEngine::new(registry_with(vec![
        Arc::new(FailWhen),
        slow.clone(),
    ]))));
    let workflow = Workflow::new("guarded")
        .with_step(SkillStep::new("check", "fail_when").with_input("fail", "{{ fail }}"))
        .with_step(SkillStep::new("nap", "slow").with_input("delay_ms", 20));

    let err = runner
        .run_batch(
            &workflow,
            inputs_failing_at(5, 1),
            BatchOptions {
                max_concurrency: 1,
                continue_on_error: false,
            },
        )
        .await
        .unwrap_err();

    match err {
        BatchError::ExecutionFailed { index, .. } => assert_eq!(index, 1),
        other => panic!("expected ExecutionFailed, got {:?}", other),
    }
    assert!(slow.calls.load(Ordering::SeqCst) < 4);
}

#[tokio::test]
async fn test_empty_batch() {
    let runner = BatchRunner::new(Arc::new(ExecutionEngine::new(registry_with(vec![]))));
    let results = runner
        .run_batch(&fail_workflow(), Vec::new(), BatchOptions::default())
        .await
        .unwrap();
    assert_eq!(results.total(), 0);
}

#[tokio::test]
async fn test_exports() {
    let runner = BatchRunner::new(Arc::new(ExecutionEngine::new(registry_with(vec![Arc::new(FailWhen)]))));
    let results = runner
        .run_batch(&fail_workflow(), inputs_failing_at(3, 0), BatchOptions::default())
        .await
        .unwrap();

    let csv = results.to_csv().unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "index,success,duration_ms,error");
    assert!(lines[1].starts_with("0,false,"));
    assert!(lines[2].starts_with("1,true,"));
    assert!(lines[2].ends_with(','));

    let rows = results.summary_rows();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].error, "Skill execution failed: fail_when");
    assert!(rows[1].error.is_empty());

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("results.json");
    results.save_json(&path).unwrap();
    let report: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(report["total"], json!(3));
    assert_eq!(report["failure_count"], json!(1));
    assert_eq!(report["results"][1]["trace"]["playbook_name"], json!("guarded"));

    let csv_path = dir.path().join("results.csv");
    results.save_csv(&csv_path).unwrap();
    assert_eq!(std::fs::read_to_string(&csv_path).unwrap(), csv);
}
