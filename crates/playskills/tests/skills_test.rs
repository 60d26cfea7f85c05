use playcore::{ExecutionError, Payload, Skill, SkillError, Workflow};
use playruntime::{ExecutionEngine, SkillRegistry};
use playskills::{register_all, AddNumbersSkill, DelaySkill, HttpRequestSkill, JsonParseSkill, JsonStringifySkill};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn payload(value: Value) -> Payload {
    value.as_object().cloned().unwrap_or_default()
}

fn standard_registry() -> Arc<SkillRegistry> {
    let mut registry = SkillRegistry::new();
    register_all(&mut registry).unwrap();
    Arc::new(registry)
}

#[test]
fn test_register_all_lists_sorted_names() {
    let registry = standard_registry();
    assert_eq!(
        registry.list_skills(),
        vec!["add_numbers", "debug_log", "delay", "http_request", "json_parse", "json_stringify"]
    );

    let info = registry.info("add_numbers").unwrap();
    assert_eq!(info.version, "1.0.0");
    assert!(info.has_schema);
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let mut registry = SkillRegistry::new();
    register_all(&mut registry).unwrap();
    assert!(registry.register(Arc::new(AddNumbersSkill)).is_err());
}

#[tokio::test]
async fn test_add_numbers() {
    let out = AddNumbersSkill.execute(payload(json!({"a": 3, "b": 5}))).await.unwrap();
    assert_eq!(out.output["result"], json!(8));
    assert_eq!(out.reasoning.as_deref(), Some("3 + 5 = 8"));

    let out = AddNumbersSkill.execute(payload(json!({"a": 1.5, "b": 2}))).await.unwrap();
    assert_eq!(out.output["result"], json!(3.5));

    let err = AddNumbersSkill.execute(payload(json!({"a": 1}))).await.unwrap_err();
    assert_eq!(err, SkillError::MissingInput("b".to_string()));
}

#[tokio::test]
async fn test_json_round_trip_through_skills() {
    let parsed = JsonParseSkill
        .execute(payload(json!({"json": "{\"k\": [1, 2]}"})))
        .await
        .unwrap();
    assert_eq!(parsed.output["parsed"], json!({"k": [1, 2]}));

    let text = JsonStringifySkill
        .execute(payload(json!({"value": {"k": [1, 2]}})))
        .await
        .unwrap();
    assert_eq!(text.output["json"], json!("{\"k\":[1,2]}"));

    let err = JsonParseSkill
        .execute(payload(json!({"json": "{broken"})))
        .await
        .unwrap_err();
    assert!(matches!(err, SkillError::ExecutionFailed(msg) if msg.starts_with("JSON parse error")));
}

#[tokio::test]
async fn test_delay_waits_and_passes_input_through() {
    let started = Instant::now();
    let out = DelaySkill
        .execute(payload(json!({"delay_ms": 20, "keep": "me"})))
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(20));
    assert_eq!(out.output["keep"], json!("me"));
    assert_eq!(out.output["delayed_ms"], json!(20));
    assert!(out.output.get("delay_ms").is_none());
}

#[tokio::test]
async fn test_http_rejects_unsupported_method() {
    let err = HttpRequestSkill::new()
        .execute(payload(json!({"url": "http://localhost:1", "method": "patch"})))
        .await
        .unwrap_err();
    assert!(matches!(err, SkillError::InvalidInputType { ref field, .. } if field == "method"));
}

#[tokio::test]
async fn test_standard_skills_in_a_loaded_playbook() {
    let workflow = Workflow::from_json(
        r#"{
            "metadata": {"name": "sum_and_report"},
            "variables": {"a": 3},
            "steps": [
                {"name": "add", "skill": "add_numbers", "input": {"a": "{{ a }}", "b": "{{ b }}"}, "output_var": "sum"},
                {
                    "type": "decision",
                    "name": "check",
                    "branches": [
                        {"condition": "sum.result > 10", "steps": [
                            {"name": "big", "skill": "json_stringify", "input": {"value": "{{ sum }}"}, "output_var": "report"}
                        ]}
                    ],
                    "default": [
                        {"name": "small", "skill": "debug_log", "input": {"message": "small sum {{ sum.result }}"}, "output_var": "report"}
                    ]
                }
            ]
        }"#,
    )
    .unwrap();
    let engine = ExecutionEngine::new(standard_registry());

    let big = engine.execute(&workflow, payload(json!({"b": 20}))).await.unwrap();
    assert_eq!(big.final_context["sum"], json!({"result": 23}));
    assert_eq!(big.final_context["report"], json!({"json": "{\"result\":23}"}));

    let small = engine.execute(&workflow, payload(json!({"b": 1}))).await.unwrap();
    assert_eq!(small.steps[1].decision_taken.as_deref(), Some("default"));
    assert_eq!(small.final_context["report"]["message"], json!("small sum 4"));
}

#[tokio::test]
async fn test_schema_violation_from_standard_skill() {
    let workflow = Workflow::from_json(
        r#"{"metadata": {"name": "bad"}, "steps": [{"name": "add", "skill": "add_numbers", "input": {"a": "three"}}]}"#,
    )
    .unwrap();

    let err = ExecutionEngine::new(standard_registry())
        .execute(&workflow, Payload::new())
        .await
        .unwrap_err();

    match err {
        ExecutionError::InvalidInput(e) => {
            assert_eq!(e.skill_name, "add_numbers");
            assert_eq!(e.violations.len(), 2);
        }
        other => panic!("expected InvalidInput, got {:?}", other),
    }
}
