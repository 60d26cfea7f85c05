#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use playcore::{
    FieldKind, InputSchema, Payload, Skill, SkillError, SkillOutput, Value, Variables,
};
use playruntime::SkillRegistry;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn vars(value: Value) -> Variables {
    value.as_object().cloned().unwrap_or_default()
}

/// Adds `a` and `b`, keeping integers integral
pub struct AddNumbers;

#[async_trait]
impl Skill for AddNumbers {
    fn name(&self) -> &str {
        "add_numbers"
    }

    async fn execute(&self, input: Payload) -> Result<SkillOutput, SkillError> {
        let a = input.get("a").ok_or_else(|| SkillError::MissingInput("a".into()))?;
        let b = input.get("b").ok_or_else(|| SkillError::MissingInput("b".into()))?;

        let result = match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => json!(a + b),
            _ => {
                let a = a.as_f64().ok_or_else(|| SkillError::ExecutionFailed("a is not a number".into()))?;
                let b = b.as_f64().ok_or_else(|| SkillError::ExecutionFailed("b is not a number".into()))?;
                json!(a + b)
            }
        };
        Ok(SkillOutput::new().with_output("result", result))
    }
}

/// Returns its input unchanged and remembers every call
#[derive(Default)]
pub struct Recorder {
    name: String,
    pub calls: Mutex<Vec<Payload>>,
}

impl Recorder {
    pub fn named(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn last_input(&self) -> Option<Payload> {
        self.calls.lock().last().cloned()
    }
}

#[async_trait]
impl Skill for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, input: Payload) -> Result<SkillOutput, SkillError> {
        self.calls.lock().push(input.clone());
        Ok(SkillOutput::from(input).with_reasoning("echoed input"))
    }
}

/// Fails when the `fail` input is `true`
pub struct FailWhen;

#[async_trait]
impl Skill for FailWhen {
    fn name(&self) -> &str {
        "fail_when"
    }

    async fn execute(&self, input: Payload) -> Result<SkillOutput, SkillError> {
        if input.get("fail").and_then(Value::as_bool).unwrap_or(false) {
            return Err(SkillError::Reasoned {
                message: "asked to fail".into(),
                reasoning: "input flag was set".into(),
            });
        }
        Ok(SkillOutput::new().with_output("ok", true))
    }
}

/// Fails on its first call only
#[derive(Default)]
pub struct Flaky {
    failed_once: AtomicBool,
}

#[async_trait]
impl Skill for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn execute(&self, _input: Payload) -> Result<SkillOutput, SkillError> {
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            return Err(SkillError::ExecutionFailed("transient outage".into()));
        }
        Ok(SkillOutput::new().with_output("recovered", true))
    }
}

/// Sleeps `delay_ms` while tracking how many calls overlap
#[derive(Default)]
pub struct Slow {
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Skill for Slow {
    fn name(&self) -> &str {
        "slow"
    }

    async fn execute(&self, input: Payload) -> Result<SkillOutput, SkillError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = input.get("delay_ms").and_then(Value::as_u64).unwrap_or(50);
        tokio::time::sleep(Duration::from_millis(delay)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(SkillOutput::new().with_output("slept_ms", delay))
    }
}

/// Declares a numeric `amount` input
pub struct Charge;

#[async_trait]
impl Skill for Charge {
    fn name(&self) -> &str {
        "charge"
    }

    fn input_schema(&self) -> Option<InputSchema> {
        Some(InputSchema::new("ChargeInput").required("amount", FieldKind::Number))
    }

    async fn execute(&self, input: Payload) -> Result<SkillOutput, SkillError> {
        Ok(SkillOutput::from(input))
    }
}

pub fn registry_with(skills: Vec<Arc<dyn Skill>>) -> Arc<SkillRegistry> {
    let mut registry = SkillRegistry::new();
    for skill in skills {
        registry.register(skill).expect("unique skill names");
    }
    Arc::new(registry)
}
