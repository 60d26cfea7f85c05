use async_trait::async_trait;
use playcore::{FieldKind, InputSchema, Payload, Skill, SkillError, SkillOutput};
use tokio::time::{sleep, Duration};

/// Waits `delay_ms` milliseconds, then passes its input through
pub struct DelaySkill;

#[async_trait]
impl Skill for DelaySkill {
    fn name(&self) -> &str {
        "delay"
    }

    fn description(&self) -> &str {
        "Delay execution for specified milliseconds"
    }

    fn input_schema(&self) -> Option<InputSchema> {
        Some(InputSchema::new("DelayInput").optional("delay_ms", FieldKind::Number))
    }

    async fn execute(&self, mut input: Payload) -> Result<SkillOutput, SkillError> {
        let delay_ms = input
            .remove("delay_ms")
            .and_then(|v| v.as_f64())
            .unwrap_or(1000.0)
            .max(0.0) as u64;

        tracing::debug!("Delaying for {}ms", delay_ms);
        sleep(Duration::from_millis(delay_ms)).await;

        Ok(SkillOutput::from(input).with_output("delayed_ms", delay_ms))
    }
}
