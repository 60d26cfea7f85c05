use async_trait::async_trait;
use playcore::{Payload, Skill, SkillError, SkillOutput};

/// Logs its input and passes it through
pub struct DebugLogSkill;

#[async_trait]
impl Skill for DebugLogSkill {
    fn name(&self) -> &str {
        "debug_log"
    }

    fn description(&self) -> &str {
        "Logs input values for debugging"
    }

    async fn execute(&self, input: Payload) -> Result<SkillOutput, SkillError> {
        let message = input
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("(no message)");

        tracing::info!("DEBUG: {}", message);
        for (key, value) in &input {
            tracing::debug!("  {}: {}", key, value);
        }

        Ok(SkillOutput::from(input.clone()).with_reasoning(format!("logged {} fields", input.len())))
    }
}
