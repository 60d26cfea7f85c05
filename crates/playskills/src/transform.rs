use async_trait::async_trait;
use playcore::{FieldKind, InputSchema, Payload, Skill, SkillError, SkillOutput};

/// Parse a JSON string into a value
pub struct JsonParseSkill;

#[async_trait]
impl Skill for JsonParseSkill {
    fn name(&self) -> &str {
        "json_parse"
    }

    fn description(&self) -> &str {
        "Parse JSON string"
    }

    fn input_schema(&self) -> Option<InputSchema> {
        Some(InputSchema::new("JsonParseInput").required("json", FieldKind::String))
    }

    async fn execute(&self, input: Payload) -> Result<SkillOutput, SkillError> {
        let text = input
            .get("json")
            .ok_or_else(|| SkillError::MissingInput("json".to_string()))?
            .as_str()
            .ok_or_else(|| SkillError::InvalidInputType {
                field: "json".to_string(),
                expected: "string".to_string(),
                actual: "other".to_string(),
            })?;

        let parsed: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| SkillError::ExecutionFailed(format!("JSON parse error: {}", e)))?;

        Ok(SkillOutput::new().with_output("parsed", parsed))
    }
}

/// Serialize any value to a JSON string
pub struct JsonStringifySkill;

#[async_trait]
impl Skill for JsonStringifySkill {
    fn name(&self) -> &str {
        "json_stringify"
    }

    fn description(&self) -> &str {
        "Serialize a value to JSON"
    }

    async fn execute(&self, input: Payload) -> Result<SkillOutput, SkillError> {
        let value = input
            .get("value")
            .ok_or_else(|| SkillError::MissingInput("value".to_string()))?;
        let pretty = input.get("pretty").and_then(|v| v.as_bool()).unwrap_or(false);

        let json = if pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
        .map_err(|e| SkillError::ExecutionFailed(format!("JSON stringify error: {}", e)))?;

        Ok(SkillOutput::new().with_output("json", json))
    }
}
