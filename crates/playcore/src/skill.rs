use crate::value::{Payload, Value};
use crate::{FieldViolation, InvalidInputError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core trait that every atomic capability implements
#[async_trait]
pub trait Skill: Send + Sync {
    /// Unique registry name (e.g. "add_numbers")
    fn name(&self) -> &str;

    fn version(&self) -> &str {
        "0.0.0"
    }

    fn description(&self) -> &str {
        ""
    }

    /// Optional: declared input contract, checked before `execute`
    fn input_schema(&self) -> Option<InputSchema> {
        None
    }

    /// Execute the skill with a rendered input payload
    async fn execute(&self, input: Payload) -> Result<SkillOutput, SkillError>;
}

/// Output of a skill invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillOutput {
    pub output: Payload,
    pub reasoning: Option<String>,
}

impl SkillOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.output.insert(key.into(), value.into());
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }
}

impl From<Payload> for SkillOutput {
    fn from(output: Payload) -> Self {
        Self {
            output,
            reasoning: None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkillError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Failure after the skill had already produced partial reasoning.
    #[error("Execution failed: {message}")]
    Reasoned { message: String, reasoning: String },
}

impl SkillError {
    pub fn reasoning(&self) -> Option<&str> {
        match self {
            SkillError::Reasoned { reasoning, .. } => Some(reasoning),
            _ => None,
        }
    }
}

/// Declared shape of a skill's input payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl InputSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn required(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec::new(name, kind, true));
        self
    }

    pub fn optional(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec::new(name, kind, false));
        self
    }

    /// Check `input` against every declared field, collecting all violations.
    pub fn validate(&self, skill_name: &str, input: &Payload) -> Result<(), InvalidInputError> {
        let violations: Vec<FieldViolation> = self
            .fields
            .iter()
            .filter_map(|field| field.check(input.get(&field.name)))
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(InvalidInputError::new(skill_name, &self.name, input, violations))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind, required: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            required,
            description: String::new(),
        }
    }

    fn check(&self, value: Option<&Value>) -> Option<FieldViolation> {
        let message = match value {
            None | Some(Value::Null) if self.required => "field required".to_string(),
            None | Some(Value::Null) => return None,
            Some(v) if self.kind.accepts(v) => return None,
            Some(v) => format!("expected {}, got {}", self.kind.as_str(), kind_of(v)),
        };

        Some(FieldViolation {
            field: self.name.clone(),
            message,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Any,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Object => "object",
            FieldKind::Array => "array",
            FieldKind::Any => "any",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Number => value.is_number(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Object => value.is_object(),
            FieldKind::Array => value.is_array(),
            FieldKind::Any => true,
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_schema_reports_every_violation() {
        let schema = InputSchema::new("AddInput")
            .required("a", FieldKind::Number)
            .required("b", FieldKind::Number)
            .optional("label", FieldKind::String);

        let err = schema
            .validate("add_numbers", &payload(json!({"a": "three", "label": 7})))
            .unwrap_err();

        assert_eq!(err.violations.len(), 3);
        assert_eq!(err.violations[0].field, "a");
        assert_eq!(err.violations[0].message, "expected number, got string");
        assert_eq!(err.violations[1].message, "field required");
        assert!(err.to_string().contains("Schema: AddInput"));
    }

    #[test]
    fn test_schema_accepts_valid_input() {
        let schema = InputSchema::new("In")
            .required("count", FieldKind::Integer)
            .optional("tags", FieldKind::Array);
        assert!(schema.validate("s", &payload(json!({"count": 3}))).is_ok());
        assert!(schema
            .validate("s", &payload(json!({"count": 3.5})))
            .is_err());
    }
}
