use crate::value::{Payload, Value, Variables};
use crate::WorkflowError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete playbook definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workflow {
    pub metadata: WorkflowMetadata,
    #[serde(default)]
    pub variables: Variables,
    pub steps: Vec<Step>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: WorkflowMetadata::new(name),
            variables: Variables::new(),
            steps: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = Some(description.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.metadata.version = version.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.metadata.tags.push(tag.into());
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_step(mut self, step: impl Into<Step>) -> Self {
        self.steps.push(step.into());
        self
    }

    /// Parse a playbook from a JSON document.
    ///
    /// Step `type` tags are checked before typed deserialization so that an
    /// unknown tag is reported with its location rather than as a generic
    /// serde error. Steps without a tag are treated as skill steps.
    pub fn from_json(json: &str) -> Result<Self, WorkflowError> {
        let mut raw: Value = serde_json::from_str(json)?;
        if let Some(steps) = raw.get_mut("steps").and_then(Value::as_array_mut) {
            normalize_steps(steps, "steps")?;
        }

        let workflow: Workflow = serde_json::from_value(raw)?;
        workflow.validate()?;
        Ok(workflow)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, WorkflowError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, WorkflowError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// A playbook must contain at least one step.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.steps.is_empty() {
            return Err(WorkflowError::Invalid(format!(
                "playbook '{}' must have at least one step",
                self.metadata.name
            )));
        }
        Ok(())
    }
}

fn normalize_steps(steps: &mut [Value], location: &str) -> Result<(), WorkflowError> {
    for (i, step) in steps.iter_mut().enumerate() {
        let here = format!("{}[{}]", location, i);
        let Some(obj) = step.as_object_mut() else {
            return Err(WorkflowError::Invalid(format!("{} is not an object", here)));
        };

        let step_type = obj
            .entry("type")
            .or_insert_with(|| Value::String("skill".to_string()))
            .as_str()
            .unwrap_or_default()
            .to_string();

        match step_type.as_str() {
            "skill" => {}
            "decision" => {
                if let Some(branches) = obj.get_mut("branches").and_then(Value::as_array_mut) {
                    for (b, branch) in branches.iter_mut().enumerate() {
                        if let Some(nested) = branch.get_mut("steps").and_then(Value::as_array_mut) {
                            normalize_steps(nested, &format!("{}.branches[{}].steps", here, b))?;
                        }
                    }
                }
                if let Some(default) = obj.get_mut("default").and_then(Value::as_array_mut) {
                    normalize_steps(default, &format!("{}.default", here))?;
                }
            }
            _ => {
                return Err(WorkflowError::UnknownStepType {
                    step_type,
                    location: here,
                })
            }
        }
    }
    Ok(())
}

/// Descriptive playbook metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowMetadata {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl WorkflowMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            description: None,
            author: None,
            tags: Vec::new(),
        }
    }
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// A single unit of work in a playbook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Step {
    Skill(SkillStep),
    Decision(DecisionStep),
}

impl Step {
    pub fn name(&self) -> &str {
        match self {
            Step::Skill(step) => &step.name,
            Step::Decision(step) => &step.name,
        }
    }
}

/// Invokes one skill with a rendered input payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillStep {
    pub name: String,
    pub skill: String,
    #[serde(default)]
    pub input: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_var: Option<String>,
}

impl SkillStep {
    pub fn new(name: impl Into<String>, skill: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            skill: skill.into(),
            input: Payload::new(),
            output_var: None,
        }
    }

    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.input.insert(key.into(), value.into());
        self
    }

    pub fn with_output_var(mut self, name: impl Into<String>) -> Self {
        self.output_var = Some(name.into());
        self
    }
}

impl From<SkillStep> for Step {
    fn from(step: SkillStep) -> Self {
        Step::Skill(step)
    }
}

/// Ordered conditional branches; the first true condition wins
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionStep {
    pub name: String,
    pub branches: Vec<Branch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Vec<Step>>,
}

impl DecisionStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            branches: Vec::new(),
            default: None,
        }
    }

    pub fn with_branch(mut self, condition: impl Into<String>, steps: Vec<Step>) -> Self {
        self.branches.push(Branch {
            condition: condition.into(),
            steps,
        });
        self
    }

    pub fn with_default(mut self, steps: Vec<Step>) -> Self {
        self.default = Some(steps);
        self
    }
}

impl From<DecisionStep> for Step {
    fn from(step: DecisionStep) -> Self {
        Step::Decision(step)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Branch {
    pub condition: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}
