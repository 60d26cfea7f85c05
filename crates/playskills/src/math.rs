use async_trait::async_trait;
use playcore::{FieldKind, InputSchema, Payload, Skill, SkillError, SkillOutput, Value};

/// `a + b`; integral when both operands are integers
pub struct AddNumbersSkill;

#[async_trait]
impl Skill for AddNumbersSkill {
    fn name(&self) -> &str {
        "add_numbers"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn description(&self) -> &str {
        "Add two numbers"
    }

    fn input_schema(&self) -> Option<InputSchema> {
        Some(
            InputSchema::new("AddNumbersInput")
                .required("a", FieldKind::Number)
                .required("b", FieldKind::Number),
        )
    }

    async fn execute(&self, input: Payload) -> Result<SkillOutput, SkillError> {
        let a = operand(&input, "a")?;
        let b = operand(&input, "b")?;

        let result = match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => match x.checked_add(y) {
                Some(sum) => Value::from(sum),
                None => Value::from(x as f64 + y as f64),
            },
            _ => {
                let sum = a.as_f64().unwrap_or_default() + b.as_f64().unwrap_or_default();
                Value::from(sum)
            }
        };

        Ok(SkillOutput::new()
            .with_output("result", result.clone())
            .with_reasoning(format!("{} + {} = {}", a, b, result)))
    }
}

fn operand<'a>(input: &'a Payload, field: &str) -> Result<&'a Value, SkillError> {
    let value = input
        .get(field)
        .ok_or_else(|| SkillError::MissingInput(field.to_string()))?;

    if !value.is_number() {
        return Err(SkillError::InvalidInputType {
            field: field.to_string(),
            expected: "number".to_string(),
            actual: value.to_string(),
        });
    }
    Ok(value)
}
