//! Variable context and templating for a single execution.
//!
//! Payload rendering is best-effort: anything that fails to render is left
//! as the original string. Condition evaluation is strict: a condition that
//! cannot be parsed or evaluated fails the step with a [`TemplateError`].

use playcore::value::{self, Payload, Value, Variables};
use playcore::TemplateError;
use tera::{Context, Tera};

/// Mutable name -> value mapping that lives for exactly one execution
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    variables: Variables,
}

impl VariableContext {
    pub fn new(variables: Variables) -> Self {
        Self { variables }
    }

    /// Playbook defaults overridden by caller-supplied values.
    pub fn seeded(defaults: &Variables, initial: Variables) -> Self {
        let mut variables = defaults.clone();
        variables.extend(initial);
        Self { variables }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn into_variables(self) -> Variables {
        self.variables
    }

    /// Render a template string against the current variables.
    ///
    /// A string that is exactly one `{{ path }}` placeholder yields the typed
    /// value at that path. Anything else is rendered as text and then coerced:
    /// integer, else float, else the string itself. Strings that merely look
    /// numeric (e.g. `"02134"`) are coerced too.
    pub fn render(&self, template: &str) -> Value {
        if let Some(found) = self.direct_reference(template) {
            return found.clone();
        }

        match self.render_text(template) {
            Ok(rendered) => coerce_scalar(rendered),
            Err(e) => {
                tracing::debug!(template, error = %error_chain(&e), "template left unrendered");
                Value::String(template.to_string())
            }
        }
    }

    /// Apply [`render`](Self::render) to every string leaf of `payload`.
    pub fn render_payload(&self, payload: &Payload) -> Payload {
        payload
            .iter()
            .map(|(key, v)| (key.clone(), self.render_value(v)))
            .collect()
    }

    fn render_value(&self, v: &Value) -> Value {
        match v {
            Value::String(s) => self.render(s),
            Value::Object(map) => Value::Object(self.render_payload(map)),
            Value::Array(items) => Value::Array(items.iter().map(|i| self.render_value(i)).collect()),
            other => other.clone(),
        }
    }

    /// Evaluate a boolean condition such as `score > 5 and status == "ok"`.
    ///
    /// A bare variable path is looked up directly; a missing path is false.
    /// Rendered text is false when it is `false`, `0`, `none` or empty
    /// (case-insensitive, trimmed).
    pub fn evaluate_condition(&self, condition: &str, step_name: &str) -> Result<bool, TemplateError> {
        let expr = condition.trim();

        match expr.to_ascii_lowercase().as_str() {
            "true" => return Ok(true),
            "false" | "none" => return Ok(false),
            _ => {}
        }

        if value::is_variable_path(expr) {
            return Ok(match value::lookup_path(&self.variables, expr) {
                Some(Value::String(s)) => text_truthiness(s),
                Some(found) => value::is_truthy(found),
                None => false,
            });
        }

        let template = if expr.contains("{{") || expr.contains("{%") {
            expr.to_string()
        } else {
            format!("{{{{ {} }}}}", expr)
        };

        let rendered = self.render_text(&template).map_err(|e| {
            TemplateError::new(condition, error_chain(&e), step_name, "condition", &self.variables)
        })?;

        Ok(text_truthiness(&rendered))
    }

    fn direct_reference(&self, template: &str) -> Option<&Value> {
        let path = template
            .trim()
            .strip_prefix("{{")?
            .strip_suffix("}}")?
            .trim();

        value::lookup_path(&self.variables, path)
    }

    fn render_text(&self, template: &str) -> tera::Result<String> {
        let context = Context::from_serialize(&self.variables)?;
        Tera::one_off(template, &context, false)
    }
}

fn text_truthiness(text: &str) -> bool {
    !matches!(
        text.trim().to_lowercase().as_str(),
        "false" | "0" | "" | "none"
    )
}

fn coerce_scalar(rendered: String) -> Value {
    let text = rendered.trim();
    if !text.contains('.') {
        if let Ok(i) = text.parse::<i64>() {
            return Value::from(i);
        }
        if let Ok(u) = text.parse::<u64>() {
            return Value::from(u);
        }
    }

    match text.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        Some(n) => Value::Number(n),
        None => Value::String(rendered),
    }
}

/// Tera reports the useful detail in the source chain.
fn error_chain(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
