use async_trait::async_trait;
use playcore::{FieldKind, InputSchema, Payload, Skill, SkillError, SkillOutput, Value};

/// HTTP request skill
///
/// Inputs: `url`, optional `method` (GET), `body` (JSON, or text when a
/// string) and `headers` (object of strings).
pub struct HttpRequestSkill {
    client: reqwest::Client,
}

impl HttpRequestSkill {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpRequestSkill {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Skill for HttpRequestSkill {
    fn name(&self) -> &str {
        "http_request"
    }

    fn description(&self) -> &str {
        "Make HTTP requests"
    }

    fn input_schema(&self) -> Option<InputSchema> {
        Some(
            InputSchema::new("HttpRequestInput")
                .required("url", FieldKind::String)
                .optional("method", FieldKind::String)
                .optional("headers", FieldKind::Object),
        )
    }

    async fn execute(&self, input: Payload) -> Result<SkillOutput, SkillError> {
        let url = input
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| SkillError::MissingInput("url".to_string()))?;
        let method = input
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_uppercase();

        tracing::info!("{} {}", method, url);

        let mut request = match method.as_str() {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url),
            "PUT" => self.client.put(url),
            "DELETE" => self.client.delete(url),
            other => {
                return Err(SkillError::InvalidInputType {
                    field: "method".to_string(),
                    expected: "GET, POST, PUT or DELETE".to_string(),
                    actual: other.to_string(),
                })
            }
        };

        match input.get("body") {
            Some(Value::String(text)) => request = request.body(text.clone()),
            Some(Value::Null) | None => {}
            Some(json) => request = request.json(json),
        }

        if let Some(Value::Object(headers)) = input.get("headers") {
            for (key, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(key.as_str(), value);
                }
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| SkillError::ExecutionFailed(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        let headers: Payload = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_str().unwrap_or("").to_string())))
            .collect();

        let body = response
            .text()
            .await
            .map_err(|e| SkillError::ExecutionFailed(format!("Failed to read response: {}", e)))?;

        tracing::info!("Response status: {}", status);

        let mut output = SkillOutput::new()
            .with_output("status", status)
            .with_output("headers", Value::Object(headers));
        if let Ok(json) = serde_json::from_str::<Value>(&body) {
            output = output.with_output("json", json);
        }
        Ok(output.with_output("body", body))
    }
}
