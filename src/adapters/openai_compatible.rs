use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use serde_json::{Value, json};

use crate::{
    adapters::credentials::CredentialRef,
    extraction::{
        error::{
            ExtractionError, ExtractionErrorKind, internal_error, protocol_violation,
            transport_failed,
        },
        ports::{
            ExpertPort, ExpertPrompt, ExpertReply, ModelIdentity, StructuredReply, SupervisorPort,
            SupervisorPrompt,
        },
        types::UsageMetadata,
    },
};

/// One `/chat/completions` endpoint. Serves both expert and supervisor calls.
/// No retries: a failed call surfaces as-is.
#[derive(Clone)]
pub struct OpenAiCompatibleBackend {
    backend_id: String,
    endpoint: String,
    credential: CredentialRef,
    timeout: Duration,
    max_output_tokens: Option<u64>,
    client: Client,
}

impl OpenAiCompatibleBackend {
    pub fn new(
        backend_id: impl Into<String>,
        endpoint: impl Into<String>,
        credential: CredentialRef,
        timeout: Duration,
        max_output_tokens: Option<u64>,
    ) -> Result<Self, ExtractionError> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| internal_error(format!("failed to build http client: {err}")))?;
        Ok(Self {
            backend_id: backend_id.into(),
            endpoint: endpoint.into(),
            credential,
            timeout,
            max_output_tokens,
            client,
        })
    }

    async fn complete(
        &self,
        model: &ModelIdentity,
        mut body: Value,
    ) -> Result<Value, ExtractionError> {
        let auth_header = self
            .credential
            .resolve(&self.backend_id)
            .map_err(|err| err.with_model(model.to_string()))?;

        if let Some(max_tokens) = self.max_output_tokens {
            body["max_tokens"] = Value::Number(max_tokens.into());
        }

        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));
        let mut request = self
            .client
            .post(url)
            .timeout(self.timeout)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body);
        if let Some(auth_header) = auth_header {
            request = request.header(header::AUTHORIZATION, auth_header);
        }

        tracing::debug!(
            target: "adapters",
            backend_id = %self.backend_id,
            model = %model.model_id,
            "backend_request_dispatched"
        );

        let response = request.send().await.map_err(|err| {
            transport_failed(format!("openai-compatible request failed: {err}"))
                .with_model(model.to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(
                map_http_error(status, &self.backend_id, &body).with_model(model.to_string())
            );
        }

        response.json::<Value>().await.map_err(|err| {
            protocol_violation(format!("openai-compatible body decode failed: {err}"))
                .with_model(model.to_string())
        })
    }
}

#[async_trait]
impl ExpertPort for OpenAiCompatibleBackend {
    async fn invoke(
        &self,
        model: &ModelIdentity,
        prompt: ExpertPrompt<'_>,
    ) -> Result<ExpertReply, ExtractionError> {
        let mut user_parts = vec![json!({"type": "text", "text": prompt.query})];
        user_parts.extend(prompt.images.iter().map(|image| {
            json!({
                "type": "image_url",
                "image_url": {"url": image.data_url()},
            })
        }));

        let body = json!({
            "model": model.model_id,
            "temperature": 0,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": user_parts},
            ],
        });

        let payload = self.complete(model, body).await?;
        let content = message_content(&payload).ok_or_else(|| {
            protocol_violation("openai-compatible response missing message content")
                .with_model(model.to_string())
        })?;

        Ok(ExpertReply {
            content: content.to_string(),
            usage: payload.get("usage").map(parse_usage).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl SupervisorPort for OpenAiCompatibleBackend {
    async fn invoke_structured(
        &self,
        model: &ModelIdentity,
        prompt: SupervisorPrompt,
    ) -> Result<StructuredReply, ExtractionError> {
        let body = json!({
            "model": model.model_id,
            "temperature": 0,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user},
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": prompt.schema_name,
                    "schema": prompt.schema,
                    "strict": false,
                },
            },
        });

        let payload = self.complete(model, body).await?;
        Ok(structured_reply(&payload))
    }
}

/// A missing or undecodable message is a parse problem of the reply, not a
/// transport failure, so it is carried in `parsing_error`.
pub fn structured_reply(payload: &Value) -> StructuredReply {
    let raw_usage = payload.get("usage").map(parse_usage).unwrap_or_default();
    let refusal = first_message(payload)
        .and_then(|message| message.get("refusal"))
        .and_then(Value::as_str);

    let (parsed, raw_content, parsing_error) = match (message_content(payload), refusal) {
        (_, Some(refusal)) => (None, String::new(), Some(format!("model refused: {refusal}"))),
        (Some(content), None) => match serde_json::from_str::<Value>(content) {
            Ok(value) => (Some(value), content.to_string(), None),
            Err(err) => (None, content.to_string(), Some(err.to_string())),
        },
        (None, None) => (
            None,
            String::new(),
            Some("response carried no message content".to_string()),
        ),
    };

    StructuredReply {
        parsed,
        raw_content,
        raw_usage,
        parsing_error,
    }
}

pub fn parse_usage(usage: &Value) -> UsageMetadata {
    let count = |primary: &str, fallback: &str| {
        usage
            .get(primary)
            .and_then(Value::as_u64)
            .or_else(|| usage.get(fallback).and_then(Value::as_u64))
            .unwrap_or(0)
    };
    let detail = |section: &str, field: &str| {
        usage
            .get(section)
            .and_then(|details| details.get(field))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    };

    UsageMetadata {
        input_tokens: count("prompt_tokens", "input_tokens"),
        output_tokens: count("completion_tokens", "output_tokens"),
        cached_input_tokens: detail("prompt_tokens_details", "cached_tokens"),
        reasoning_output_tokens: detail("completion_tokens_details", "reasoning_tokens"),
    }
}

pub fn map_http_error(status: u16, backend_id: &str, body: &str) -> ExtractionError {
    let normalized_body = body.chars().take(240).collect::<String>();

    let mut err = if status == 401 || status == 403 {
        ExtractionError::new(
            ExtractionErrorKind::Credential,
            format!("backend {} rejected credentials with status {}", backend_id, status),
        )
    } else {
        ExtractionError::new(
            ExtractionErrorKind::BackendStatus,
            format!("backend {} returned status {}", backend_id, status),
        )
    }
    .with_http_status(status);

    if !normalized_body.is_empty() {
        err.message = format!("{}: {}", err.message, normalized_body);
    }

    err
}

fn first_message(payload: &Value) -> Option<&Value> {
    payload
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
}

fn message_content(payload: &Value) -> Option<&str> {
    first_message(payload)
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
}
