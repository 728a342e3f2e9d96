use serde_json::{Map, Value, json};

use crate::error::AiError;
use crate::nebline::config::ClientSettings;
use crate::nebline::registry::Vendor;
use crate::nebline::types::{ChatRequest, GenerateResponse};
use crate::providers::{Provider, http_client, recover_json, send_json};

const VENDOR: Vendor = Vendor::OpenAi;
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

pub struct OpenAiProvider {
    api_key: String,
    settings: ClientSettings,
}

impl OpenAiProvider {
    pub fn new(api_key: &str, settings: ClientSettings) -> Self {
        Self {
            api_key: api_key.to_string(),
            settings,
        }
    }
}

/// Reasoning-tier models only accept `max_completion_tokens`.
fn uses_completion_tokens(model_name: &str) -> bool {
    let lower = model_name.trim().to_ascii_lowercase();
    lower.starts_with("o1") || lower.starts_with("o3") || lower.starts_with("o4")
}

pub(crate) fn build_request(model_name: &str, request: &ChatRequest) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
        .collect();

    let mut body = Map::new();
    body.insert("model".into(), json!(model_name));
    body.insert("messages".into(), Value::Array(messages));

    let token_field = if uses_completion_tokens(model_name) {
        "max_completion_tokens"
    } else {
        "max_tokens"
    };
    body.insert(
        token_field.into(),
        json!(request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
    );

    if request.response_format.is_json() {
        body.insert("response_format".into(), json!({"type": "json_object"}));
    }
    Value::Object(body)
}

pub(crate) fn parse_response(json: &Value, request: &ChatRequest) -> Result<GenerateResponse, AiError> {
    let choice = json
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or(AiError::EmptyResponse(VENDOR))?;
    let message = choice.get("message");

    if let Some(refusal) = message
        .and_then(|m| m.get("refusal"))
        .and_then(Value::as_str)
        .filter(|r| !r.trim().is_empty())
    {
        return Err(AiError::ContentBlocked {
            vendor: VENDOR,
            reason: "refusal".to_string(),
            detail: refusal.to_string(),
        });
    }
    if choice.get("finish_reason").and_then(Value::as_str) == Some("content_filter") {
        return Err(AiError::ContentBlocked {
            vendor: VENDOR,
            reason: "content_filter".to_string(),
            detail: "output was omitted by the content filter".to_string(),
        });
    }

    let content = message
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .ok_or(AiError::EmptyResponse(VENDOR))?;

    if !request.response_format.is_json() {
        return Ok(GenerateResponse::new(content));
    }
    // json_object mode should already be pure JSON; recover only if it is not.
    if serde_json::from_str::<Value>(content).is_ok() {
        return Ok(GenerateResponse::new(content));
    }
    recover_json(VENDOR, content).map(GenerateResponse::new)
}

impl Provider for OpenAiProvider {
    fn generate(
        &self,
        model_name: &str,
        request: &ChatRequest,
    ) -> Result<GenerateResponse, AiError> {
        let body = build_request(model_name, request);
        let url = format!("{}/v1/chat/completions", self.settings.base_url(VENDOR));
        let client = http_client(VENDOR, &self.settings)?;
        let json = send_json(
            VENDOR,
            client.post(&url).bearer_auth(&self.api_key).json(&body),
        )?;
        parse_response(&json, request)
    }
}
