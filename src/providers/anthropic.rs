use serde_json::{Map, Value, json};

use crate::error::AiError;
use crate::nebline::config::ClientSettings;
use crate::nebline::registry::Vendor;
use crate::nebline::types::{ChatRequest, GenerateResponse, Role};
use crate::providers::{Provider, http_client, recover_json, send_json};

const VENDOR: Vendor = Vendor::Anthropic;
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
const JSON_INSTRUCTION: &str = "Please respond ONLY with valid JSON.";

pub struct AnthropicProvider {
    api_key: String,
    settings: ClientSettings,
}

impl AnthropicProvider {
    pub fn new(api_key: &str, settings: ClientSettings) -> Self {
        Self {
            api_key: api_key.to_string(),
            settings,
        }
    }
}

fn system_prompt(request: &ChatRequest) -> Option<String> {
    let leading = request
        .messages
        .first()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.clone());

    if !request.response_format.is_json() {
        return leading;
    }
    match leading {
        Some(prompt) if prompt.to_lowercase().contains("json") => Some(prompt),
        Some(prompt) => Some(format!("{prompt}\n\n{JSON_INSTRUCTION}")),
        None => Some(JSON_INSTRUCTION.to_string()),
    }
}

pub(crate) fn build_request(
    model_name: &str,
    request: &ChatRequest,
    thinking_budget: u32,
) -> Result<Value, AiError> {
    if request.messages.last().map(|m| m.role) != Some(Role::User) {
        return Err(AiError::FinalMessageNotUser);
    }
    let max_tokens = request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
    if max_tokens <= thinking_budget {
        return Err(AiError::MaxTokensBelowThinkingBudget {
            max_tokens,
            budget: thinking_budget,
        });
    }

    let messages: Vec<Value> = request
        .messages
        .iter()
        .filter(|m| matches!(m.role, Role::User | Role::Assistant))
        .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
        .collect();

    let mut body = Map::new();
    body.insert("model".into(), json!(model_name));
    body.insert("messages".into(), Value::Array(messages));
    body.insert("max_tokens".into(), json!(max_tokens));
    body.insert(
        "thinking".into(),
        json!({"type": "enabled", "budget_tokens": thinking_budget}),
    );
    if let Some(system) = system_prompt(request) {
        body.insert("system".into(), json!(system));
    }
    Ok(Value::Object(body))
}

/// Concatenate text blocks in order; thinking blocks are skipped.
fn collect_text(json: &Value) -> Option<String> {
    let blocks = json.get("content").and_then(Value::as_array)?;
    let mut text = String::new();
    let mut found = false;
    for block in blocks {
        if block.get("type").and_then(Value::as_str) != Some("text") {
            continue;
        }
        if let Some(chunk) = block.get("text").and_then(Value::as_str) {
            text.push_str(chunk);
            found = true;
        }
    }
    found.then_some(text)
}

pub(crate) fn parse_response(
    json: &Value,
    request: &ChatRequest,
) -> Result<GenerateResponse, AiError> {
    if json.get("stop_reason").and_then(Value::as_str) == Some("refusal") {
        return Err(AiError::ContentBlocked {
            vendor: VENDOR,
            reason: "refusal".to_string(),
            detail: collect_text(json).unwrap_or_default(),
        });
    }

    let text = collect_text(json).ok_or(AiError::EmptyResponse(VENDOR))?;
    if request.response_format.is_json() {
        return recover_json(VENDOR, &text).map(GenerateResponse::new);
    }
    Ok(GenerateResponse::new(text))
}

impl Provider for AnthropicProvider {
    fn generate(
        &self,
        model_name: &str,
        request: &ChatRequest,
    ) -> Result<GenerateResponse, AiError> {
        let body = build_request(model_name, request, self.settings.thinking_budget_tokens)?;
        let url = format!("{}/v1/messages", self.settings.base_url(VENDOR));
        let client = http_client(VENDOR, &self.settings)?;
        let json = send_json(
            VENDOR,
            client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", &self.settings.anthropic_version)
                .json(&body),
        )?;
        parse_response(&json, request)
    }
}
