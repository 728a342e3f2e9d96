use serde_json::{Map, Value, json};

use crate::error::AiError;
use crate::nebline::config::ClientSettings;
use crate::nebline::registry::Vendor;
use crate::nebline::types::{ChatRequest, GenerateResponse, Role};
use crate::providers::{Provider, http_client, recover_json, send_json};

const VENDOR: Vendor = Vendor::Google;

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];
const SAFETY_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";

/// Finish reasons that mean the vendor's policy stopped the output.
const POLICY_FINISH_REASONS: [&str; 5] = [
    "SAFETY",
    "PROHIBITED_CONTENT",
    "BLOCKLIST",
    "SPII",
    "IMAGE_SAFETY",
];

pub struct GoogleProvider {
    api_key: String,
    settings: ClientSettings,
}

impl GoogleProvider {
    pub fn new(api_key: &str, settings: ClientSettings) -> Self {
        Self {
            api_key: api_key.to_string(),
            settings,
        }
    }
}

fn text_content(role: &str, text: &str) -> Value {
    json!({"role": role, "parts": [{"text": text}]})
}

pub(crate) fn build_request(request: &ChatRequest) -> Value {
    let mut system_instruction: Option<&str> = None;
    let mut contents = Vec::with_capacity(request.messages.len());

    for (index, message) in request.messages.iter().enumerate() {
        match message.role {
            Role::System if index == 0 => system_instruction = Some(message.content.as_str()),
            Role::System => {
                tracing::warn!(
                    index,
                    "system message not at the start of the conversation; sending it as a user turn"
                );
                contents.push(text_content("user", &message.content));
            }
            Role::User => contents.push(text_content("user", &message.content)),
            Role::Assistant => contents.push(text_content("model", &message.content)),
        }
    }

    let mut generation_config = Map::new();
    if let Some(max_tokens) = request.max_tokens {
        generation_config.insert("maxOutputTokens".into(), json!(max_tokens));
    }
    if request.response_format.is_json() {
        generation_config.insert("responseMimeType".into(), json!("application/json"));
    }

    let safety_settings: Vec<Value> = SAFETY_CATEGORIES
        .iter()
        .map(|category| json!({"category": category, "threshold": SAFETY_THRESHOLD}))
        .collect();

    let mut body = Map::new();
    body.insert("contents".into(), Value::Array(contents));
    body.insert("generationConfig".into(), Value::Object(generation_config));
    body.insert("safetySettings".into(), Value::Array(safety_settings));
    if let Some(system) = system_instruction {
        body.insert("systemInstruction".into(), json!({"parts": [{"text": system}]}));
    }
    Value::Object(body)
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// `CATEGORY: PROBABILITY` for the ratings that caused the block, or all of them.
fn describe_ratings(candidate: &Value) -> String {
    let ratings: Vec<&Value> = candidate
        .get("safetyRatings")
        .and_then(Value::as_array)
        .map(|r| r.iter().collect())
        .unwrap_or_default();

    let offending: Vec<&Value> = ratings
        .iter()
        .copied()
        .filter(|r| {
            r.get("blocked").and_then(Value::as_bool) == Some(true)
                || matches!(str_field(r, "probability"), Some("MEDIUM" | "HIGH"))
        })
        .collect();
    let shown = if offending.is_empty() {
        ratings
    } else {
        offending
    };
    if shown.is_empty() {
        return "No specific ratings available".to_string();
    }
    shown
        .iter()
        .map(|r| {
            format!(
                "{}: {}",
                str_field(r, "category").unwrap_or("UNKNOWN"),
                str_field(r, "probability").unwrap_or("UNKNOWN")
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_parts(candidate: &Value, include_thoughts: bool) -> Option<String> {
    let parts = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
        .filter(|parts| !parts.is_empty())?;
    Some(
        parts
            .iter()
            .filter(|p| include_thoughts || p.get("thought").and_then(Value::as_bool) != Some(true))
            .filter_map(|p| str_field(p, "text"))
            .collect::<String>(),
    )
}

pub(crate) fn parse_response(
    json: &Value,
    request: &ChatRequest,
) -> Result<GenerateResponse, AiError> {
    if let Some(feedback) = json.get("promptFeedback")
        && let Some(reason) = str_field(feedback, "blockReason")
    {
        return Err(AiError::ContentBlocked {
            vendor: VENDOR,
            reason: reason.to_string(),
            detail: str_field(feedback, "blockReasonMessage")
                .unwrap_or_default()
                .to_string(),
        });
    }

    let candidate = json
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .ok_or(AiError::EmptyResponse(VENDOR))?;

    let finish_message = str_field(candidate, "finishMessage").unwrap_or_default();
    match str_field(candidate, "finishReason") {
        None | Some("STOP") | Some("MAX_TOKENS") => {}
        Some(reason) if POLICY_FINISH_REASONS.contains(&reason) => {
            let detail = format!("{finish_message} Ratings: [{}]", describe_ratings(candidate));
            return Err(AiError::ContentBlocked {
                vendor: VENDOR,
                reason: reason.to_string(),
                detail: detail.trim_start().to_string(),
            });
        }
        Some(reason) => {
            return Err(AiError::UnexpectedFinish {
                vendor: VENDOR,
                reason: reason.to_string(),
                detail: finish_message.to_string(),
            });
        }
    }

    let mut text = join_parts(candidate, false).unwrap_or_default();
    if text.is_empty() {
        tracing::warn!("google reply had no answer text; falling back to all content parts");
        text = join_parts(candidate, true).unwrap_or_default();
    }
    if text.is_empty() {
        return Err(AiError::EmptyResponse(VENDOR));
    }

    if request.response_format.is_json() {
        return recover_json(VENDOR, &text).map(GenerateResponse::new);
    }
    Ok(GenerateResponse::new(text))
}

impl Provider for GoogleProvider {
    fn generate(
        &self,
        model_name: &str,
        request: &ChatRequest,
    ) -> Result<GenerateResponse, AiError> {
        let body = build_request(request);
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.base_url(VENDOR),
            model_name
        );
        let client = http_client(VENDOR, &self.settings)?;
        let json = send_json(
            VENDOR,
            client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body),
        )?;
        parse_response(&json, request)
    }
}
