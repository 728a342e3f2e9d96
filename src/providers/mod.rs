pub mod anthropic;
pub mod google;
pub mod openai;

use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;

use crate::error::AiError;
use crate::nebline::config::ClientSettings;
use crate::nebline::json_recovery::unwrap_json;
use crate::nebline::registry::Vendor;
use crate::nebline::types::{ChatRequest, GenerateResponse};

use anthropic::AnthropicProvider;
use google::GoogleProvider;
use openai::OpenAiProvider;

const MAX_ERROR_BODY_CHARS: usize = 500;

/// One vendor's chat-completion API behind a single call.
pub trait Provider {
    fn generate(&self, model_name: &str, request: &ChatRequest)
    -> Result<GenerateResponse, AiError>;
}

/// Builds a fresh provider for each call; nothing is cached between calls.
pub trait ProviderFactory {
    fn build(&self, vendor: Vendor, api_key: &str) -> Box<dyn Provider>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpProviderFactory {
    settings: ClientSettings,
}

impl HttpProviderFactory {
    pub fn new(settings: ClientSettings) -> Self {
        Self { settings }
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn build(&self, vendor: Vendor, api_key: &str) -> Box<dyn Provider> {
        let settings = self.settings.clone();
        match vendor {
            Vendor::OpenAi => Box::new(OpenAiProvider::new(api_key, settings)),
            Vendor::Anthropic => Box::new(AnthropicProvider::new(api_key, settings)),
            Vendor::Google => Box::new(GoogleProvider::new(api_key, settings)),
        }
    }
}

pub(crate) fn http_client(vendor: Vendor, settings: &ClientSettings) -> Result<Client, AiError> {
    Client::builder()
        .timeout(settings.request_timeout())
        .build()
        .map_err(|err| AiError::Vendor {
            vendor,
            message: format!("failed to build http client: {err}"),
        })
}

fn truncate_chars(input: &str, max_chars: usize) -> String {
    if input.chars().count() > max_chars {
        let mut s: String = input.chars().take(max_chars).collect();
        s.push('…');
        s
    } else {
        input.to_string()
    }
}

/// Message carried in a vendor error body, falling back to the raw body.
pub(crate) fn vendor_error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let from_json = parsed.as_ref().and_then(|json| {
        let error = json.get("error")?;
        error
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| error.as_str())
            .map(str::to_string)
    });
    from_json.unwrap_or_else(|| truncate_chars(body.trim(), MAX_ERROR_BODY_CHARS))
}

/// Send a JSON request and return the decoded JSON body of a 2xx reply.
pub(crate) fn send_json(vendor: Vendor, request: RequestBuilder) -> Result<Value, AiError> {
    let response = request.send().map_err(|err| {
        tracing::warn!(vendor = vendor.label(), error = %err, "vendor request failed");
        AiError::from_vendor_failure(vendor, None, &err.to_string())
    })?;

    let status = response.status();
    let body = response
        .text()
        .map_err(|err| AiError::from_vendor_failure(vendor, Some(status.as_u16()), &err.to_string()))?;

    if !status.is_success() {
        tracing::warn!(
            vendor = vendor.label(),
            status = status.as_u16(),
            "vendor call failed"
        );
        let message = vendor_error_message(&body);
        return Err(AiError::from_vendor_failure(
            vendor,
            Some(status.as_u16()),
            &message,
        ));
    }

    serde_json::from_str(&body).map_err(|err| AiError::Vendor {
        vendor,
        message: format!("response body is not JSON: {err}"),
    })
}

pub(crate) fn recover_json(vendor: Vendor, text: &str) -> Result<String, AiError> {
    unwrap_json(text)
        .map(str::to_string)
        .map_err(|_| AiError::MalformedOutput {
            vendor,
            raw: text.to_string(),
        })
}
