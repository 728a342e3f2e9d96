use thiserror::Error;

use crate::nebline::registry::Vendor;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("no model configured; set `model` in nebline.json")]
    NoModelConfigured,
    #[error("unsupported model: {0}")]
    UnsupportedModel(String),
    #[error("{} usage requested, but no {} API key was provided", .0.display_name(), .0.display_name())]
    MissingCredential(Vendor),

    #[error("request contains no messages after filtering")]
    EmptyConversation,
    #[error("Anthropic API requires that the final message is a user message")]
    FinalMessageNotUser,
    #[error("max tokens ({max_tokens}) must exceed the thinking budget ({budget})")]
    MaxTokensBelowThinkingBudget { max_tokens: u32, budget: u32 },

    #[error("invalid {} API key provided", .0.display_name())]
    InvalidApiKey(Vendor),
    #[error("{} quota exceeded", .0.display_name())]
    QuotaExceeded(Vendor),
    #[error("{} API error: {message}", .vendor.display_name())]
    Vendor { vendor: Vendor, message: String },
    #[error("{} returned an empty response", .0.display_name())]
    EmptyResponse(Vendor),
    #[error("{} generation finished unexpectedly: {reason}. {detail}", .vendor.display_name())]
    UnexpectedFinish {
        vendor: Vendor,
        reason: String,
        detail: String,
    },

    #[error("{} response blocked: {reason}. {detail}", .vendor.display_name())]
    ContentBlocked {
        vendor: Vendor,
        reason: String,
        detail: String,
    },

    #[error("failed to parse JSON from {} response. Raw response: {raw}", .vendor.display_name())]
    MalformedOutput { vendor: Vendor, raw: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Precondition,
    VendorTransport,
    ContentPolicy,
    MalformedOutput,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "E_CONFIG",
            Self::Precondition => "E_PRECONDITION",
            Self::VendorTransport => "E_VENDOR",
            Self::ContentPolicy => "E_CONTENT_POLICY",
            Self::MalformedOutput => "E_MALFORMED_OUTPUT",
        }
    }
}

impl AiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoModelConfigured | Self::UnsupportedModel(_) | Self::MissingCredential(_) => {
                ErrorKind::Configuration
            }
            Self::EmptyConversation
            | Self::FinalMessageNotUser
            | Self::MaxTokensBelowThinkingBudget { .. } => ErrorKind::Precondition,
            Self::InvalidApiKey(_)
            | Self::QuotaExceeded(_)
            | Self::Vendor { .. }
            | Self::EmptyResponse(_)
            | Self::UnexpectedFinish { .. } => ErrorKind::VendorTransport,
            Self::ContentBlocked { .. } => ErrorKind::ContentPolicy,
            Self::MalformedOutput { .. } => ErrorKind::MalformedOutput,
        }
    }

    /// Sort a failed vendor call into the invalid-key, quota or generic bucket.
    pub fn from_vendor_failure(vendor: Vendor, status: Option<u16>, message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        let bad_key = status == Some(401)
            || lower.contains("api key not valid")
            || lower.contains("invalid api key")
            || lower.contains("incorrect api key")
            || lower.contains("invalid x-api-key");
        if bad_key {
            return Self::InvalidApiKey(vendor);
        }
        if lower.contains("quota") {
            return Self::QuotaExceeded(vendor);
        }
        let message = match status {
            Some(code) if message.trim().is_empty() => format!("request failed with status {code}"),
            _ => message.to_string(),
        };
        Self::Vendor { vendor, message }
    }
}
