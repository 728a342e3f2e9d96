
use crate::error::AiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    OpenAi,
    Anthropic,
    Google,
}

impl Vendor {
    pub fn label(self) -> &'static str {
        match self {
            Vendor::OpenAi => "openai",
            Vendor::Anthropic => "anthropic",
            Vendor::Google => "google",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Vendor::OpenAi => "OpenAI",
            Vendor::Anthropic => "Anthropic",
            Vendor::Google => "Google AI",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorModelMapping {
    pub id: &'static str,
    pub vendor: Vendor,
    pub model_name: &'static str,
}

const fn mapping(id: &'static str, vendor: Vendor, model_name: &'static str) -> VendorModelMapping {
    VendorModelMapping {
        id,
        vendor,
        model_name,
    }
}

pub const MODEL_TABLE: &[VendorModelMapping] = &[
    mapping("openai-4o-mini", Vendor::OpenAi, "gpt-4o-mini"),
    mapping("openai-o1", Vendor::OpenAi, "o1"),
    mapping("openai-o3-mini", Vendor::OpenAi, "o3-mini"),
    mapping(
        "anthropic-claude-3.5",
        Vendor::Anthropic,
        "claude-3-5-sonnet-latest",
    ),
    mapping(
        "anthropic-claude-3.7",
        Vendor::Anthropic,
        "claude-3-7-sonnet-latest",
    ),
    mapping(
        "google-gemini-2.5-pro",
        Vendor::Google,
        "gemini-2.5-pro-preview-03-25",
    ),
];

pub fn lookup(id: &str) -> Result<&'static VendorModelMapping, AiError> {
    MODEL_TABLE
        .iter()
        .find(|m| m.id == id)
        .ok_or_else(|| AiError::UnsupportedModel(id.to_string()))
}
