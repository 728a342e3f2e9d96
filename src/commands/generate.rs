use anyhow::Result;
use std::path::PathBuf;

use crate::commands::{CommandReport, open_project};
use crate::nebline::types::{ChatMessage, GenerateRequest, ResponseFormat};

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub project_dir: PathBuf,
    pub model: Option<String>,
    pub system: Option<String>,
    pub format: ResponseFormat,
    pub max_tokens: Option<u32>,
    pub prompt: String,
}

pub fn build_request(opts: &GenerateOptions, configured_model: &str) -> GenerateRequest {
    let model = opts
        .model
        .as_deref()
        .unwrap_or(configured_model)
        .trim()
        .to_string();
    let messages = vec![
        opts.system.as_deref().map(ChatMessage::system),
        Some(ChatMessage::user(opts.prompt.as_str())),
    ];
    let mut request = GenerateRequest::new(model, messages).with_format(opts.format);
    if let Some(max_tokens) = opts.max_tokens {
        request = request.with_max_tokens(max_tokens);
    }
    request
}

pub fn run(opts: &GenerateOptions) -> Result<CommandReport> {
    let (project, router) = open_project(&opts.project_dir)?;
    let request = build_request(opts, &project.model);

    let mut report = CommandReport::new("generate");
    report.detail(format!("model={}", request.model));
    report.detail(format!("format={}", if opts.format.is_json() { "json" } else { "text" }));

    let response = router.generate(request, &project.credentials())?;
    report.output(response.text);
    Ok(report)
}
