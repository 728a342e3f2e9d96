use crate::error::AiError;
use crate::nebline::config::ProjectConfig;
use crate::nebline::project::DocumentWithInsights;
use crate::nebline::router::Router;
use crate::nebline::types::{ChatMessage, GenerateRequest, ResponseFormat};
use crate::providers::ProviderFactory;

pub const HISTORY_LIMIT: usize = 6;
pub const INSIGHT_MAX_TOKENS: u32 = 6000;

const ANALYST_GUIDELINES: &str = "\
Write in a conversational, flowing style, the way a thoughtful psychologist would talk to a client. \
Do not use bullet points or numbered lists; use short paragraphs and, where useful, markdown headings.

Look for patterns, underlying emotions, and cognitive biases. When a pattern is known to psychology, name it.

Be balanced and realistic. Cheap optimism is not helpful, but when there is genuine reason for hope, say so.

Close with a section called \"Questions for reflection\" containing the kind of questions a psychologist \
would ask to help the writer understand their thoughts and emotional state. If the writing describes \
negative thoughts, you may add a \"Cognitive restructuring\" section; if it makes sense, an \
\"Actionable steps\" section with small behavioural steps.

Avoid cliches and do not be verbose.

Important: write in the SAME LANGUAGE as the journal entries. If they are written in Portuguese, answer \
in Portuguese; if in English, answer in English.";

const WEEK_ROLE: &str = "You are an assistant specialised in analysing personal journals. \
You will receive the writer's overview document, several earlier weekly journal entries with the \
analysis you gave at the time, and finally the most recent week's journal entry. Analyse the most \
recent entry in light of everything else.";

const OVERVIEW_ROLE: &str = "You are an assistant specialised in analysing personal journals. \
You will receive the writer's overview document, a long-lived description of their life, goals and \
circumstances, together with recent weekly journal entries. Analyse the overview document, using the \
journal entries to judge how well it reflects the writer's current life.";

/// Inputs for analysing one journal week.
#[derive(Debug, Clone, Copy)]
pub struct WeekInsightInput<'a> {
    pub current: &'a DocumentWithInsights,
    pub history: &'a [DocumentWithInsights],
    pub overview: &'a DocumentWithInsights,
}

fn push_section(out: &mut String, title: &str, body: &str) {
    out.push_str("## ");
    out.push_str(title);
    out.push_str("\n\n");
    out.push_str(body.trim());
    out.push_str("\n\n");
}

fn push_overview(out: &mut String, overview: &DocumentWithInsights) {
    if overview.document.trim().is_empty() {
        push_section(out, "Overview", "(The writer has not written an overview yet.)");
    } else {
        push_section(out, "Overview", &overview.document);
    }
}

fn push_history(out: &mut String, history: &[DocumentWithInsights]) {
    for (index, entry) in history.iter().take(HISTORY_LIMIT).enumerate() {
        let number = index + 1;
        push_section(out, &format!("Earlier journal entry {number}"), &entry.document);
        if !entry.insights.trim().is_empty() {
            push_section(
                out,
                &format!("Your analysis of earlier journal entry {number}"),
                &entry.insights,
            );
        }
    }
}

pub(crate) fn week_messages(input: &WeekInsightInput<'_>) -> Vec<ChatMessage> {
    let mut context = String::new();
    push_overview(&mut context, input.overview);
    push_history(&mut context, input.history);
    if !input.current.insights.trim().is_empty() {
        push_section(
            &mut context,
            "Your previous analysis of the most recent entry (may be outdated)",
            &input.current.insights,
        );
    }
    push_section(&mut context, "Most recent journal entry", &input.current.document);

    vec![
        ChatMessage::system(format!("{WEEK_ROLE}\n\n{ANALYST_GUIDELINES}")),
        ChatMessage::user(format!(
            "Please analyse the most recent journal entry below and provide psychological insights in markdown.\n\n---\n\n{}",
            context.trim_end()
        )),
    ]
}

pub(crate) fn overview_messages(
    overview: &DocumentWithInsights,
    history: &[DocumentWithInsights],
) -> Vec<ChatMessage> {
    let mut context = String::new();
    push_history(&mut context, history);
    if !overview.insights.trim().is_empty() {
        push_section(
            &mut context,
            "Your previous analysis of the overview (may be outdated)",
            &overview.insights,
        );
    }
    push_overview(&mut context, overview);

    vec![
        ChatMessage::system(format!("{OVERVIEW_ROLE}\n\n{ANALYST_GUIDELINES}")),
        ChatMessage::user(format!(
            "Please analyse the overview document below and provide psychological insights in markdown.\n\n---\n\n{}",
            context.trim_end()
        )),
    ]
}

fn request_for(config: &ProjectConfig, messages: Vec<ChatMessage>) -> GenerateRequest {
    GenerateRequest::new(
        config.model.trim(),
        messages.into_iter().map(Some).collect(),
    )
    .with_max_tokens(INSIGHT_MAX_TOKENS)
    .with_format(ResponseFormat::Text)
}

pub fn generate_week_insights<F: ProviderFactory>(
    router: &Router<F>,
    config: &ProjectConfig,
    input: &WeekInsightInput<'_>,
) -> Result<String, AiError> {
    tracing::info!(
        model = %config.model,
        history = input.history.len().min(HISTORY_LIMIT),
        "generating week insights"
    );
    let request = request_for(config, week_messages(input));
    let response = router.generate(request, &config.credentials())?;
    tracing::info!(chars = response.text.len(), "week insights generated");
    Ok(response.text)
}

pub fn generate_overview_insights<F: ProviderFactory>(
    router: &Router<F>,
    config: &ProjectConfig,
    overview: &DocumentWithInsights,
    history: &[DocumentWithInsights],
) -> Result<String, AiError> {
    tracing::info!(
        model = %config.model,
        history = history.len().min(HISTORY_LIMIT),
        "generating overview insights"
    );
    let request = request_for(config, overview_messages(overview, history));
    let response = router.generate(request, &config.credentials())?;
    tracing::info!(chars = response.text.len(), "overview insights generated");
    Ok(response.text)
}
