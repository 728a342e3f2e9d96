use assert_cmd::assert::{Assert, OutputAssertExt};
use predicates::prelude::*;
use chrono::Datelike;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WEEK: &str = "2025-CW-10";

struct Project {
    tmp: TempDir,
}

impl Project {
    fn new(config: serde_json::Value) -> Self {
        let tmp = tempdir().expect("tempdir");
        fs::write(tmp.path().join("nebline.json"), config.to_string()).expect("write config");
        Self { tmp }
    }

    fn root(&self) -> &Path {
        self.tmp.path()
    }

    fn week_dir(&self, week: &str) -> PathBuf {
        let year = week.split("-CW-").next().expect("week year");
        self.root().join("journal").join(year).join(week)
    }

    fn write_week(&self, week: &str, journal: &str, insights: Option<&str>) {
        let dir = self.week_dir(week);
        fs::create_dir_all(&dir).expect("mkdir week");
        fs::write(dir.join("journal.md"), journal).expect("write journal");
        if let Some(insights) = insights {
            fs::write(dir.join("insights.md"), insights).expect("write insights");
        }
    }

    fn command(&self, server: &MockServer) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nebline");
        cmd.current_dir(self.root())
            .env("HOME", self.root())
            .env("NEBLINE_HOME", self.root())
            .env("NEBLINE_CONFIG_PATH", self.root().join("missing.toml"))
            .env("NEBLINE_OPENAI_BASE_URL", server.uri())
            .env("NEBLINE_ANTHROPIC_BASE_URL", server.uri())
            .env("NEBLINE_GOOGLE_BASE_URL", server.uri())
            .env_remove("NEBLINE_LOG");
        cmd
    }

    async fn run(&self, server: &MockServer, args: &[&str]) -> Assert {
        let mut cmd = self.command(server);
        cmd.args(args);
        let output = tokio::task::spawn_blocking(move || cmd.output())
            .await
            .expect("join")
            .expect("run nebline");
        output.assert()
    }
}

fn iso_week(date: chrono::NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{}-CW-{:02}", iso.year(), iso.week())
}

const GEMINI_PATH: &str = "/v1beta/models/gemini-2.5-pro-preview-03-25:generateContent";

#[tokio::test(flavor = "multi_thread")]
async fn google_json_reply_is_recovered_from_prose() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .and(header("x-goog-api-key", "g-key"))
        .and(body_partial_json(json!({
            "generationConfig": {"responseMimeType": "application/json"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "Sure! Here it is:\n```json\n{\"fruit\": \"apple\", \"color\": \"red\"}\n```"}
                ]},
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let project = Project::new(json!({"model": "google-gemini-2.5-pro", "googleApiKey": "g-key"}));
    let assert = project
        .run(&server, &["generate", "--project", ".", "--format", "json", "Name a fruit and its color."])
        .await;

    assert
        .success()
        .stdout(predicate::eq("{\"fruit\": \"apple\", \"color\": \"red\"}\n"));
}

#[tokio::test(flavor = "multi_thread")]
async fn google_safety_block_is_a_content_policy_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "finishReason": "SAFETY",
                "safetyRatings": [
                    {"category": "HARM_CATEGORY_HARASSMENT", "probability": "HIGH", "blocked": true}
                ]
            }]
        })))
        .mount(&server)
        .await;

    let project = Project::new(json!({"model": "google-gemini-2.5-pro", "googleApiKey": "g-key"}));
    let assert = project
        .run(&server, &["generate", "--project", ".", "tell me something"])
        .await;

    assert
        .code(1)
        .stderr(predicate::str::starts_with("error[E_CONTENT_POLICY]"))
        .stderr(predicate::str::contains("HARM_CATEGORY_HARASSMENT"));
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_model_never_reaches_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let project = Project::new(json!({"model": "gpt-7", "openAiApiKey": "sk-test"}));
    let assert = project
        .run(&server, &["generate", "--project", ".", "hi"])
        .await;

    assert
        .code(1)
        .stderr(predicate::str::contains("error[E_CONFIG]: unsupported model: gpt-7"));
}

#[tokio::test(flavor = "multi_thread")]
async fn week_insights_write_through_anthropic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "model": "claude-3-7-sonnet-latest",
            "max_tokens": 6000,
            "thinking": {"type": "enabled", "budget_tokens": 2000}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                {"type": "thinking", "thinking": "considering the week", "signature": "sig"},
                {"type": "text", "text": "## Esta semana\n\nParece que descansaste pouco."}
            ],
            "stop_reason": "end_turn"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let project = Project::new(json!({"model": "anthropic-claude-3.7", "anthropicApiKey": "sk-ant"}));
    fs::write(project.root().join("overview.md"), "Vivo em Lisboa.").expect("overview");
    project.write_week("2025-CW-09", "Semana calma.", Some("Análise antiga."));
    project.write_week(WEEK, "Dormi mal toda a semana.", None);

    let assert = project
        .run(&server, &["week-insights", "--project", ".", "--week", WEEK, "--write"])
        .await;
    assert
        .success()
        .stdout(predicate::str::contains("Parece que descansaste pouco."));

    let written =
        fs::read_to_string(project.week_dir(WEEK).join("insights.md")).expect("insights written");
    assert_eq!(written, "## Esta semana\n\nParece que descansaste pouco.");

    let requests = server.received_requests().await.expect("recorded requests");
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).expect("request body");
    let prompt = body["messages"][0]["content"].as_str().expect("user prompt");
    assert!(prompt.contains("Vivo em Lisboa."));
    assert!(prompt.contains("Análise antiga."));
    assert!(prompt.contains("Dormi mal toda a semana."));
    assert!(body["system"].as_str().expect("system").contains("SAME LANGUAGE"));
}

#[tokio::test(flavor = "multi_thread")]
async fn overview_insights_write_with_current_week_as_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant"))
        .and(body_partial_json(json!({"max_tokens": 6000})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "## Overview\n\nYour goals still fit."}],
            "stop_reason": "end_turn"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let project = Project::new(json!({"model": "anthropic-claude-3.7", "anthropicApiKey": "sk-ant"}));
    fs::write(project.root().join("overview.md"), "I want to run a marathon.").expect("overview");
    let today = chrono::Local::now().date_naive();
    let this_week = iso_week(today);
    let last_week = iso_week(today - chrono::Duration::days(7));
    project.write_week(&this_week, "Ran 10km on Sunday.", None);
    project.write_week(&last_week, "Skipped every run.", Some("You seemed tired."));

    project
        .run(&server, &["overview-insights", "--project", ".", "--write"])
        .await
        .success()
        .stdout(predicate::str::contains("Your goals still fit."));

    let written =
        fs::read_to_string(project.root().join("overview-insights.md")).expect("overview insights");
    assert_eq!(written, "## Overview\n\nYour goals still fit.");

    let requests = server.received_requests().await.expect("recorded requests");
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).expect("request body");
    let prompt = body["messages"][0]["content"].as_str().expect("user prompt");
    let current_at = prompt.find("Ran 10km on Sunday.").expect("current week in history");
    let earlier_at = prompt.find("Skipped every run.").expect("earlier week in history");
    let overview_at = prompt.find("I want to run a marathon.").expect("overview");
    assert!(current_at < earlier_at && earlier_at < overview_at);
    assert!(prompt.contains("You seemed tired."));
}

#[tokio::test(flavor = "multi_thread")]
async fn overview_insights_need_an_overview_document() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let project = Project::new(json!({"model": "anthropic-claude-3.7", "anthropicApiKey": "sk-ant"}));
    fs::write(project.root().join("overview.md"), "  \n").expect("blank overview");

    project
        .run(&server, &["overview-insights", "--project", ".", "--write"])
        .await
        .code(1)
        .stderr(predicate::str::contains("overview is empty"));
    assert!(!project.root().join("overview-insights.md").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn vendor_failure_leaves_existing_insights_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({"error": {"message": "The server had an error"}})),
        )
        .mount(&server)
        .await;

    let project = Project::new(json!({"model": "openai-4o-mini", "openAiApiKey": "sk-test"}));
    project.write_week(WEEK, "A busy week.", Some("previous insights"));

    let assert = project
        .run(&server, &["week-insights", "--project", ".", "--week", WEEK, "--write"])
        .await;
    assert
        .code(1)
        .stderr(predicate::str::contains(
            "error[E_VENDOR]: OpenAI API error: The server had an error",
        ));

    let kept = fs::read_to_string(project.week_dir(WEEK).join("insights.md")).expect("insights");
    assert_eq!(kept, "previous insights");
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_key_is_classified_distinctly() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-wrong"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided: sk-wrong."}
        })))
        .mount(&server)
        .await;

    let project = Project::new(json!({"model": "openai-4o-mini", "openAiApiKey": "sk-wrong"}));
    let assert = project
        .run(&server, &["generate", "--project", ".", "hi"])
        .await;
    assert
        .code(1)
        .stderr(predicate::str::contains("error[E_VENDOR]: invalid OpenAI API key provided"));
}
