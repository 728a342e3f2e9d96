pub mod generate;
pub mod models;
pub mod overview_insights;
pub mod week_insights;

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use crate::nebline::config::{self, ProjectConfig};
use crate::nebline::router::Router;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
            output: None,
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn output(&mut self, text: impl Into<String>) {
        self.output = Some(text.into());
    }
}

/// Project config plus an HTTP-backed router built from layered settings.
pub fn open_project(project_dir: &Path) -> Result<(ProjectConfig, Router)> {
    let project = config::load_project_config(project_dir)?;
    let settings = config::load_settings()?;
    Ok((project, Router::http(settings)))
}
