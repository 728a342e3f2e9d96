use anyhow::Result;
use std::path::Path;

use crate::commands::CommandReport;
use crate::nebline::config::{ProviderCredentials, load_project_config};
use crate::nebline::registry::{self, MODEL_TABLE};

pub fn run(project_dir: Option<&Path>) -> Result<CommandReport> {
    let mut report = CommandReport::new("models");

    let project = project_dir.map(load_project_config).transpose()?;
    let credentials = project
        .as_ref()
        .map(|cfg| cfg.credentials())
        .unwrap_or_else(ProviderCredentials::default);

    for mapping in MODEL_TABLE {
        let mut line = format!(
            "{} vendor={} model={}",
            mapping.id,
            mapping.vendor.label(),
            mapping.model_name
        );
        if project.is_some() {
            let has_key = credentials.for_vendor(mapping.vendor).is_some();
            line.push_str(if has_key { " key=present" } else { " key=missing" });
        }
        report.detail(line);
    }

    let Some(project) = project else {
        return Ok(report);
    };
    let configured = project.model.trim();
    if configured.is_empty() {
        report.issue("no model configured in nebline.json");
    } else if let Err(err) = registry::lookup(configured) {
        report.issue(err.to_string());
    } else {
        report.detail(format!("configured={configured}"));
    }
    Ok(report)
}
