use anyhow::{Result, anyhow};
use std::path::PathBuf;

use crate::commands::{CommandReport, open_project};
use crate::nebline::insights::{HISTORY_LIMIT, generate_overview_insights};
use crate::nebline::project::{
    self, OVERVIEW_FILE, OVERVIEW_INSIGHTS_FILE, WeekId, load_history, load_overview, load_week,
};

#[derive(Debug, Clone)]
pub struct OverviewInsightsOptions {
    pub project_dir: PathBuf,
    pub write: bool,
}

pub fn run(opts: &OverviewInsightsOptions) -> Result<CommandReport> {
    let overview = load_overview(&opts.project_dir)?;
    if overview.document.trim().is_empty() {
        return Err(anyhow!(
            "overview is empty: write {} first",
            opts.project_dir.join(OVERVIEW_FILE).display()
        ));
    }

    // The current week counts as history for the overview.
    let this_week = WeekId::current();
    let mut weeks = Vec::new();
    if let Some(doc) = load_week(&opts.project_dir, this_week)? {
        weeks.push((this_week, doc));
    }
    let remaining = HISTORY_LIMIT - weeks.len();
    weeks.extend(load_history(&opts.project_dir, this_week, remaining)?);

    let mut report = CommandReport::new("overview-insights");
    let ids: Vec<String> = weeks.iter().map(|(id, _)| id.to_string()).collect();
    report.detail(format!("history={}", ids.join(",")));

    let (config, router) = open_project(&opts.project_dir)?;
    let history: Vec<_> = weeks.into_iter().map(|(_, doc)| doc).collect();
    let text = generate_overview_insights(&router, &config, &overview, &history)?;

    if opts.write {
        let target = opts.project_dir.join(OVERVIEW_INSIGHTS_FILE);
        project::write_atomic(&target, &text)?;
        report.detail(format!("wrote={}", target.display()));
    }
    report.output(text);
    Ok(report)
}
