use anyhow::{Result, anyhow};
use std::path::PathBuf;

use crate::commands::{CommandReport, open_project};
use crate::nebline::insights::{HISTORY_LIMIT, WeekInsightInput, generate_week_insights};
use crate::nebline::project::{
    self, INSIGHTS_FILE, JOURNAL_FILE, WeekId, load_history, load_overview, load_week, week_dir,
};

#[derive(Debug, Clone)]
pub struct WeekInsightsOptions {
    pub project_dir: PathBuf,
    pub week: Option<WeekId>,
    pub write: bool,
}

pub fn run(opts: &WeekInsightsOptions) -> Result<CommandReport> {
    let week = opts.week.unwrap_or_else(WeekId::current);
    let dir = week_dir(&opts.project_dir, week);
    let current = load_week(&opts.project_dir, week)?
        .ok_or_else(|| anyhow!("no journal for {week}: {} not found", dir.join(JOURNAL_FILE).display()))?;
    let overview = load_overview(&opts.project_dir)?;
    let history = load_history(&opts.project_dir, week, HISTORY_LIMIT)?;

    let mut report = CommandReport::new("week-insights");
    report.detail(format!("week={week}"));
    let earlier: Vec<String> = history.iter().map(|(id, _)| id.to_string()).collect();
    report.detail(format!("history={}", earlier.join(",")));

    let (config, router) = open_project(&opts.project_dir)?;
    let history: Vec<_> = history.into_iter().map(|(_, doc)| doc).collect();
    let text = generate_week_insights(
        &router,
        &config,
        &WeekInsightInput {
            current: &current,
            history: &history,
            overview: &overview,
        },
    )?;

    if opts.write {
        let target = dir.join(INSIGHTS_FILE);
        project::write_atomic(&target, &text)?;
        report.detail(format!("wrote={}", target.display()));
    }
    report.output(text);
    Ok(report)
}
