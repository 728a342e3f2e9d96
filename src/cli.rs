use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::commands::{
    self, CommandReport, generate::GenerateOptions, overview_insights::OverviewInsightsOptions,
    week_insights::WeekInsightsOptions,
};
use crate::logging;
use crate::nebline::project::WeekId;
use crate::nebline::types::ResponseFormat;

#[derive(Debug, Parser)]
#[command(name = "nebline", version, about = "AI insights for a weekly journal")]
pub struct Cli {
    /// Print the command report as JSON.
    #[arg(long, global = true)]
    pub json: bool,
    /// Log debug events to stderr.
    #[arg(long, short, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List supported models and which vendor keys the project holds.
    Models {
        #[arg(long)]
        project: Option<PathBuf>,
    },
    /// Run a single prompt through the project's model.
    Generate {
        #[arg(long)]
        project: PathBuf,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        system: Option<String>,
        #[arg(long, value_enum, default_value_t = FormatArg::Text)]
        format: FormatArg,
        #[arg(long)]
        max_tokens: Option<u32>,
        prompt: String,
    },
    /// Analyse one journal week.
    WeekInsights {
        #[arg(long)]
        project: PathBuf,
        /// Week as YYYY-CW-WW; defaults to the current ISO week.
        #[arg(long)]
        week: Option<WeekId>,
        /// Save the result to the week's insights.md.
        #[arg(long)]
        write: bool,
    },
    /// Analyse the overview document against recent weeks.
    OverviewInsights {
        #[arg(long)]
        project: PathBuf,
        #[arg(long)]
        write: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Text,
    Json,
}

impl From<FormatArg> for ResponseFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Text => ResponseFormat::Text,
            FormatArg::Json => ResponseFormat::Json,
        }
    }
}

fn dispatch(command: Command) -> Result<CommandReport> {
    match command {
        Command::Models { project } => commands::models::run(project.as_deref()),
        Command::Generate {
            project,
            model,
            system,
            format,
            max_tokens,
            prompt,
        } => commands::generate::run(&GenerateOptions {
            project_dir: project,
            model,
            system,
            format: format.into(),
            max_tokens,
            prompt,
        }),
        Command::WeekInsights {
            project,
            week,
            write,
        } => commands::week_insights::run(&WeekInsightsOptions {
            project_dir: project,
            week,
            write,
        }),
        Command::OverviewInsights { project, write } => {
            commands::overview_insights::run(&OverviewInsightsOptions {
                project_dir: project,
                write,
            })
        }
    }
}

fn render(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    match &report.output {
        Some(output) => {
            println!("{}", output.trim_end());
            for detail in &report.details {
                eprintln!("{detail}");
            }
        }
        None => {
            let status = if report.ok { "ok" } else { "failed" };
            println!("{}: {status}", report.command);
            for detail in &report.details {
                println!("  {detail}");
            }
        }
    }
    for issue in &report.issues {
        eprintln!("issue: {issue}");
    }
    Ok(())
}

/// Returns whether the command's report was clean.
pub fn run() -> Result<bool> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let report = dispatch(cli.command)?;
    render(&report, cli.json)?;
    Ok(report.ok)
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, FormatArg};
    use clap::Parser;

    #[test]
    fn parses_generate_flags() {
        let cli = Cli::try_parse_from([
            "nebline",
            "--json",
            "generate",
            "--project",
            "notes",
            "--format",
            "json",
            "--max-tokens",
            "300",
            "Name a fruit.",
        ])
        .expect("parse");
        assert!(cli.json);
        match cli.command {
            Command::Generate {
                format,
                max_tokens,
                prompt,
                ..
            } => {
                assert_eq!(format, FormatArg::Json);
                assert_eq!(max_tokens, Some(300));
                assert_eq!(prompt, "Name a fruit.");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn week_flag_is_validated() {
        assert!(
            Cli::try_parse_from(["nebline", "week-insights", "--project", "p", "--week", "2025-CW-10"])
                .is_ok()
        );
        assert!(
            Cli::try_parse_from(["nebline", "week-insights", "--project", "p", "--week", "week 10"])
                .is_err()
        );
    }
}
