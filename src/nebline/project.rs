use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const JOURNAL_DIR: &str = "journal";
pub const JOURNAL_FILE: &str = "journal.md";
pub const INSIGHTS_FILE: &str = "insights.md";
pub const OVERVIEW_FILE: &str = "overview.md";
pub const OVERVIEW_INSIGHTS_FILE: &str = "overview-insights.md";

/// A document and the insight text previously generated for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentWithInsights {
    pub document: String,
    pub insights: String,
}

impl DocumentWithInsights {
    pub fn new(document: impl Into<String>, insights: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            insights: insights.into(),
        }
    }
}

/// ISO week identifier rendered as `YYYY-CW-WW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WeekId {
    year: i32,
    week: u32,
}

impl WeekId {
    pub fn containing(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    pub fn current() -> Self {
        Self::containing(Local::now().date_naive())
    }

    pub fn monday(self) -> NaiveDate {
        // Validated on construction, so the Monday always exists.
        NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon).unwrap_or(NaiveDate::MIN)
    }

    pub fn previous(self) -> Self {
        Self::containing(self.monday() - Duration::days(7))
    }

    pub fn year(self) -> i32 {
        self.year
    }
}

impl fmt::Display for WeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-CW-{:02}", self.year, self.week)
    }
}

impl FromStr for WeekId {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (year, week) = trimmed
            .split_once("-CW-")
            .ok_or_else(|| anyhow!("invalid week `{trimmed}`: expected YYYY-CW-WW"))?;
        let year: i32 = year
            .parse()
            .with_context(|| format!("invalid year in week `{trimmed}`"))?;
        let week: u32 = week
            .parse()
            .with_context(|| format!("invalid week number in week `{trimmed}`"))?;
        if NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).is_none() {
            return Err(anyhow!("week `{trimmed}` does not exist in ISO year {year}"));
        }
        Ok(Self { year, week })
    }
}

pub fn week_dir(project_dir: &Path, week: WeekId) -> PathBuf {
    project_dir
        .join(JOURNAL_DIR)
        .join(week.year().to_string())
        .join(week.to_string())
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    fs::read_to_string(path)
        .map(Some)
        .with_context(|| format!("failed to read {}", path.display()))
}

/// The week's journal and insights; `None` when the journal file is absent.
pub fn load_week(project_dir: &Path, week: WeekId) -> Result<Option<DocumentWithInsights>> {
    let dir = week_dir(project_dir, week);
    let Some(document) = read_optional(&dir.join(JOURNAL_FILE))? else {
        return Ok(None);
    };
    let insights = read_optional(&dir.join(INSIGHTS_FILE))?.unwrap_or_default();
    Ok(Some(DocumentWithInsights::new(document, insights)))
}

/// Up to `limit` existing weeks before `week`, most recent first.
///
/// Walks back week by week instead of listing directories, and gives up after
/// a year without entries.
pub fn load_history(
    project_dir: &Path,
    week: WeekId,
    limit: usize,
) -> Result<Vec<(WeekId, DocumentWithInsights)>> {
    const MAX_WEEKS_BACK: usize = 53;
    let mut out = Vec::new();
    let mut cursor = week;
    for _ in 0..MAX_WEEKS_BACK {
        if out.len() >= limit {
            break;
        }
        cursor = cursor.previous();
        if let Some(doc) = load_week(project_dir, cursor)? {
            out.push((cursor, doc));
        }
    }
    Ok(out)
}

pub fn load_overview(project_dir: &Path) -> Result<DocumentWithInsights> {
    let document = read_optional(&project_dir.join(OVERVIEW_FILE))?.unwrap_or_default();
    let insights = read_optional(&project_dir.join(OVERVIEW_INSIGHTS_FILE))?.unwrap_or_default();
    Ok(DocumentWithInsights::new(document, insights))
}

/// Replace `path` with `content` via a temp file in the same directory.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow!("{} has no parent directory", path.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    tmp.write_all(content.as_bytes())
        .with_context(|| format!("failed to write temp file for {}", path.display()))?;
    tmp.persist(path)
        .map_err(|err| anyhow!("failed to replace {}: {}", path.display(), err.error))?;
    Ok(())
}
