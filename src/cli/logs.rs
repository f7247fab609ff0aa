use std::{
    fmt::Display,
    io::{self, Write},
};

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};

use super::Args;
use crate::{
    storage::{entities::LogWithProject, project_store::ProjectStore},
    utils::time::format_session,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct LogsCommand {
    #[arg(
        long,
        short,
        help = "Only sessions stopped after this. \
                Examples are \"yesterday\", \"1 hour ago\", \"15/03/2025\""
    )]
    since: Option<String>,
    #[arg(
        long,
        default_value_t = DateStyle::Uk,
        help = "Style of dates used during parsing. \
                For Uk it's day/month/year. For Us it's month/day/year"
    )]
    date_style: DateStyle,
    #[arg(long, short, help = "Only sessions of the project with this name")]
    project: Option<String>,
    #[arg(long, short = 'n', help = "Print at most this many sessions")]
    limit: Option<usize>,
    #[arg(long, help = "Print as json")]
    json: bool,
}

/// Which of the stored logs get printed.
#[derive(Debug, Default)]
struct LogFilter {
    since: Option<DateTime<Utc>>,
    project: Option<String>,
    limit: Option<usize>,
}

impl LogFilter {
    /// `entries` is expected newest first, the limit keeps the newest.
    fn apply(&self, entries: Vec<LogWithProject>) -> Vec<LogWithProject> {
        entries
            .into_iter()
            .filter(|v| self.since.map_or(true, |since| v.log.stopped_at >= since))
            .filter(|v| {
                self.project
                    .as_deref()
                    .map_or(true, |name| v.project_name == name)
            })
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

pub fn process_logs_command(
    store: &impl ProjectStore,
    LogsCommand {
        since,
        date_style,
        project,
        limit,
        json,
    }: LogsCommand,
) -> Result<()> {
    let since = match since.map(|s| parse_date_string(&s, Local::now(), date_style.into())) {
        Some(Ok(v)) => Some(v.with_timezone(&Utc)),
        Some(Err(e)) => {
            return Err(Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate since date {e}"),
                )
                .into())
        }
        None => None,
    };

    let filter = LogFilter {
        since,
        project,
        limit,
    };
    let entries = filter.apply(store.list_all_logs()?);

    let mut out = io::stdout().lock();
    if json {
        write_json(&mut out, &entries)
    } else {
        write_table(&mut out, &entries)
    }
}

fn write_json(out: &mut impl Write, entries: &[LogWithProject]) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, entries)?;
    writeln!(out)?;
    Ok(())
}

fn write_table(out: &mut impl Write, entries: &[LogWithProject]) -> Result<()> {
    if entries.is_empty() {
        writeln!(out, "No logs")?;
        return Ok(());
    }
    let name_width = entries
        .iter()
        .map(|v| v.project_name.chars().count())
        .max()
        .unwrap_or_default();
    for entry in entries {
        let log = &entry.log;
        write!(
            out,
            "{}  {:<name_width$}  {:>9}",
            log.stopped_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            entry.project_name,
            format_session(log.duration),
        )?;
        if !log.tag.is_empty() {
            write!(out, "  [{}]", log.tag)?;
        }
        writeln!(out)?;
    }
    Ok(())
}
