use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::{CalendarOptions, NavigationQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "almanac",
    version,
    about = "Month calendar with per-day event annotations",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    /// Settings file (defaults to $ALMANAC_CONFIG or the user config dir).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Event records (.json, .jsonl or .toml).
    #[arg(long = "events")]
    pub events: Option<PathBuf>,

    #[arg(long = "year", allow_hyphen_values = true)]
    pub year: Option<i64>,

    #[arg(long = "month", allow_hyphen_values = true)]
    pub month: Option<i64>,

    /// Selected date, e.g. 2025-05-15.
    #[arg(long = "date")]
    pub date: Option<String>,

    /// 0 = Sunday .. 6 = Saturday.
    #[arg(long = "first-day", allow_hyphen_values = true)]
    pub first_day: Option<i64>,

    /// Formatter timezone; wins over every other source.
    #[arg(long = "timezone")]
    pub timezone: Option<String>,

    /// Navigation query string, e.g. "month=6&year=2025&date=2025-06-02".
    #[arg(long = "query")]
    pub query: Option<String>,

    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl GlobalCli {
    /// Applies the command-line calendar values on top of `options`. A
    /// navigation query is applied last, like an in-page request would be.
    pub fn apply_to(&self, options: &mut CalendarOptions) {
        if let Some(year) = self.year {
            options.year = Some(year);
        }
        if let Some(month) = self.month {
            options.month = Some(month);
        }
        if let Some(day) = self.first_day {
            options.first_day_of_week = Some(day);
        }
        if let Some(date) = &self.date {
            options.selected_date = Some(date.clone());
        }
        if let Some(query) = &self.query {
            let nav = NavigationQuery::parse(query);
            debug!(?nav, "applying navigation query");
            nav.apply(options);
        }
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
