pub mod cli;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod events;
pub mod grid;
pub mod render;
pub mod settings;
pub mod view;

use std::ffi::OsString;

use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use crate::config::{
  CalendarConfig,
  CalendarOptions
};
pub use crate::events::{
  EventRecord,
  EventsByDate,
  FieldAccessors,
  bind_events,
  merge_event_flags
};
pub use crate::grid::{
  Grid,
  GridCell,
  build_grid
};
pub use crate::view::CalendarView;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli = cli::GlobalCli::parse_from(
    raw_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting almanac"
  );

  let settings =
    settings::Settings::load(
      cli.config.as_deref()
    )?;

  let mut sources =
    settings.timezone_sources();
  if let Some(tz) = cli.timezone.clone() {
    sources.formatter = Some(tz);
  }
  let timezone =
    datetime::resolve_timezone(&sources);

  let mut options =
    settings.calendar.clone();
  cli.apply_to(&mut options);
  debug!(?options, "calendar options");

  let config =
    CalendarConfig::from_options(
      &options,
      timezone,
      Utc::now()
    );

  let records = match cli.events.as_deref()
  {
    | Some(path) => {
      let source =
        datastore::EventSource::open(
          path
        )?;
      datastore::filter_to_month(
        source.load()?,
        &config,
        &settings.fields
      )
    }
    | None => Vec::new()
  };

  let view = CalendarView::assemble(
    &config,
    &records,
    &settings.fields,
    &settings.day_names
  );

  let mut renderer =
    render::Renderer::new(&settings)?;
  match cli.format {
    | cli::OutputFormat::Text => {
      renderer.print_month(&view)?;
    }
    | cli::OutputFormat::Json => {
      renderer.print_json(&view)?;
    }
  }

  info!(
    days_with_events = view.events.len(),
    "done"
  );
  Ok(())
}
