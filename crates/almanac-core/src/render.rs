use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::grid::GridCell;
use crate::settings::Settings;
use crate::view::CalendarView;

const NO_EVENTS: &str = "No events scheduled for this day.";
/// Widest cell text, a selected event day such as `[31*]`.
const CELL_WIDTH: usize = 5;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let color_cfg = settings.color.clone().unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip_all, fields(year = view.year, month = view.month))]
    pub fn print_month<R>(&mut self, view: &CalendarView<'_, R>) -> anyhow::Result<()> {
        let color = self.color && io::stdout().is_terminal();
        let mut out = io::stdout().lock();
        write_month(&mut out, view, color)
    }

    #[tracing::instrument(skip_all)]
    pub fn print_json<R>(&mut self, view: &CalendarView<'_, R>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        serde_json::to_writer_pretty(&mut out, view)?;
        writeln!(out)?;
        Ok(())
    }
}

/// Writes the month grid followed by the selected day's events. Event days
/// carry a `*`, the selected day is bracketed.
pub fn write_month<W: Write, R>(
    mut writer: W,
    view: &CalendarView<'_, R>,
    color: bool,
) -> anyhow::Result<()> {
    let width = view
        .day_names
        .iter()
        .map(|name| UnicodeWidthStr::width(name.as_str()))
        .max()
        .unwrap_or(0)
        .max(CELL_WIDTH);

    writeln!(
        writer,
        "{}    < {}-{:02} | {}-{:02} >",
        view.title, view.previous.year, view.previous.month, view.next.year, view.next.month
    )?;

    for name in &view.day_names {
        let padding = width.saturating_sub(UnicodeWidthStr::width(name.as_str()));
        write!(writer, "{}{} ", " ".repeat(padding), name)?;
    }
    writeln!(writer)?;

    for week in view.grid.weeks() {
        let line = week
            .iter()
            .map(|cell| format_cell(cell, width, color))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(writer, "{}", line.trim_end())?;
    }

    writeln!(writer)?;
    writeln!(writer, "{}", view.selected_date)?;
    let events = view.selected_events();
    if events.is_empty() {
        writeln!(writer, "  {NO_EVENTS}")?;
    } else {
        for event in events {
            writeln!(writer, "  {}  {}", event.time, event.title)?;
        }
    }

    Ok(())
}

fn format_cell(cell: &GridCell, width: usize, color: bool) -> String {
    let Some(label) = cell.label else {
        return " ".repeat(width);
    };

    let mark = if cell.has_events { "*" } else { "" };
    let text = if cell.is_selected {
        format!("[{label}{mark}]")
    } else {
        format!("{label}{mark}")
    };
    let padded = format!("{text:>width$}");

    let mut codes = Vec::new();
    if cell.is_today {
        codes.push("1");
    }
    if cell.is_celebration {
        codes.push("35");
    } else if cell.is_weekend {
        codes.push("31");
    }
    paint(&padded, &codes, color)
}

fn paint(text: &str, codes: &[&str], color: bool) -> String {
    if !color || codes.is_empty() {
        return text.to_string();
    }
    format!("\x1b[{}m{text}\x1b[0m", codes.join(";"))
}
