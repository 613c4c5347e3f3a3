use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::CalendarConfig;
use crate::datetime::{ValueKind, normalize};
use crate::events::{EventRecord, FieldAccessors, MonthBounds};

/// Event records stored in a local file: a JSON array (`.json`), JSON lines
/// (`.jsonl`), or a TOML document with an `[[events]]` array (`.toml`).
#[derive(Debug)]
pub struct EventSource {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct TomlEvents {
    #[serde(default)]
    events: Vec<toml::Table>,
}

impl EventSource {
    #[tracing::instrument(skip(path))]
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if !path.is_file() {
            return Err(anyhow!("event file not found: {}", path.display()));
        }
        info!(file = %path.display(), "opened event source");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    #[tracing::instrument(skip(self), fields(file = %self.path.display()))]
    pub fn load(&self) -> anyhow::Result<Vec<Value>> {
        let extension = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let records = match extension.as_str() {
            "jsonl" => load_jsonl(&self.path),
            "toml" => load_toml(&self.path),
            _ => load_json(&self.path),
        }
        .with_context(|| format!("failed to load events from {}", self.path.display()))?;

        debug!(count = records.len(), "loaded event records");
        Ok(records)
    }
}

/// Keeps the records whose date falls inside the configured month. This is the
/// host-side query; records whose date cannot be read are left out here.
#[tracing::instrument(skip_all, fields(records = records.len()))]
pub fn filter_to_month<R: EventRecord>(
    records: Vec<R>,
    config: &CalendarConfig,
    accessors: &FieldAccessors,
) -> Vec<R> {
    let bounds = MonthBounds::for_config(config);
    let before = records.len();
    let kept: Vec<R> = records
        .into_iter()
        .filter(|record| {
            normalize(
                &record.field(&accessors.date),
                ValueKind::Date,
                config.timezone(),
            )
            .is_some_and(|instant| bounds.contains(&instant))
        })
        .collect();

    info!(
        before,
        after = kept.len(),
        start = %bounds.start,
        end = %bounds.end_exclusive,
        "filtered records to month"
    );
    kept
}

fn load_json(path: &Path) -> anyhow::Result<Vec<Value>> {
    let raw = fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&raw)? {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("events") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(anyhow!("expected an array or an object with an `events` array")),
        },
        other => Err(anyhow!("expected an array of events, got {other}")),
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<Value>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: Value = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(record);
    }

    Ok(out)
}

fn load_toml(path: &Path) -> anyhow::Result<Vec<Value>> {
    let raw = fs::read_to_string(path)?;
    let parsed: TomlEvents = toml::from_str(&raw)?;
    Ok(parsed
        .events
        .into_iter()
        .map(|table| {
            Value::Object(
                table
                    .into_iter()
                    .map(|(key, value)| (key, toml_to_json(value)))
                    .collect(),
            )
        })
        .collect())
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(text) => Value::String(text),
        toml::Value::Integer(num) => Value::from(num),
        toml::Value::Float(num) => Value::from(num),
        toml::Value::Boolean(flag) => Value::Bool(flag),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(key, value)| (key, toml_to_json(value)))
                .collect(),
        ),
    }
}
