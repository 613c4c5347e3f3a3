use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::Context;
use serde::Deserialize;
use tracing::{
  debug,
  info
};

use crate::config::CalendarOptions;
use crate::datetime::TimezoneSources;
use crate::events::FieldAccessors;

const SETTINGS_FILE: &str = "calendar.toml";
const SETTINGS_ENV_VAR: &str =
  "ALMANAC_CONFIG";
const TIMEZONE_ENV_VAR: &str =
  "ALMANAC_TIMEZONE";

/// Host settings read from `calendar.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub formatter_timezone: Option<String>,
  pub app_timezone:       Option<String>,
  pub color:              Option<String>,
  pub day_names:          Vec<String>,
  pub calendar:           CalendarOptions,
  pub fields:             FieldAccessors,
  #[serde(skip)]
  pub loaded_from:        Option<PathBuf>
}

impl Settings {
  /// Reads the settings file from the
  /// override path, `ALMANAC_CONFIG`, or the
  /// user config directory, in that order. A
  /// missing file yields defaults.
  #[tracing::instrument(skip(override_path))]
  pub fn load(
    override_path: Option<&Path>
  ) -> anyhow::Result<Self> {
    let Some(path) =
      resolve_settings_path(override_path)
    else {
      info!(
        "no settings file found; using defaults"
      );
      return Ok(Self::default());
    };

    info!(file = %path.display(), "loading settings");
    let raw = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    let mut settings = Self::from_toml_str(&raw)
      .with_context(|| {
        format!(
          "failed to parse {}",
          path.display()
        )
      })?;
    settings.loaded_from = Some(path);
    Ok(settings)
  }

  pub fn from_toml_str(
    raw: &str
  ) -> anyhow::Result<Self> {
    let settings: Self = toml::from_str(raw)
      .context("invalid settings document")?;
    debug!(
      formatter_timezone = ?settings.formatter_timezone,
      app_timezone = ?settings.app_timezone,
      day_names = settings.day_names.len(),
      "parsed settings"
    );
    Ok(settings)
  }

  /// Timezone candidates for this host. The
  /// application default falls back to the
  /// `ALMANAC_TIMEZONE` variable.
  #[must_use]
  pub fn timezone_sources(
    &self
  ) -> TimezoneSources {
    let application =
      self.app_timezone.clone().or_else(|| {
        std::env::var(TIMEZONE_ENV_VAR).ok()
      });
    TimezoneSources {
      formatter: self.formatter_timezone.clone(),
      application
    }
  }
}

fn resolve_settings_path(
  override_path: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = override_path {
    return Some(path.to_path_buf());
  }

  if let Ok(raw) =
    std::env::var(SETTINGS_ENV_VAR)
  {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(trimmed));
    }
  }

  let candidate = dirs::config_dir()?
    .join("almanac")
    .join(SETTINGS_FILE);
  if candidate.exists() {
    Some(candidate)
  } else {
    debug!(
      file = %candidate.display(),
      "settings file not present"
    );
    None
  }
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use tempfile::NamedTempFile;

  use super::Settings;

  #[test]
  fn parses_full_document() {
    let settings = Settings::from_toml_str(
      r#"
formatter_timezone = "Europe/Riga"
color = "off"
day_names = ["Sv", "P", "O", "T", "C", "Pk", "S"]

[calendar]
year = 2025
month = 5
first_day_of_week = 1
celebrations = ["01-01", "2025-06-24"]
date_is_timestamp = true

[fields]
date = "event_date"
title = "event_title"
"#
    )
    .expect("parse settings");

    assert_eq!(
      settings.formatter_timezone.as_deref(),
      Some("Europe/Riga")
    );
    assert_eq!(settings.day_names.len(), 7);
    assert_eq!(settings.calendar.month, Some(5));
    assert_eq!(
      settings.calendar.first_day_of_week,
      Some(1)
    );
    assert!(settings.calendar.date_is_timestamp);
    assert_eq!(settings.fields.date, "event_date");
    assert_eq!(settings.fields.time, "time");
    assert_eq!(
      settings.timezone_sources().formatter.as_deref(),
      Some("Europe/Riga")
    );
  }

  #[test]
  fn empty_document_uses_defaults() {
    let settings = Settings::from_toml_str("")
      .expect("parse empty settings");
    assert!(settings.calendar.year.is_none());
    assert_eq!(settings.fields.title, "title");
    assert!(settings.day_names.is_empty());
  }

  #[test]
  fn loads_from_explicit_path() {
    let mut file =
      NamedTempFile::new().expect("tempfile");
    writeln!(file, "app_timezone = \"Asia/Tokyo\"")
      .expect("write settings");

    let settings = Settings::load(Some(file.path()))
      .expect("load settings");
    assert_eq!(
      settings.app_timezone.as_deref(),
      Some("Asia/Tokyo")
    );
    assert_eq!(
      settings.loaded_from.as_deref(),
      Some(file.path())
    );
  }

  #[test]
  fn malformed_file_is_an_error() {
    let mut file =
      NamedTempFile::new().expect("tempfile");
    writeln!(file, "calendar = 12 = 4")
      .expect("write settings");
    assert!(Settings::load(Some(file.path())).is_err());
  }
}
