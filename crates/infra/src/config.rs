//! Environment-driven settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockval_core::LocationId;
use stockval_inventory::{ClassifierConfig, ExportLocale};

pub const DEFAULT_RELAY_URL: &str = "http://localhost:8080";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::Invalid {
            var,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub relay_url: String,
    /// Skips version detection when set.
    pub backend_version: Option<String>,
    pub timeout: Duration,
    pub internal_location_ids: Vec<LocationId>,
    pub adjustment_location_id: Option<LocationId>,
    pub name_heuristic: bool,
    pub export_locale: ExportLocale,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            backend_version: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            internal_location_ids: Vec::new(),
            adjustment_location_id: None,
            name_heuristic: true,
            export_locale: ExportLocale::default(),
        }
    }
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(var, raw, "expected true/false")),
    }
}

fn parse_char(var: &'static str, raw: &str) -> Result<char, ConfigError> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(ConfigError::invalid(var, raw, "expected a single character")),
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable source. Unset or blank
    /// variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut settings = Settings::default();

        if let Some(url) = get("STOCKVAL_RELAY_URL") {
            settings.relay_url = url.trim().to_string();
        }
        settings.backend_version = get("STOCKVAL_BACKEND_VERSION").map(|v| v.trim().to_string());

        if let Some(raw) = get("STOCKVAL_TIMEOUT_MS") {
            let ms: u64 = raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("STOCKVAL_TIMEOUT_MS", &raw, e))?;
            if ms == 0 {
                return Err(ConfigError::invalid("STOCKVAL_TIMEOUT_MS", &raw, "must be positive"));
            }
            settings.timeout = Duration::from_millis(ms);
        }

        if let Some(raw) = get("STOCKVAL_INTERNAL_LOCATION_IDS") {
            settings.internal_location_ids = raw
                .split(',')
                .filter(|part| !part.trim().is_empty())
                .map(|part| {
                    part.parse::<LocationId>()
                        .map_err(|e| ConfigError::invalid("STOCKVAL_INTERNAL_LOCATION_IDS", &raw, e))
                })
                .collect::<Result<_, _>>()?;
        }

        if let Some(raw) = get("STOCKVAL_ADJUSTMENT_LOCATION_ID") {
            let id = raw
                .parse::<LocationId>()
                .map_err(|e| ConfigError::invalid("STOCKVAL_ADJUSTMENT_LOCATION_ID", &raw, e))?;
            settings.adjustment_location_id = Some(id);
        }

        if let Some(raw) = get("STOCKVAL_NAME_HEURISTIC") {
            settings.name_heuristic = parse_bool("STOCKVAL_NAME_HEURISTIC", &raw)?;
        }

        if let Some(raw) = lookup("STOCKVAL_EXPORT_DELIMITER").filter(|v| !v.is_empty()) {
            let delimiter = parse_char("STOCKVAL_EXPORT_DELIMITER", &raw)?;
            if !delimiter.is_ascii() {
                return Err(ConfigError::invalid("STOCKVAL_EXPORT_DELIMITER", &raw, "must be ASCII"));
            }
            settings.export_locale.delimiter = delimiter;
        }
        if let Some(raw) = get("STOCKVAL_DECIMAL_SEPARATOR") {
            settings.export_locale.decimal_separator = parse_char("STOCKVAL_DECIMAL_SEPARATOR", raw.trim())?;
        }
        if settings.export_locale.delimiter == settings.export_locale.decimal_separator {
            return Err(ConfigError::invalid(
                "STOCKVAL_DECIMAL_SEPARATOR",
                &settings.export_locale.decimal_separator.to_string(),
                "must differ from the export delimiter",
            ));
        }

        Ok(settings)
    }

    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig::default()
            .with_internal_ids(self.internal_location_ids.iter().copied())
            .with_name_heuristic(self.name_heuristic)
    }
}
