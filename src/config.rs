use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::{Result, TutorError};
use crate::tutor::model::InvokeOptions;
use crate::tutor::prompt_builder::{HistoryWindow, DATA_SCIENCE_INSTRUCTION};

pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_HISTORY_WINDOW: usize = 40;

/// Checked in order; the first one set wins.
pub const API_KEY_VARS: [&str; 2] = ["GOOGLE_API_KEY", "GEMINI_API_KEY"];

/// Optional settings read from `config.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub history_window: Option<usize>,
    pub domain_instruction: Option<String>,
}

impl FileConfig {
    /// Read `path` if given (it must exist), otherwise the default location
    /// if a file is present there.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        debug!("Loading config file {}", path.display());
        let content = fs::read_to_string(&path)
            .map_err(|e| TutorError::config(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| TutorError::config(format!("invalid config file {}: {}", path.display(), e)))
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ds-tutor").join("config.json"))
    }
}

/// Values given on the command line; they take precedence over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub timeout_secs: Option<u64>,
    pub history_window: Option<usize>,
}

#[derive(Clone)]
pub struct TutorConfig {
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub base_url: Url,
    pub timeout: Duration,
    pub history_window: HistoryWindow,
    pub domain_instruction: String,
}

impl TutorConfig {
    pub fn load(config_path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let file = FileConfig::load(config_path)?;
        Self::resolve(file, |key| env::var(key).ok(), overrides)
    }

    /// Layer defaults, file, environment and overrides, then validate.
    pub fn resolve(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
        overrides: &Overrides,
    ) -> Result<Self> {
        let api_key = API_KEY_VARS
            .iter()
            .copied()
            .find_map(|key| env(key).filter(|v| !v.trim().is_empty()))
            .or(file.api_key)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                TutorError::config(format!(
                    "no API key found; set {} (or {})",
                    API_KEY_VARS[0], API_KEY_VARS[1]
                ))
            })?;

        let model = overrides
            .model
            .clone()
            .or_else(|| env("TUTOR_MODEL"))
            .or(file.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        if model.trim().is_empty() {
            return Err(TutorError::config("model name cannot be empty"));
        }

        let temperature = match overrides.temperature {
            Some(t) => t,
            None => parse_env(&env, "TUTOR_TEMPERATURE")?
                .or(file.temperature)
                .unwrap_or(DEFAULT_TEMPERATURE),
        };
        if !(0.0..=1.0).contains(&temperature) {
            return Err(TutorError::config(format!(
                "temperature must be between 0 and 1, got {temperature}"
            )));
        }

        let timeout_secs = match overrides.timeout_secs {
            Some(secs) => secs,
            None => parse_env(&env, "TUTOR_TIMEOUT_SECS")?
                .or(file.timeout_secs)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        };
        if timeout_secs == 0 {
            return Err(TutorError::config("timeout must be at least one second"));
        }

        let history_window = match overrides.history_window {
            Some(turns) => turns,
            None => parse_env(&env, "TUTOR_HISTORY_WINDOW")?
                .or(file.history_window)
                .unwrap_or(DEFAULT_HISTORY_WINDOW),
        };

        let base_url = parse_base_url(file.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))?;

        let domain_instruction = file
            .domain_instruction
            .unwrap_or_else(|| DATA_SCIENCE_INSTRUCTION.to_string());

        let config = Self {
            api_key,
            model,
            temperature,
            base_url,
            timeout: Duration::from_secs(timeout_secs),
            history_window: HistoryWindow::from_turn_count(history_window),
            domain_instruction,
        };
        debug!(?config, "Resolved configuration");
        Ok(config)
    }

    pub fn invoke_options(&self) -> InvokeOptions {
        InvokeOptions {
            model: self.model.clone(),
            temperature: self.temperature,
        }
    }
}

impl fmt::Debug for TutorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TutorConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("history_window", &self.history_window)
            .finish_non_exhaustive()
    }
}

fn parse_env<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    match env(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| TutorError::config(format!("{key} has an invalid value: {raw:?}"))),
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    // `Url::join` replaces the last path segment unless the base ends in '/'.
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized).map_err(|e| TutorError::config(format!("invalid base URL {raw:?}: {e}")))
}
