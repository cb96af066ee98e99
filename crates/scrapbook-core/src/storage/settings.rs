//! Process-wide settings.
//!
//! Holds the live timer counter and break flag alongside user preferences:
//! - overtime multiplier, work session and break lengths
//! - frontend webhook URL and API port
//! - document names (queue file, generic notes file, attachments folder)
//!
//! Persisted as TOML at `~/.config/scrapbook/settings.toml` after every change.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

use super::data_dir;
use crate::duration::Minutes;
use crate::error::{ConfigError, Result};

/// Application settings.
///
/// Keys are camelCase on disk (`timeSpent`, `onBreak`, ...). Missing keys take
/// their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Minutes accrued for the active question.
    #[serde(default)]
    pub time_spent: Minutes,
    #[serde(default)]
    pub on_break: bool,
    /// The running break is a thinking break that ends after `thinkingTime`.
    /// A manual break leaves this unset and lasts until it is ended.
    #[serde(default)]
    pub timed_break: bool,
    #[serde(default = "default_over_time")]
    pub over_time: f64,
    #[serde(default = "default_working_time")]
    pub working_time: Minutes,
    #[serde(default = "default_thinking_time")]
    pub thinking_time: Minutes,
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_generic_doc_filename")]
    pub generic_doc_filename: String,
    #[serde(default = "default_questions_file")]
    pub questions_file: String,
    #[serde(default = "default_attachments_folder")]
    pub attachments_folder: String,
}

// Default functions
fn default_over_time() -> f64 {
    1.4
}
fn default_working_time() -> Minutes {
    Minutes(60)
}
fn default_thinking_time() -> Minutes {
    Minutes(8)
}
fn default_frontend_url() -> String {
    "http://localhost:5000".into()
}
fn default_api_port() -> u16 {
    8080
}
fn default_generic_doc_filename() -> String {
    "scrapbook".into()
}
fn default_questions_file() -> String {
    "questions.md".into()
}
fn default_attachments_folder() -> String {
    "attachments".into()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            time_spent: Minutes::ZERO,
            on_break: false,
            timed_break: false,
            over_time: default_over_time(),
            working_time: default_working_time(),
            thinking_time: default_thinking_time(),
            frontend_url: default_frontend_url(),
            api_port: default_api_port(),
            generic_doc_filename: default_generic_doc_filename(),
            questions_file: default_questions_file(),
            attachments_folder: default_attachments_folder(),
        }
    }
}

impl Settings {
    /// Check values the timers and notifier depend on.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            key: key.into(),
            message: message.into(),
        };
        if self.working_time.is_zero() {
            return Err(invalid("workingTime", "must be at least one minute"));
        }
        if self.thinking_time.is_zero() {
            return Err(invalid("thinkingTime", "must be at least one minute"));
        }
        if !(self.over_time.is_finite() && self.over_time > 0.0) {
            return Err(invalid("overTime", "must be a positive number"));
        }
        if url::Url::parse(&self.frontend_url).is_err() {
            return Err(invalid("frontendUrl", "must be an absolute URL"));
        }
        if self.questions_file.trim().is_empty() {
            return Err(invalid("questionsFile", "must not be empty"));
        }
        Ok(())
    }

    /// Get a settings value as string by key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        match json.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a settings value by key, parsing `value` according to the type of
    /// the existing entry. The result is validated but not saved.
    ///
    /// # Errors
    /// Returns an error if the key is unknown, the value cannot be parsed or
    /// the updated settings fail validation.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.into(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        let obj = json
            .as_object_mut()
            .ok_or_else(|| ConfigError::UnknownKey(key.into()))?;
        let existing = obj
            .get(key)
            .ok_or_else(|| ConfigError::UnknownKey(key.into()))?;

        let new_value = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
            ),
            serde_json::Value::Number(_) => {
                if let Ok(n) = value.parse::<u64>() {
                    serde_json::Value::Number(n.into())
                } else if let Ok(n) = value.parse::<f64>() {
                    serde_json::Number::from_f64(n)
                        .map(serde_json::Value::Number)
                        .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                } else {
                    return Err(invalid(format!("cannot parse '{value}' as number")));
                }
            }
            _ => serde_json::Value::String(value.into()),
        };
        obj.insert(key.to_string(), new_value);

        let updated: Settings = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}

/// Where settings are persisted.
pub trait SettingsStore: Send {
    /// Load the stored settings, or defaults when nothing is stored yet.
    fn load(&self) -> Result<Settings>;
    fn save(&self, settings: &Settings) -> Result<()>;
}

/// TOML file store.
#[derive(Debug, Clone)]
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `settings.toml` inside [`data_dir`].
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(data_dir()?.join("settings.toml")))
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl SettingsStore for TomlSettingsStore {
    fn load(&self) -> Result<Settings> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let settings: Settings =
                    toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                        path: self.path.clone(),
                        message: e.to_string(),
                    })?;
                settings.validate()?;
                Ok(settings)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(e) => Err(ConfigError::LoadFailed {
                path: self.path.clone(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: self.path.clone(),
            message,
        };
        let content = toml::to_string_pretty(settings).map_err(|e| save_failed(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }
        std::fs::write(&self.path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }
}

/// In-memory store keeping the last saved settings and a save counter.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    inner: Mutex<(Option<Settings>, usize)>,
}

impl MemorySettingsStore {
    pub fn new(initial: Settings) -> Self {
        Self {
            inner: Mutex::new((Some(initial), 0)),
        }
    }

    pub fn saved(&self) -> Option<Settings> {
        self.inner.lock().ok().and_then(|g| g.0.clone())
    }

    pub fn save_count(&self) -> usize {
        self.inner.lock().map(|g| g.1).unwrap_or(0)
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Settings> {
        Ok(self.saved().unwrap_or_default())
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|e| crate::error::CoreError::Custom(e.to_string()))?;
        guard.0 = Some(settings.clone());
        guard.1 += 1;
        Ok(())
    }
}

impl<T: SettingsStore + Sync> SettingsStore for std::sync::Arc<T> {
    fn load(&self) -> Result<Settings> {
        (**self).load()
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        (**self).save(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_roundtrip() {
        let settings = Settings::default();
        let toml_str = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, settings);
        assert!(toml_str.contains("overTime = 1.4"));
    }

    #[test]
    fn missing_keys_take_defaults() {
        let parsed: Settings = toml::from_str("timeSpent = 12\nonBreak = true\n").unwrap();
        assert_eq!(parsed.time_spent, Minutes(12));
        assert!(parsed.on_break);
        assert_eq!(parsed.over_time, 1.4);
        assert_eq!(parsed.working_time, Minutes(60));
        assert_eq!(parsed.thinking_time, Minutes(8));
        assert_eq!(parsed.frontend_url, "http://localhost:5000");
        assert_eq!(parsed.api_port, 8080);
        assert_eq!(parsed.generic_doc_filename, "scrapbook");
    }

    #[test]
    fn get_returns_string_for_all_types() {
        let settings = Settings::default();
        assert_eq!(settings.get("onBreak").as_deref(), Some("false"));
        assert_eq!(settings.get("workingTime").as_deref(), Some("60"));
        assert_eq!(settings.get("overTime").as_deref(), Some("1.4"));
        assert_eq!(settings.get("frontendUrl").as_deref(), Some("http://localhost:5000"));
        assert!(settings.get("missing").is_none());
    }

    #[test]
    fn set_parses_by_existing_type() {
        let mut settings = Settings::default();
        settings.set("overTime", "1.25").unwrap();
        settings.set("workingTime", "45").unwrap();
        settings.set("onBreak", "true").unwrap();
        settings.set("genericDocFilename", "inbox").unwrap();
        assert_eq!(settings.over_time, 1.25);
        assert_eq!(settings.working_time, Minutes(45));
        assert!(settings.on_break);
        assert_eq!(settings.generic_doc_filename, "inbox");
    }

    #[test]
    fn set_rejects_unknown_key_and_bad_values() {
        let mut settings = Settings::default();
        assert!(matches!(settings.set("nope", "1"), Err(ConfigError::UnknownKey(_))));
        assert!(settings.set("onBreak", "maybe").is_err());
        assert!(settings.set("workingTime", "0").is_err());
        assert!(settings.set("frontendUrl", "not a url").is_err());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn toml_store_loads_defaults_then_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlSettingsStore::new(dir.path().join("settings.toml"));
        let mut settings = store.load().unwrap();
        assert_eq!(settings, Settings::default());

        settings.time_spent = Minutes(17);
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap().time_spent, Minutes(17));
    }

    #[test]
    fn toml_store_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "thinkingTime = 0\n").unwrap();
        assert!(TomlSettingsStore::new(path).load().is_err());
    }
}
