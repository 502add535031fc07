use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use crate::tasks::ViewMode;

pub const DATA_DIR_ENV: &str = "TASKTRAIL_DATA_DIR";
pub const DEBUG_ENV: &str = "TASKTRAIL_DEBUG";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorSettings {
    pub api_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com".into(),
            model: "gpt-3.5-turbo".into(),
            max_tokens: 50,
            temperature: 0.7,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    pub tasks_file: PathBuf,
    pub archive_file: PathBuf,
    pub sample_interval_ms: u64,
    /// Longest a single foreground query may take before the tick is skipped.
    pub sample_timeout_ms: u64,
    pub refresh_interval_ms: u64,
    /// Record a task on every focus transition, not only on manual add.
    pub auto_record: bool,
    /// Applications whose focus never replaces the stored target: this tool's
    /// own host process and the terminals it is launched from.
    pub self_apps: Vec<String>,
    pub browser_apps: Vec<String>,
    pub messaging_apps: Vec<String>,
    pub generator: GeneratorSettings,
    pub default_view: ViewMode,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let mut self_apps = vec!["Python".to_string(), "Terminal".to_string()];
        if let Some(own) = own_process_name() {
            if !self_apps.contains(&own) {
                self_apps.push(own);
            }
        }

        Self {
            tasks_file: PathBuf::from("tasks.json"),
            archive_file: PathBuf::from("archive.json"),
            sample_interval_ms: 1000,
            sample_timeout_ms: 5000,
            refresh_interval_ms: 1000,
            auto_record: true,
            self_apps,
            browser_apps: to_strings(&["Google Chrome", "Safari", "Firefox", "Microsoft Edge"]),
            messaging_apps: to_strings(&[
                "Outlook",
                "Slack",
                "Microsoft Teams",
                "Messages",
                "WhatsApp",
            ]),
            generator: GeneratorSettings::default(),
            default_view: ViewMode::ByType,
        }
    }
}

impl EngineSettings {
    pub fn tasks_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.tasks_file)
    }

    pub fn archive_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.archive_file)
    }

}

/// Whether `app` is one of the configured application names.
pub fn lists_app(apps: &[String], app: &str) -> bool {
    apps.iter().any(|a| a == app)
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn own_process_name() -> Option<String> {
    env::current_exe()
        .ok()?
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
}

/// Directory holding settings and task files. Falls back to the working
/// directory, which is where task files have always lived.
pub fn data_dir() -> Result<PathBuf> {
    match env::var_os(DATA_DIR_ENV) {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => env::current_dir().context("failed to read current directory"),
    }
}

pub fn debug_enabled() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn api_key() -> Option<String> {
    env::var(API_KEY_ENV)
        .ok()
        .filter(|key| !key.trim().is_empty())
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<EngineSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Ignoring malformed settings at {}: {err}",
                    path.display()
                );
                EngineSettings::default()
            })
        } else {
            EngineSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn in_dir(dir: &Path) -> Result<Self> {
        Self::new(dir.join(SETTINGS_FILE))
    }

    pub fn get(&self) -> EngineSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, settings: EngineSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = settings;
        self.persist(&guard)
    }

    /// Store `mode` as the view to open with next time. Returns false when it
    /// already was, without touching the file.
    pub fn remember_view(&self, mode: ViewMode) -> Result<bool> {
        let mut settings = self.get();
        if settings.default_view == mode {
            return Ok(false);
        }
        settings.default_view = mode;
        self.update(settings)?;
        Ok(true)
    }

    fn persist(&self, data: &EngineSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
