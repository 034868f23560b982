//! Settings manager implementation
//!
//! Handles loading, merging, and resolving settings into a
//! [`TerminalConfig`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::{AdapterType, TerminalConfig};

/// Settings file names
const SETTINGS_DIR: &str = ".terminal-pool";
const SETTINGS_FILE: &str = "settings.json";
const LOCAL_SETTINGS_FILE: &str = "settings.local.json";

/// Contents of a settings file
///
/// Every field is optional; unset fields fall through to lower-priority
/// sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub adapter: Option<AdapterType>,

    #[serde(default)]
    pub pool_size: Option<usize>,

    #[serde(default)]
    pub recycle_after: Option<u32>,

    #[serde(default)]
    pub command_timeout_ms: Option<u64>,

    #[serde(default)]
    pub health_check_interval_ms: Option<u64>,

    #[serde(default)]
    pub acquire_timeout_ms: Option<u64>,

    #[serde(default)]
    pub acquire_poll_interval_ms: Option<u64>,

    #[serde(default)]
    pub idle_recycle_ms: Option<u64>,

    #[serde(default)]
    pub shell: Option<String>,

    /// `TERMINAL_POOL_*` variables, lowest priority after defaults
    #[serde(default)]
    pub env: Option<HashMap<String, String>>,

    /// Additional settings as raw JSON
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Settings {
    /// Create empty settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge another settings into this one
    ///
    /// Values from `other` take precedence over `self`.
    pub fn merge(&mut self, other: Settings) {
        fn take<T>(slot: &mut Option<T>, other: Option<T>) {
            if other.is_some() {
                *slot = other;
            }
        }
        take(&mut self.adapter, other.adapter);
        take(&mut self.pool_size, other.pool_size);
        take(&mut self.recycle_after, other.recycle_after);
        take(&mut self.command_timeout_ms, other.command_timeout_ms);
        take(
            &mut self.health_check_interval_ms,
            other.health_check_interval_ms,
        );
        take(&mut self.acquire_timeout_ms, other.acquire_timeout_ms);
        take(
            &mut self.acquire_poll_interval_ms,
            other.acquire_poll_interval_ms,
        );
        take(&mut self.idle_recycle_ms, other.idle_recycle_ms);
        take(&mut self.shell, other.shell);

        if let Some(other_env) = other.env {
            self.env.get_or_insert_with(HashMap::new).extend(other_env);
        }
        self.extra.extend(other.extra);
    }

    /// Overwrite `config` fields that are set in these settings
    ///
    /// The `env` object is applied first, then the top-level fields.
    pub fn apply_to(&self, config: &mut TerminalConfig) {
        if let Some(env) = &self.env {
            config.apply_env(|key| env.get(key).cloned());
        }
        if let Some(adapter) = self.adapter {
            config.adapter = adapter;
        }
        if let Some(size) = self.pool_size {
            config.pool_size = size;
        }
        if let Some(count) = self.recycle_after {
            config.recycle_after = count;
        }
        if let Some(ms) = self.command_timeout_ms {
            config.command_timeout_ms = ms;
        }
        if let Some(ms) = self.health_check_interval_ms {
            config.health_check_interval_ms = ms;
        }
        if let Some(ms) = self.acquire_timeout_ms {
            config.acquire_timeout_ms = ms;
        }
        if let Some(ms) = self.acquire_poll_interval_ms {
            config.acquire_poll_interval_ms = ms;
        }
        if let Some(ms) = self.idle_recycle_ms {
            config.idle_recycle_ms = ms;
        }
        if let Some(shell) = &self.shell {
            config.shell = Some(shell.clone());
        }
    }
}

/// Settings manager for loading and accessing settings
#[derive(Debug)]
pub struct SettingsManager {
    /// The merged settings
    settings: Settings,
    /// Project working directory
    project_dir: PathBuf,
    /// Directory holding user settings, usually the home directory
    user_dir: Option<PathBuf>,
}

impl SettingsManager {
    /// Load settings for `project_dir` and the current user
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self::with_user_dir(project_dir, dirs::home_dir())
    }

    /// Load settings reading user settings from `user_dir` instead of home
    pub fn with_user_dir(project_dir: impl AsRef<Path>, user_dir: Option<PathBuf>) -> Self {
        let project_dir = project_dir.as_ref().to_path_buf();
        let settings = Self::load_all_settings(user_dir.as_deref(), &project_dir);
        Self {
            settings,
            project_dir,
            user_dir,
        }
    }

    /// Load and merge all settings sources
    ///
    /// Priority: Local > Project > User
    fn load_all_settings(user_dir: Option<&Path>, project_dir: &Path) -> Settings {
        let mut settings = Settings::new();

        if let Some(user_dir) = user_dir {
            let path = user_dir.join(SETTINGS_DIR).join(SETTINGS_FILE);
            if let Some(user_settings) = Self::load_settings_file(&path) {
                tracing::debug!(path = %path.display(), "Loaded user settings");
                settings.merge(user_settings);
            }
        }

        let project_settings_dir = project_dir.join(SETTINGS_DIR);
        for (file, label) in [
            (SETTINGS_FILE, "project"),
            (LOCAL_SETTINGS_FILE, "local"),
        ] {
            let path = project_settings_dir.join(file);
            if let Some(file_settings) = Self::load_settings_file(&path) {
                tracing::debug!(path = %path.display(), source = label, "Loaded settings");
                settings.merge(file_settings);
            }
        }

        settings
    }

    /// Load settings from a file
    fn load_settings_file(path: &Path) -> Option<Settings> {
        if !path.exists() {
            return None;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(settings) => Some(settings),
                Err(e) => {
                    tracing::warn!("Failed to parse settings file {:?}: {}", path, e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read settings file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Get the merged settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get the project directory
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Reload settings from all sources
    pub fn reload(&mut self) {
        self.settings = Self::load_all_settings(self.user_dir.as_deref(), &self.project_dir);
    }

    /// Resolve the terminal configuration from settings and the process
    /// environment
    pub fn terminal_config(&self) -> TerminalConfig {
        self.terminal_config_with(|key| std::env::var(key).ok())
    }

    /// Resolve the terminal configuration with an explicit environment lookup
    ///
    /// Priority: environment > settings top-level > settings `env` > defaults.
    pub fn terminal_config_with<F>(&self, lookup: F) -> TerminalConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = TerminalConfig::default();
        self.settings.apply_to(&mut config);
        config.apply_env(lookup);
        config
    }
}
