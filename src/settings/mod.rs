//! Settings management
//!
//! Loads and merges settings from multiple sources:
//! - User settings: `~/.terminal-pool/settings.json`
//! - Project settings: `.terminal-pool/settings.json`
//! - Local settings: `.terminal-pool/settings.local.json`
//!
//! Priority: Local > Project > User

mod manager;

pub use manager::{Settings, SettingsManager};
