use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

pub const SETTINGS_FILE: &str = "gradebook.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Settings {
    /// Written to `students.program` on every upsert.
    pub default_program: String,
    /// Commit the student upsert and grade append as one batch.
    pub atomic_writes: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_program: "Sample Program".into(),
            atomic_writes: true,
        }
    }
}

pub fn parse_settings(raw: &str) -> anyhow::Result<Settings> {
    toml::from_str(raw).context("invalid gradebook.toml")
}

/// Missing or unreadable settings fall back to defaults; the workspace still opens.
pub fn load_settings(workspace: &Path) -> Settings {
    let path = workspace.join(SETTINGS_FILE);
    let raw = match std::fs::read_to_string(&path) {
        Ok(v) => v,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Settings::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read settings, using defaults");
            return Settings::default();
        }
    };
    match parse_settings(&raw) {
        Ok(s) => s,
        Err(e) => {
            warn!(path = %path.display(), error = %format!("{e:#}"), "ignoring settings file");
            Settings::default()
        }
    }
}
