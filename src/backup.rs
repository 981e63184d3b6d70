//! Pristine copies of each voice's configuration file.
//!
//! The first time a voice is seen its config is copied under the backup root,
//! mirroring its path relative to the model root. Backups are never
//! overwritten afterwards; only [`ConfigBackups::restore`] reads them back.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::catalog::{Catalog, VoiceInfo};
use crate::error::TtsError;

/// Live and pristine configuration of one voice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceConfig {
    /// Current content of the live config file
    pub current: String,
    /// Content of the backup, `None` if no backup exists
    pub original: Option<String>,
    /// Location of the live config file
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ConfigBackups {
    models_dir: PathBuf,
    backup_dir: PathBuf,
}

impl ConfigBackups {
    pub fn new(models_dir: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
            backup_dir: backup_dir.into(),
        }
    }

    /// Where the backup of `config_path` lives.
    pub fn backup_path_for(&self, config_path: &Path) -> PathBuf {
        match config_path.strip_prefix(&self.models_dir) {
            Ok(relative) => self.backup_dir.join(relative),
            Err(_) => self
                .backup_dir
                .join(config_path.file_name().unwrap_or(config_path.as_os_str())),
        }
    }

    /// Create missing backups for every voice. Failures are logged and skipped.
    pub fn ensure(&self, catalog: &Catalog) {
        if let Err(e) = fs::create_dir_all(&self.backup_dir) {
            log::warn!("Cannot create backup dir {}: {e}", self.backup_dir.display());
            return;
        }
        for voice in catalog.voices() {
            if let Err(e) = self.ensure_one(voice) {
                log::warn!("Skipping config backup for '{}': {e}", voice.id);
            }
        }
    }

    fn ensure_one(&self, voice: &VoiceInfo) -> std::io::Result<()> {
        let backup = self.backup_path_for(&voice.config_path);
        if !voice.config_path.is_file() || backup.exists() {
            return Ok(());
        }
        if let Some(parent) = backup.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&voice.config_path, &backup)?;
        log::debug!("Backed up {} to {}", voice.config_path.display(), backup.display());
        Ok(())
    }

    /// Read live and backup content.
    pub fn read(&self, voice: &VoiceInfo) -> Result<VoiceConfig, TtsError> {
        let current = fs::read_to_string(&voice.config_path).map_err(|e| {
            TtsError::config(format!(
                "could not read {}: {e}",
                voice.config_path.display()
            ))
        })?;
        let original = fs::read_to_string(self.backup_path_for(&voice.config_path)).ok();
        Ok(VoiceConfig {
            current,
            original,
            path: voice.config_path.clone(),
        })
    }

    /// Validate `raw` as JSON and write it pretty-printed as the live config.
    ///
    /// Invalid input leaves the live file untouched. Returns the written text.
    pub fn update(&self, voice: &VoiceInfo, raw: &str) -> Result<String, TtsError> {
        let parsed: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| TtsError::config(format!("config is not valid JSON: {e}")))?;
        let mut formatted = serde_json::to_string_pretty(&parsed)
            .map_err(|e| TtsError::config(format!("could not serialize config: {e}")))?;
        formatted.push('\n');

        fs::write(&voice.config_path, &formatted).map_err(|e| {
            TtsError::config(format!(
                "could not write {}: {e}",
                voice.config_path.display()
            ))
        })?;
        Ok(formatted)
    }

    /// Copy the backup over the live config and return the restored text.
    pub fn restore(&self, voice: &VoiceInfo) -> Result<String, TtsError> {
        let backup = self.backup_path_for(&voice.config_path);
        if !backup.is_file() {
            return Err(TtsError::config(format!(
                "no backup exists for the config of '{}'",
                voice.id
            )));
        }
        let content = fs::read(&backup)
            .map_err(|e| TtsError::config(format!("could not read backup: {e}")))?;
        fs::write(&voice.config_path, &content).map_err(|e| {
            TtsError::config(format!(
                "could not restore {}: {e}",
                voice.config_path.display()
            ))
        })?;
        Ok(String::from_utf8_lossy(&content).into_owned())
    }
}
