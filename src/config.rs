use std::path::PathBuf;

use derive_builder::Builder;

use crate::audio::WavEncoding;

/// Default upper bound for a single pause directive (one minute).
pub const DEFAULT_MAX_PAUSE_MS: u64 = 60_000;

/// Engine settings, fixed at construction.
///
/// ```rust,no_run
/// use tts_serve::EngineConfigBuilder;
///
/// let config = EngineConfigBuilder::default()
///     .models_dir("models")
///     .output_dir("outputs")
///     .build()?;
/// assert!(config.catalog_file().ends_with("catalog.json"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct EngineConfig {
    /// Root directory holding one subdirectory per voice.
    pub models_dir: PathBuf,
    /// Directory receiving generated audio files.
    pub output_dir: PathBuf,
    /// Backup root for pristine voice configs.
    /// Defaults to `<models_dir>/.config_backups`.
    #[builder(default, setter(strip_option))]
    pub backup_dir: Option<PathBuf>,
    /// Catalog descriptor. Defaults to `<models_dir>/catalog.json`.
    #[builder(default, setter(strip_option))]
    pub catalog_file: Option<PathBuf>,
    /// Sample encoding of assembled output files.
    #[builder(default)]
    pub output_encoding: WavEncoding,
    /// Longer pause directives are clamped to this many milliseconds.
    #[builder(default = "DEFAULT_MAX_PAUSE_MS")]
    pub max_pause_ms: u64,
}

impl EngineConfig {
    /// Config with defaults for everything but the two directories.
    pub fn new(models_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
            output_dir: output_dir.into(),
            backup_dir: None,
            catalog_file: None,
            output_encoding: WavEncoding::default(),
            max_pause_ms: DEFAULT_MAX_PAUSE_MS,
        }
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| self.models_dir.join(".config_backups"))
    }

    pub fn catalog_file(&self) -> PathBuf {
        self.catalog_file
            .clone()
            .unwrap_or_else(|| self.models_dir.join("catalog.json"))
    }
}
