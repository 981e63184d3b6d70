use std::collections::HashMap;
use std::fs;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use uuid::Uuid;

use crate::assemble::{publish, write_output, Assembler, AudioHints};
use crate::backup::{ConfigBackups, VoiceConfig};
use crate::catalog::{Catalog, CatalogLoader, GenderedCatalog, MissingVoice, VoiceInfo};
use crate::config::EngineConfig;
use crate::error::TtsError;
use crate::render::CapabilityHandle;
use crate::segment::{segment, Segment};
use crate::sync::ModelSync;
use crate::ModelLoader;

const MIN_SPEED: f32 = 0.1;
const MIN_LENGTH_SCALE: f32 = 0.25;
const MAX_LENGTH_SCALE: f32 = 4.0;

/// Inverse-speed multiplier passed to the model, clamped to `0.25..=4.0`.
pub fn length_scale(speed: f32) -> f32 {
    let speed = if speed.is_nan() { 1.0 } else { speed };
    (1.0 / speed.max(MIN_SPEED)).clamp(MIN_LENGTH_SCALE, MAX_LENGTH_SCALE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ResyncState {
    #[default]
    Idle,
    InFlight,
}

/// Everything guarded by the synthesis lock.
#[derive(Default)]
struct EngineState {
    cache: HashMap<String, CapabilityHandle>,
    resync: ResyncState,
}

/// Marks a resync as in flight for as long as it lives.
struct ResyncGuard<'a> {
    state: &'a mut EngineState,
}

impl<'a> ResyncGuard<'a> {
    fn acquire(state: &'a mut EngineState) -> Self {
        state.resync = ResyncState::InFlight;
        Self { state }
    }
}

impl Deref for ResyncGuard<'_> {
    type Target = EngineState;

    fn deref(&self) -> &EngineState {
        self.state
    }
}

impl DerefMut for ResyncGuard<'_> {
    fn deref_mut(&mut self) -> &mut EngineState {
        self.state
    }
}

impl Drop for ResyncGuard<'_> {
    fn drop(&mut self) {
        self.state.resync = ResyncState::Idle;
    }
}

/// The text-to-speech engine.
///
/// Holds the voice catalog and one cached model per voice. All model loading
/// and rendering is serialized behind a single lock, so at most one synthesis
/// job touches a model at a time. Catalog reads do not wait for that lock.
///
/// # Example
///
/// ```rust,no_run
/// # use tts_serve::{DisabledSync, EngineConfig, ModelLoader, TtsEngine};
/// # fn demo(loader: impl ModelLoader + 'static) -> Result<(), tts_serve::TtsError> {
/// let engine = TtsEngine::new(EngineConfig::new("models", "outputs"), loader, DisabledSync)?;
///
/// for voice in engine.catalog_by_gender().female {
///     println!("{} ({})", voice.name, voice.accent);
/// }
/// let (filename, _path) = engine.synthesize("Hello <p=300> world", "es-mx-luisa", 1.0)?;
/// # Ok(())
/// # }
/// ```
pub struct TtsEngine {
    config: EngineConfig,
    loader: Box<dyn ModelLoader>,
    sync: Box<dyn ModelSync>,
    catalog_loader: CatalogLoader,
    backups: ConfigBackups,
    catalog: RwLock<Arc<Catalog>>,
    state: Mutex<EngineState>,
}

impl TtsEngine {
    /// Create the output directory, load the catalog and back up configs.
    ///
    /// Only failing to create the output directory is an error; catalog and
    /// backup problems degrade to a smaller catalog or missing backups.
    pub fn new(
        config: EngineConfig,
        loader: impl ModelLoader + 'static,
        sync: impl ModelSync + 'static,
    ) -> Result<Self, TtsError> {
        fs::create_dir_all(&config.output_dir)?;

        let catalog_loader = CatalogLoader::new(&config.models_dir, config.catalog_file());
        let backups = ConfigBackups::new(&config.models_dir, config.backup_dir());
        let catalog = catalog_loader.load();
        backups.ensure(&catalog);

        Ok(Self {
            config,
            loader: Box::new(loader),
            sync: Box::new(sync),
            catalog_loader,
            backups,
            catalog: RwLock::new(Arc::new(catalog)),
            state: Mutex::new(EngineState::default()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Snapshot of the current catalog.
    pub fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn catalog_by_gender(&self) -> GenderedCatalog {
        self.catalog().by_gender()
    }

    pub fn missing_voices(&self) -> Vec<MissingVoice> {
        self.catalog_loader.missing_voices()
    }

    /// Reload the catalog from disk, dropping every cached model.
    pub fn refresh_catalog(&self) {
        let mut state = self.lock();
        self.refresh_locked(&mut state);
    }

    /// Whether a model for `voice_id` is currently cached.
    pub fn is_loaded(&self, voice_id: &str) -> bool {
        self.lock().cache.contains_key(voice_id)
    }

    pub fn get_config(&self, voice_id: &str) -> Result<VoiceConfig, TtsError> {
        let voice = self.voice(voice_id)?;
        self.backups.ensure(&self.catalog());
        self.backups.read(&voice)
    }

    /// Replace a voice's config with `raw` (must be valid JSON) and drop its
    /// cached model. Returns the pretty-printed content written.
    pub fn update_config(&self, voice_id: &str, raw: &str) -> Result<String, TtsError> {
        let voice = self.voice(voice_id)?;
        self.backups.ensure(&self.catalog());

        let mut state = self.lock();
        let written = self.backups.update(&voice, raw)?;
        evict(&mut state, voice_id);
        Ok(written)
    }

    /// Copy the pristine backup over a voice's config and drop its cached model.
    pub fn restore_config(&self, voice_id: &str) -> Result<String, TtsError> {
        let voice = self.voice(voice_id)?;

        let mut state = self.lock();
        let restored = self.backups.restore(&voice)?;
        evict(&mut state, voice_id);
        Ok(restored)
    }

    /// Synthesize `text` with a voice and write one WAV file to the output
    /// directory. Returns its file name and full path.
    ///
    /// `<p=N>` directives in the text insert `N` milliseconds of silence.
    /// `speed` above 1.0 speaks faster.
    pub fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        speed: f32,
    ) -> Result<(String, PathBuf), TtsError> {
        let mut state = self.lock();

        if text.trim().is_empty() {
            return Err(TtsError::synthesis("empty text"));
        }
        self.voice(voice_id)?;
        let length_scale = length_scale(speed);

        let handle = self.ensure_loaded(&mut state, voice_id)?;
        let segments = segment(text);

        let filename = format!("tts_{}.wav", Uuid::new_v4().simple());
        let output_path = self.config.output_dir.join(&filename);

        if let [Segment::Text(only)] = segments.as_slice() {
            if only == text.trim() {
                let part = handle.render(only, length_scale, &self.config.output_dir)?;
                publish(part.file, &output_path)?;
                log::info!("Synthesized {filename} with '{voice_id}'");
                return Ok((filename, output_path));
            }
        }

        // The catalog may have been refreshed while loading.
        let hints = self
            .catalog()
            .get(voice_id)
            .map(|v| AudioHints::from_config(&v.config_path))
            .unwrap_or_default();
        let audio = Assembler::new(&self.config.output_dir, self.config.max_pause_ms)
            .assemble(handle, &segments, length_scale, hints)?;
        write_output(&audio, &output_path, self.config.output_encoding)?;

        log::info!(
            "Synthesized {filename} with '{voice_id}': {} segments, {:.2}s",
            segments.len(),
            audio.duration_secs()
        );
        Ok((filename, output_path))
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn voice(&self, voice_id: &str) -> Result<VoiceInfo, TtsError> {
        self.catalog()
            .get(voice_id)
            .cloned()
            .ok_or_else(|| TtsError::VoiceNotFound(voice_id.to_string()))
    }

    fn ensure_loaded<'s>(
        &self,
        state: &'s mut EngineState,
        voice_id: &str,
    ) -> Result<&'s mut CapabilityHandle, TtsError> {
        if state.cache.contains_key(voice_id) {
            log::debug!("Model cache hit for '{voice_id}'");
        } else {
            let handle = self.load(state, voice_id)?;
            state.cache.insert(voice_id.to_string(), handle);
        }
        state
            .cache
            .get_mut(voice_id)
            .ok_or_else(|| TtsError::synthesis(format!("model for '{voice_id}' was evicted")))
    }

    /// Construct a model, falling back to one resync-and-retry on failure.
    fn load(&self, state: &mut EngineState, voice_id: &str) -> Result<CapabilityHandle, TtsError> {
        let voice = self.voice(voice_id)?;
        if !voice.model_path.is_file() {
            return Err(TtsError::synthesis(format!(
                "model file not found: {}",
                voice.model_path.display()
            )));
        }
        if !voice.config_path.is_file() {
            return Err(TtsError::synthesis(format!(
                "config file not found: {}",
                voice.config_path.display()
            )));
        }

        log::info!("Loading model for '{voice_id}' from {}", voice.model_path.display());
        let err = match self.loader.load(&voice) {
            Ok(model) => return Ok(CapabilityHandle::new(voice_id, model)),
            Err(err) => err,
        };

        if state.resync == ResyncState::InFlight {
            return Err(TtsError::synthesis(format!(
                "the model or its config appear damaged even after resyncing: {err}"
            )));
        }

        log::warn!("Loading '{voice_id}' failed ({err}); resyncing models");
        let mut guard = ResyncGuard::acquire(state);
        match self.sync.resync() {
            Ok(message) => {
                log::info!("Models resynced: {message}");
                self.refresh_locked(&mut guard);
                self.load(&mut guard, voice_id)
            }
            Err(sync_err) => Err(TtsError::synthesis(format!(
                "could not resync models automatically: {sync_err} (load error: {err})"
            ))),
        }
    }

    fn refresh_locked(&self, state: &mut EngineState) {
        state.cache.clear();
        let catalog = self.catalog_loader.load();
        self.backups.ensure(&catalog);
        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(catalog);
    }
}

fn evict(state: &mut EngineState, voice_id: &str) {
    if state.cache.remove(voice_id).is_some() {
        log::debug!("Evicted cached model for '{voice_id}'");
    }
}
