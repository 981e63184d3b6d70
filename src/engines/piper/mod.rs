//! Piper text-to-speech backend.
//!
//! Loads Piper VITS voices (`<voice>.onnx` plus `<voice>.onnx.json`) with ONNX
//! Runtime and phonemizes text with espeak-ng, using the espeak voice named in
//! each voice's config.
//!
//! # System Requirements
//!
//! **espeak-ng** must be installed on your system:
//! - **Linux**: `sudo apt-get install espeak-ng`
//! - **macOS**: `brew install espeak-ng`
//! - **Windows**: Download installer from <https://espeak-ng.org/download>
//!
//! A bundled espeak-ng can be used instead through [`EspeakConfig`].
//!
//! # Model Directory Layout
//!
//! ```text
//! models/
//! ├── catalog.json                      # optional descriptor
//! └── es_MX-luisa/
//!     ├── es_MX-luisa-medium.onnx
//!     └── es_MX-luisa-medium.onnx.json
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use tts_serve::engines::piper::{PiperLoader, PiperRuntime};
//! use tts_serve::{DisabledSync, EngineConfig, TtsEngine};
//!
//! let runtime = PiperRuntime {
//!     num_threads: Some(2),
//!     ..Default::default()
//! };
//! let engine = TtsEngine::new(
//!     EngineConfig::new("models", "outputs"),
//!     PiperLoader::new(runtime),
//!     DisabledSync,
//! )?;
//! let (filename, _) = engine.synthesize("Hola <p=500> mundo", "es_MX-luisa", 1.0)?;
//! println!("{filename}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod config;
mod model;
mod phonemizer;

pub use config::{PhonemeIdMap, PiperConfig};
pub use model::{PiperError, PiperVoice};
pub use phonemizer::EspeakConfig;

use crate::catalog::VoiceInfo;
use crate::error::ModelError;
use crate::{ModelLoader, SpeechModel};

/// Settings shared by every Piper voice the loader constructs.
#[derive(Debug, Clone, Default)]
pub struct PiperRuntime {
    /// ONNX Runtime intra/inter-op threads; `None` lets ORT decide.
    pub num_threads: Option<usize>,
    pub espeak: EspeakConfig,
}

/// [`ModelLoader`] for Piper voices.
#[derive(Debug, Clone, Default)]
pub struct PiperLoader {
    runtime: PiperRuntime,
}

impl PiperLoader {
    pub fn new(runtime: PiperRuntime) -> Self {
        Self { runtime }
    }
}

impl ModelLoader for PiperLoader {
    fn load(&self, voice: &VoiceInfo) -> Result<Box<dyn SpeechModel>, ModelError> {
        let model = PiperVoice::load(&voice.model_path, &voice.config_path, &self.runtime)?;
        Ok(Box::new(model))
    }
}
