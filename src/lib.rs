//! # tts-serve
//!
//! A local text-to-speech serving engine. It manages a catalog of voice
//! models, loads and caches one native synthesis model per voice, splits input
//! text around inline pause directives (`<p=500>`), and assembles the speech
//! and silence into a single WAV file.
//!
//! ## Features
//!
//! - **Voice catalog**: from a `catalog.json` descriptor or by scanning model
//!   directories, with a "missing voices" diagnostic
//! - **Config backups**: inspect, edit and restore each voice's config
//! - **Model cache**: lazy per-voice loading with a single resync-and-retry on
//!   load failure
//! - **Pause-aware synthesis**: silence is generated at the voice's sample rate
//!   and concatenated with the rendered speech
//! - **Piper backend** (`piper` feature): ONNX Piper voices, phonemized with
//!   espeak-ng
//!
//! ## Quick Start
//!
//! ```ignore
//! use tts_serve::{engines::piper::{PiperLoader, PiperRuntime}, DisabledSync, EngineConfig, TtsEngine};
//!
//! let config = EngineConfig::new("models", "outputs");
//! let engine = TtsEngine::new(config, PiperLoader::new(PiperRuntime::default()), DisabledSync)?;
//!
//! let (filename, path) = engine.synthesize("Hola <p=400> mundo", "es-mx-luisa", 1.0)?;
//! println!("wrote {filename} to {}", path.display());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod assemble;
pub mod audio;
pub mod backup;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod engines;
pub mod error;
pub mod render;
pub mod segment;
pub mod sync;

use std::fs::File;

pub use audio::{AudioChunk, WavEncoding};
pub use backup::VoiceConfig;
pub use catalog::{Catalog, Gender, GenderedCatalog, MissingVoice, VoiceInfo, VoiceSummary};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use engine::TtsEngine;
pub use error::{ModelError, SyncError, TtsError};
pub use segment::{segment, Segment};
pub use sync::{CommandSync, DisabledSync, ModelSync};

/// Audio handed back by a model that returns its output.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesizedAudio {
    /// Mono float samples at the given rate
    Samples { samples: Vec<f32>, sample_rate: u32 },
    /// An already encoded WAV file, persisted as-is
    Encoded(Vec<u8>),
}

/// Synthesis by writing a complete WAV file into a handle opened by the caller.
pub trait FileSynthesis {
    fn synthesize_into(
        &mut self,
        text: &str,
        length_scale: f32,
        out: &mut File,
    ) -> Result<(), ModelError>;
}

/// Synthesis by returning samples or encoded bytes.
pub trait ValueSynthesis {
    fn synthesize(&mut self, text: &str, length_scale: f32)
        -> Result<SynthesizedAudio, ModelError>;
}

/// A loaded native voice model.
///
/// Models expose synthesis through one of two incompatible call contracts.
/// The engine probes these accessors once per loaded model and remembers
/// which one answered.
pub trait SpeechModel: Send {
    fn as_file_synthesis(&mut self) -> Option<&mut dyn FileSynthesis> {
        None
    }

    fn as_value_synthesis(&mut self) -> Option<&mut dyn ValueSynthesis> {
        None
    }
}

/// Constructs native models for catalog voices.
///
/// This is the single place native construction errors enter the engine.
pub trait ModelLoader: Send + Sync {
    fn load(&self, voice: &VoiceInfo) -> Result<Box<dyn SpeechModel>, ModelError>;
}
