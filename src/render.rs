//! Rendering one text segment with a loaded model.
//!
//! A model answers either [`SpeechModel::as_file_synthesis`] or
//! [`SpeechModel::as_value_synthesis`]. The first render probes both (file
//! first) and pins the matching [`RenderAdapter`] on the [`CapabilityHandle`];
//! later renders go straight to that adapter.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::audio::{AudioChunk, WavEncoding};
use crate::error::{ModelError, TtsError};
use crate::{SpeechModel, SynthesizedAudio};

const UNSUPPORTED_CONTRACT: &str =
    "the voice model's synthesis contract is unsupported: expected a file handle or returned audio";

/// Drives one of the two model call contracts.
pub trait RenderAdapter: Send + Sync {
    /// Short name of the contract, for logs.
    fn contract(&self) -> &'static str;

    /// Write a complete WAV file for `text` into `out`.
    fn render(
        &self,
        model: &mut dyn SpeechModel,
        text: &str,
        length_scale: f32,
        out: &mut File,
    ) -> Result<(), TtsError>;
}

/// Caller opens the file, the model writes into it.
#[derive(Debug)]
pub struct FileAdapter;

/// The model returns samples or encoded bytes, the caller persists them.
#[derive(Debug)]
pub struct ValueAdapter;

static FILE_ADAPTER: FileAdapter = FileAdapter;
static VALUE_ADAPTER: ValueAdapter = ValueAdapter;

impl RenderAdapter for FileAdapter {
    fn contract(&self) -> &'static str {
        "write-into-file"
    }

    fn render(
        &self,
        model: &mut dyn SpeechModel,
        text: &str,
        length_scale: f32,
        out: &mut File,
    ) -> Result<(), TtsError> {
        let synth = model
            .as_file_synthesis()
            .ok_or_else(|| TtsError::synthesis(UNSUPPORTED_CONTRACT))?;
        synth
            .synthesize_into(text, length_scale, out)
            .map_err(model_failure)
    }
}

impl RenderAdapter for ValueAdapter {
    fn contract(&self) -> &'static str {
        "return-value"
    }

    fn render(
        &self,
        model: &mut dyn SpeechModel,
        text: &str,
        length_scale: f32,
        out: &mut File,
    ) -> Result<(), TtsError> {
        let synth = model
            .as_value_synthesis()
            .ok_or_else(|| TtsError::synthesis(UNSUPPORTED_CONTRACT))?;
        match synth.synthesize(text, length_scale).map_err(model_failure)? {
            SynthesizedAudio::Samples {
                samples,
                sample_rate,
            } if sample_rate > 0 => AudioChunk::new(samples, sample_rate, 1)
                .write_wav_to(&mut *out, WavEncoding::Float32)
                .map_err(|e| TtsError::synthesis(format!("could not write segment audio: {e}"))),
            SynthesizedAudio::Encoded(bytes) if !bytes.is_empty() => out
                .write_all(&bytes)
                .map_err(|e| TtsError::synthesis(format!("could not write segment audio: {e}"))),
            _ => Err(TtsError::synthesis(
                "the voice model returned audio in an unexpected format",
            )),
        }
    }
}

/// Pick the adapter for `model`, or `None` if it exposes neither contract.
pub fn probe(model: &mut dyn SpeechModel) -> Option<&'static dyn RenderAdapter> {
    if model.as_file_synthesis().is_some() {
        Some(&FILE_ADAPTER)
    } else if model.as_value_synthesis().is_some() {
        Some(&VALUE_ADAPTER)
    } else {
        None
    }
}

fn model_failure(err: ModelError) -> TtsError {
    TtsError::synthesis(format!("voice model failed: {err}"))
}

/// A segment rendered into a temporary WAV file.
///
/// The file is deleted when the part is dropped unless it is persisted.
pub struct RenderedPart {
    pub file: NamedTempFile,
    pub chunk: AudioChunk,
}

/// A loaded model bound to one voice, owned by the model cache.
pub struct CapabilityHandle {
    voice_id: String,
    model: Box<dyn SpeechModel>,
    adapter: Option<&'static dyn RenderAdapter>,
}

impl CapabilityHandle {
    pub fn new(voice_id: impl Into<String>, model: Box<dyn SpeechModel>) -> Self {
        Self {
            voice_id: voice_id.into(),
            model,
            adapter: None,
        }
    }

    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    /// The pinned contract, once the first render has probed it.
    pub fn contract(&self) -> Option<&'static str> {
        self.adapter.map(|a| a.contract())
    }

    fn adapter(&mut self) -> Result<&'static dyn RenderAdapter, TtsError> {
        if let Some(adapter) = self.adapter {
            return Ok(adapter);
        }
        let adapter =
            probe(self.model.as_mut()).ok_or_else(|| TtsError::synthesis(UNSUPPORTED_CONTRACT))?;
        log::debug!(
            "Voice '{}' uses the {} synthesis contract",
            self.voice_id,
            adapter.contract()
        );
        self.adapter = Some(adapter);
        Ok(adapter)
    }

    /// Render `text` into a fresh temporary file under `dir` and read it back.
    pub fn render(
        &mut self,
        text: &str,
        length_scale: f32,
        dir: &Path,
    ) -> Result<RenderedPart, TtsError> {
        let adapter = self.adapter()?;
        let mut file = tempfile::Builder::new()
            .prefix("part_")
            .suffix(".wav")
            .tempfile_in(dir)
            .map_err(|e| TtsError::synthesis(format!("could not create temp file: {e}")))?;

        adapter.render(self.model.as_mut(), text, length_scale, file.as_file_mut())?;

        let chunk = AudioChunk::read_wav(file.path())
            .map_err(|e| TtsError::synthesis(format!("rendered audio is unreadable: {e}")))?;
        if chunk.sample_rate == 0 {
            return Err(TtsError::synthesis("rendered audio has an invalid sample rate"));
        }
        Ok(RenderedPart { file, chunk })
    }
}
