use std::path::Path;

use ndarray::{arr1, Array2};
use ort::execution_providers::CPUExecutionProvider;
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

use super::config::{PhonemeIdMap, PiperConfig};
use super::phonemizer::{phonemize, EspeakConfig};
use super::PiperRuntime;
use crate::error::ModelError;
use crate::{SpeechModel, SynthesizedAudio, ValueSynthesis};

#[derive(thiserror::Error, Debug)]
pub enum PiperError {
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error(
        "espeak-ng not found. Install: Linux: `sudo apt-get install espeak-ng`, \
         macOS: `brew install espeak-ng`, Windows: https://espeak-ng.org/download"
    )]
    EspeakNotFound,
    #[error("Phonemization failed: {0}")]
    PhonemizerFailed(String),
    #[error("Invalid voice config: {0}")]
    Config(String),
}

impl From<PiperError> for ModelError {
    fn from(err: PiperError) -> Self {
        match err {
            PiperError::Io(e) => ModelError::Io(e),
            other => ModelError::Backend(Box::new(other)),
        }
    }
}

/// One Piper voice: an ONNX VITS session plus its phoneme table.
pub struct PiperVoice {
    session: Session,
    config: PiperConfig,
    phonemes: PhonemeIdMap,
    espeak: EspeakConfig,
    /// Multi-speaker models take a speaker id input.
    has_sid: bool,
}

impl PiperVoice {
    pub fn load(
        model_path: &Path,
        config_path: &Path,
        runtime: &PiperRuntime,
    ) -> Result<Self, PiperError> {
        let config = PiperConfig::load(config_path)?;
        log::info!(
            "Loading Piper voice from {} ({} Hz, espeak voice '{}')",
            model_path.display(),
            config.audio.sample_rate,
            config.espeak.voice
        );

        let session = init_session(model_path, runtime.num_threads)?;
        let has_sid = config.num_speakers > 1 || detect_sid_input(&session);

        Ok(Self {
            phonemes: config.phoneme_map(),
            session,
            config,
            espeak: runtime.espeak.clone(),
            has_sid,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.audio.sample_rate
    }

    /// Phonemize `text` and run each sentence through the model.
    pub fn synthesize_text(
        &mut self,
        text: &str,
        length_scale: f32,
    ) -> Result<Vec<f32>, PiperError> {
        let sentences = phonemize(text, &self.config.espeak.voice, &self.phonemes, &self.espeak)?;
        if sentences.is_empty() {
            log::warn!("No phonemes produced for text: {text:?}");
            return Ok(Vec::new());
        }

        let mut audio = Vec::new();
        for sentence in &sentences {
            let ids = self.phonemes.encode(sentence);
            if ids.is_empty() {
                continue;
            }
            audio.extend(self.run_inference(&ids, length_scale)?);
        }
        Ok(audio)
    }

    fn run_inference(&mut self, ids: &[i64], length_scale: f32) -> Result<Vec<f32>, PiperError> {
        let input = Array2::from_shape_vec((1, ids.len()), ids.to_vec())?;
        let input_lengths = arr1(&[ids.len() as i64]);
        let scales = arr1(&[
            self.config.inference.noise_scale,
            length_scale,
            self.config.inference.noise_w,
        ]);

        let output = if self.has_sid {
            let sid = arr1(&[0i64]);
            let inputs = inputs![
                "input" => TensorRef::from_array_view(input.view())?,
                "input_lengths" => TensorRef::from_array_view(input_lengths.view())?,
                "scales" => TensorRef::from_array_view(scales.view())?,
                "sid" => TensorRef::from_array_view(sid.view())?,
            ];
            self.session.run(inputs)?
        } else {
            let inputs = inputs![
                "input" => TensorRef::from_array_view(input.view())?,
                "input_lengths" => TensorRef::from_array_view(input_lengths.view())?,
                "scales" => TensorRef::from_array_view(scales.view())?,
            ];
            self.session.run(inputs)?
        };

        let first_output = output
            .iter()
            .next()
            .ok_or_else(|| PiperError::Ort(ort::Error::new("No output from model")))?;
        let waveform = first_output.1.try_extract_array::<f32>()?;

        Ok(waveform.iter().copied().collect())
    }
}

impl ValueSynthesis for PiperVoice {
    fn synthesize(
        &mut self,
        text: &str,
        length_scale: f32,
    ) -> Result<SynthesizedAudio, ModelError> {
        let samples = self.synthesize_text(text, length_scale)?;
        Ok(SynthesizedAudio::Samples {
            samples,
            sample_rate: self.sample_rate(),
        })
    }
}

impl SpeechModel for PiperVoice {
    fn as_value_synthesis(&mut self) -> Option<&mut dyn ValueSynthesis> {
        Some(self)
    }
}

fn init_session(onnx_path: &Path, num_threads: Option<usize>) -> Result<Session, PiperError> {
    let providers = vec![CPUExecutionProvider::default().build()];

    let mut builder = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_execution_providers(providers)?
        .with_parallel_execution(true)?;

    if let Some(threads) = num_threads {
        builder = builder
            .with_intra_threads(threads)?
            .with_inter_threads(threads)?;
    }

    Ok(builder.commit_from_file(onnx_path)?)
}

/// Multi-speaker exports take a `sid` input even when the config omits `num_speakers`.
fn detect_sid_input(session: &Session) -> bool {
    for input in session.inputs() {
        if input.name() == "sid" {
            return true;
        }
    }
    false
}
