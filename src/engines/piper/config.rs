use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::model::PiperError;

const BOS: char = '^';
const EOS: char = '$';
const PAD: char = '_';

fn default_espeak_voice() -> String {
    "en-us".to_string()
}

fn default_noise_scale() -> f32 {
    0.667
}

fn default_noise_w() -> f32 {
    0.8
}

fn default_num_speakers() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioSection {
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EspeakSection {
    #[serde(default = "default_espeak_voice")]
    pub voice: String,
}

impl Default for EspeakSection {
    fn default() -> Self {
        Self {
            voice: default_espeak_voice(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InferenceSection {
    #[serde(default = "default_noise_scale")]
    pub noise_scale: f32,
    #[serde(default = "default_noise_w")]
    pub noise_w: f32,
}

impl Default for InferenceSection {
    fn default() -> Self {
        Self {
            noise_scale: default_noise_scale(),
            noise_w: default_noise_w(),
        }
    }
}

/// The `<voice>.onnx.json` file shipped next to every Piper model.
#[derive(Debug, Clone, Deserialize)]
pub struct PiperConfig {
    pub audio: AudioSection,
    #[serde(default)]
    pub espeak: EspeakSection,
    #[serde(default)]
    pub inference: InferenceSection,
    pub phoneme_id_map: HashMap<String, Vec<i64>>,
    #[serde(default = "default_num_speakers")]
    pub num_speakers: u32,
}

impl PiperConfig {
    pub fn load(path: &Path) -> Result<Self, PiperError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| PiperError::Config(format!("{}: {e}", path.display())))
    }

    /// Phoneme map keyed by single characters. Multi-character keys are ignored.
    pub fn phoneme_map(&self) -> PhonemeIdMap {
        let ids = self
            .phoneme_id_map
            .iter()
            .filter_map(|(k, v)| {
                let mut chars = k.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => Some((ch, v.clone())),
                    _ => None,
                }
            })
            .collect();
        PhonemeIdMap { ids }
    }
}

/// Maps phoneme characters to model input ids.
#[derive(Debug, Clone, Default)]
pub struct PhonemeIdMap {
    ids: HashMap<char, Vec<i64>>,
}

impl PhonemeIdMap {
    pub fn contains(&self, ch: char) -> bool {
        self.ids.contains_key(&ch)
    }

    /// Encode one sentence: BOS, then each phoneme followed by PAD, then EOS.
    /// Phonemes missing from the map are dropped.
    pub fn encode(&self, phonemes: &[char]) -> Vec<i64> {
        let pad = self.ids.get(&PAD).map(Vec::as_slice).unwrap_or(&[]);
        let mut ids = Vec::with_capacity(phonemes.len() * 2 + 3);
        if let Some(bos) = self.ids.get(&BOS) {
            ids.extend_from_slice(bos);
            ids.extend_from_slice(pad);
        }
        for ph in phonemes {
            match self.ids.get(ph) {
                Some(mapped) => {
                    ids.extend_from_slice(mapped);
                    ids.extend_from_slice(pad);
                }
                None => log::debug!("Dropping unmapped phoneme {ph:?}"),
            }
        }
        if let Some(eos) = self.ids.get(&EOS) {
            ids.extend_from_slice(eos);
        }
        ids
    }
}
