#![allow(dead_code)]

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use tts_serve::{
    AudioChunk, EngineConfig, FileSynthesis, ModelError, ModelLoader, ModelSync, SpeechModel,
    SyncError, SynthesizedAudio, TtsEngine, ValueSynthesis, VoiceInfo, WavEncoding,
};

pub const RATE: u32 = 1000;
pub const LUISA_CONFIG: &str = "{\"audio\": {\"sample_rate\": 1000}}\n";

/// Which call contract the fake models expose.
#[derive(Debug, Clone, Copy)]
pub enum Contract {
    File,
    Value,
}

/// Renders `text.len() * 10` frames of constant audio.
pub struct FakeModel {
    contract: Contract,
    rates: HashMap<String, u32>,
}

impl FakeModel {
    fn chunk(&self, text: &str) -> AudioChunk {
        let rate = self.rates.get(text).copied().unwrap_or(RATE);
        AudioChunk::new(vec![0.5; text.len() * 10], rate, 1)
    }
}

impl FileSynthesis for FakeModel {
    fn synthesize_into(
        &mut self,
        text: &str,
        _length_scale: f32,
        out: &mut File,
    ) -> Result<(), ModelError> {
        self.chunk(text).write_wav_to(out, WavEncoding::Pcm16)?;
        Ok(())
    }
}

impl ValueSynthesis for FakeModel {
    fn synthesize(
        &mut self,
        text: &str,
        _length_scale: f32,
    ) -> Result<SynthesizedAudio, ModelError> {
        let chunk = self.chunk(text);
        Ok(SynthesizedAudio::Samples {
            samples: chunk.samples,
            sample_rate: chunk.sample_rate,
        })
    }
}

impl SpeechModel for FakeModel {
    fn as_file_synthesis(&mut self) -> Option<&mut dyn FileSynthesis> {
        match self.contract {
            Contract::File => Some(self),
            Contract::Value => None,
        }
    }

    fn as_value_synthesis(&mut self) -> Option<&mut dyn ValueSynthesis> {
        match self.contract {
            Contract::Value => Some(self),
            Contract::File => None,
        }
    }
}

/// Counts constructions and fails the first `failures` of them.
#[derive(Clone)]
pub struct FakeLoader {
    pub loads: Arc<AtomicUsize>,
    failures: usize,
    contract: Contract,
    rates: HashMap<String, u32>,
}

impl FakeLoader {
    pub fn new(contract: Contract) -> Self {
        Self {
            loads: Arc::new(AtomicUsize::new(0)),
            failures: 0,
            contract,
            rates: HashMap::new(),
        }
    }

    pub fn failing(mut self, failures: usize) -> Self {
        self.failures = failures;
        self
    }

    pub fn with_rate(mut self, text: &str, rate: u32) -> Self {
        self.rates.insert(text.to_string(), rate);
        self
    }
}

impl ModelLoader for FakeLoader {
    fn load(&self, _voice: &VoiceInfo) -> Result<Box<dyn SpeechModel>, ModelError> {
        let attempt = self.loads.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(ModelError::Message("corrupt model header".into()));
        }
        Ok(Box::new(FakeModel {
            contract: self.contract,
            rates: self.rates.clone(),
        }))
    }
}

pub struct FakeSync {
    pub calls: Arc<AtomicUsize>,
    outcome: Result<String, String>,
}

impl FakeSync {
    pub fn ok() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            outcome: Ok("2 files updated".into()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            outcome: Err(message.into()),
        }
    }
}

impl ModelSync for FakeSync {
    fn resync(&self) -> Result<String, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone().map_err(SyncError)
    }
}

/// A model root with two voices and a descriptor naming a third, absent one.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let models = dir.path().join("models");

        write(&models.join("luisa/es_MX-luisa.onnx"), "onnx");
        write(&models.join("luisa/es_MX-luisa.onnx.json"), LUISA_CONFIG);
        write(&models.join("carlos/es_MX-carlos.onnx"), "onnx");
        write(
            &models.join("carlos/es_MX-carlos.onnx.json"),
            "{\"audio\": {\"sample_rate\": 1000}}\n",
        );

        let descriptor = json!({"voices": [
            {"id": "luisa", "name": "Luisa", "gender": "female", "accent": "Mexican",
             "model": "luisa/es_MX-luisa.onnx", "config": "luisa/es_MX-luisa.onnx.json"},
            {"id": "carlos", "name": "Carlos", "gender": "male",
             "model": "carlos/es_MX-carlos.onnx", "config": "carlos/es_MX-carlos.onnx.json"},
            {"id": "pedro", "name": "Pedro", "gender": "male",
             "model": "pedro/es_MX-pedro.onnx", "config": "pedro/es_MX-pedro.onnx.json"},
        ]});
        write(&models.join("catalog.json"), &descriptor.to_string());

        Self { dir }
    }

    pub fn models(&self) -> PathBuf {
        self.dir.path().join("models")
    }

    pub fn outputs(&self) -> PathBuf {
        self.dir.path().join("outputs")
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig::new(self.models(), self.outputs())
    }

    pub fn engine(&self, loader: FakeLoader, sync: FakeSync) -> TtsEngine {
        TtsEngine::new(self.config(), loader, sync).unwrap()
    }

    pub fn output_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(self.outputs())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        files.sort();
        files
    }
}

pub fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}
