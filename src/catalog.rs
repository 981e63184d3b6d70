//! Voice catalog loading.
//!
//! The catalog is resolved from a JSON descriptor (`catalog.json` by default)
//! whose paths are relative to the model root:
//!
//! ```text
//! {"voices": [{"id": "es-mx-luisa", "name": "Luisa", "gender": "female",
//!              "accent": "Latin American", "quality": "Premium",
//!              "description": "...",
//!              "model": "luisa/es_MX-luisa.onnx",
//!              "config": "luisa/es_MX-luisa.onnx.json"}]}
//! ```
//!
//! When the descriptor is missing, malformed, or names no model that exists,
//! every immediate subdirectory of the model root is scanned instead and the
//! result is written back as a fresh descriptor.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const METADATA_FILES: [&str; 3] = ["metadata.json", "model.json", "voice.json"];
const MODEL_EXTENSION: &str = "onnx";

const DEFAULT_GENDER: &str = "other";
const DEFAULT_ACCENT: &str = "General";
const DEFAULT_QUALITY: &str = "Standard";
const DESCRIPTOR_DESCRIPTION: &str = "Voice model available";
const SCANNED_DESCRIPTION: &str = "Voice model detected automatically in the local model directory.";

/// Coarse gender grouping used by voice pickers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    /// Classify a free-form gender string by its first letter.
    pub fn classify(raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();
        if lower.starts_with('m') {
            Gender::Male
        } else if lower.starts_with('f') {
            Gender::Female
        } else {
            Gender::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

/// A configured voice and where its files live.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceInfo {
    pub id: String,
    pub name: String,
    pub gender: Gender,
    pub accent: String,
    pub quality: String,
    pub description: String,
    pub model_path: PathBuf,
    pub config_path: PathBuf,
}

/// The client-facing view of a voice, without filesystem paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSummary {
    pub id: String,
    pub name: String,
    pub gender: Gender,
    pub accent: String,
    pub quality: String,
    pub description: String,
}

impl VoiceInfo {
    pub fn summary(&self) -> VoiceSummary {
        VoiceSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            gender: self.gender,
            accent: self.accent.clone(),
            quality: self.quality.clone(),
            description: self.description.clone(),
        }
    }
}

/// Voices grouped for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenderedCatalog {
    pub male: Vec<VoiceSummary>,
    pub female: Vec<VoiceSummary>,
    pub other: Vec<VoiceSummary>,
}

/// Immutable mapping of voice id to [`VoiceInfo`].
///
/// A refresh builds a new `Catalog` and swaps it in whole.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    voices: HashMap<String, VoiceInfo>,
}

impl Catalog {
    pub fn from_voices(voices: impl IntoIterator<Item = VoiceInfo>) -> Self {
        Self {
            voices: voices.into_iter().map(|v| (v.id.clone(), v)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&VoiceInfo> {
        self.voices.get(id)
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn voices(&self) -> impl Iterator<Item = &VoiceInfo> {
        self.voices.values()
    }

    /// Group public voice fields by gender, each group sorted by id.
    pub fn by_gender(&self) -> GenderedCatalog {
        let mut grouped = GenderedCatalog::default();
        for voice in self.voices.values() {
            let target = match voice.gender {
                Gender::Male => &mut grouped.male,
                Gender::Female => &mut grouped.female,
                Gender::Other => &mut grouped.other,
            };
            target.push(voice.summary());
        }
        for group in [&mut grouped.male, &mut grouped.female, &mut grouped.other] {
            group.sort_by(|a, b| a.id.cmp(&b.id));
        }
        grouped
    }
}

/// One entry of the on-disk catalog descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescriptorEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub config: String,
}

#[derive(Debug, Serialize)]
struct Descriptor<'a> {
    voices: &'a [DescriptorEntry],
}

/// A descriptor entry whose files are not on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingVoice {
    pub id: String,
    pub model: String,
    pub config: String,
    pub issues: Vec<String>,
}

/// Builds [`Catalog`]s from a model root and its descriptor file.
#[derive(Debug, Clone)]
pub struct CatalogLoader {
    models_dir: PathBuf,
    descriptor_path: PathBuf,
}

impl CatalogLoader {
    pub fn new(models_dir: impl Into<PathBuf>, descriptor_path: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
            descriptor_path: descriptor_path.into(),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Resolve the catalog. Never fails: I/O and parse problems degrade to a
    /// smaller (possibly empty) catalog.
    pub fn load(&self) -> Catalog {
        let from_descriptor: Vec<VoiceInfo> = self
            .read_descriptor()
            .unwrap_or_default()
            .iter()
            .filter_map(|entry| self.resolve_entry(entry))
            .collect();

        if !from_descriptor.is_empty() {
            log::info!(
                "Loaded {} voices from {}",
                from_descriptor.len(),
                self.descriptor_path.display()
            );
            return Catalog::from_voices(from_descriptor);
        }

        let scanned = self.scan_directories();
        if !scanned.is_empty() {
            log::info!(
                "Rebuilt catalog with {} voices from {}",
                scanned.len(),
                self.models_dir.display()
            );
            if let Err(e) = self.persist(&scanned) {
                log::warn!(
                    "Could not write rebuilt catalog to {}: {e}",
                    self.descriptor_path.display()
                );
            }
        } else {
            log::warn!("No voices found under {}", self.models_dir.display());
        }
        Catalog::from_voices(scanned)
    }

    /// Report every descriptor entry whose model or config file is absent.
    ///
    /// Reads the raw descriptor, not the resolved catalog.
    pub fn missing_voices(&self) -> Vec<MissingVoice> {
        let mut missing = Vec::new();
        for entry in self.read_descriptor().unwrap_or_default() {
            let model_path = self.models_dir.join(&entry.model);
            let config_path = self.models_dir.join(&entry.config);

            let mut issues = Vec::new();
            if !model_path.is_file() {
                issues.push(format!("Missing model file {}", display_name(&model_path)));
            }
            if !config_path.is_file() {
                issues.push(format!("Missing config file {}", display_name(&config_path)));
            }
            if issues.is_empty() {
                continue;
            }

            missing.push(MissingVoice {
                id: entry
                    .id
                    .clone()
                    .or_else(|| entry.name.clone())
                    .unwrap_or_else(|| file_stem(&model_path)),
                model: entry.model,
                config: entry.config,
                issues,
            });
        }
        missing
    }

    /// Parse the descriptor, skipping entries that are not JSON objects.
    fn read_descriptor(&self) -> Option<Vec<DescriptorEntry>> {
        let content = fs::read_to_string(&self.descriptor_path).ok()?;
        let raw: serde_json::Value = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!(
                    "Ignoring malformed catalog {}: {e}",
                    self.descriptor_path.display()
                );
                return None;
            }
        };
        let entries = raw.get("voices")?.as_array()?;
        Some(
            entries
                .iter()
                .filter_map(|v| serde_json::from_value::<DescriptorEntry>(v.clone()).ok())
                .collect(),
        )
    }

    fn resolve_entry(&self, entry: &DescriptorEntry) -> Option<VoiceInfo> {
        let model_path = self.models_dir.join(&entry.model);
        if !model_path.is_file() {
            log::debug!("Skipping catalog entry, model not found: {}", model_path.display());
            return None;
        }
        let config_path = self.models_dir.join(&entry.config);
        let config_path = if config_path.is_file() {
            config_path
        } else {
            sibling_config(&model_path)
        };
        let stem = file_stem(&model_path);

        Some(VoiceInfo {
            id: non_empty(&entry.id)
                .or_else(|| non_empty(&entry.name))
                .unwrap_or_else(|| stem.clone()),
            name: non_empty(&entry.name).unwrap_or(stem),
            gender: Gender::classify(entry.gender.as_deref().unwrap_or(DEFAULT_GENDER)),
            accent: non_empty(&entry.accent).unwrap_or_else(|| DEFAULT_ACCENT.to_string()),
            quality: non_empty(&entry.quality).unwrap_or_else(|| DEFAULT_QUALITY.to_string()),
            description: non_empty(&entry.description)
                .unwrap_or_else(|| DESCRIPTOR_DESCRIPTION.to_string()),
            model_path,
            config_path,
        })
    }

    fn scan_directories(&self) -> Vec<VoiceInfo> {
        let Ok(entries) = fs::read_dir(&self.models_dir) else {
            return Vec::new();
        };
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();

        dirs.iter().filter_map(|dir| scan_voice_dir(dir)).collect()
    }

    fn persist(&self, voices: &[VoiceInfo]) -> std::io::Result<()> {
        let entries: Vec<DescriptorEntry> = voices
            .iter()
            .map(|v| DescriptorEntry {
                id: Some(v.id.clone()),
                name: Some(v.name.clone()),
                gender: Some(v.gender.as_str().to_string()),
                accent: Some(v.accent.clone()),
                quality: Some(v.quality.clone()),
                description: Some(v.description.clone()),
                model: self.relative(&v.model_path),
                config: self.relative(&v.config_path),
            })
            .collect();
        let json = serde_json::to_string_pretty(&Descriptor { voices: &entries })
            .map_err(std::io::Error::other)?;
        fs::write(&self.descriptor_path, json)
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.models_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }
}

/// Build a voice from one model subdirectory, or `None` if it has no model.
fn scan_voice_dir(dir: &Path) -> Option<VoiceInfo> {
    let metadata = read_metadata(dir);
    let files = sorted_files(dir);

    let model_path = files
        .iter()
        .find(|p| p.extension().and_then(|e| e.to_str()) == Some(MODEL_EXTENSION))?
        .clone();
    let config_path = pick_config(&model_path, &files);

    let dir_name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let field = |key: &str| -> Option<String> {
        metadata
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Some(VoiceInfo {
        id: field("id")
            .or_else(|| field("name"))
            .unwrap_or_else(|| dir_name.clone()),
        name: field("name").unwrap_or_else(|| title_case(&dir_name)),
        gender: Gender::classify(&field("gender").unwrap_or_else(|| DEFAULT_GENDER.to_string())),
        accent: field("accent")
            .or_else(|| field("language"))
            .unwrap_or_else(|| DEFAULT_ACCENT.to_string()),
        quality: field("quality").unwrap_or_else(|| DEFAULT_QUALITY.to_string()),
        description: field("description").unwrap_or_else(|| SCANNED_DESCRIPTION.to_string()),
        model_path,
        config_path,
    })
}

/// First metadata file (in priority order) that parses as a JSON object.
fn read_metadata(dir: &Path) -> serde_json::Map<String, serde_json::Value> {
    for name in METADATA_FILES {
        let path = dir.join(name);
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(serde_json::Value::Object(map)) => return map,
            _ => log::debug!("Ignoring unreadable metadata {}", path.display()),
        }
    }
    serde_json::Map::new()
}

fn sorted_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect()
        })
        .unwrap_or_default();
    files.sort();
    files
}

/// Config matching the model's base name, else the first JSON file, else
/// `<model>.json`. `*.onnx.json` files are preferred over other JSON files.
fn pick_config(model_path: &Path, files: &[PathBuf]) -> PathBuf {
    let is_metadata = |p: &Path| {
        p.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| METADATA_FILES.contains(&n))
    };
    let mut candidates: Vec<&PathBuf> = files
        .iter()
        .filter(|p| {
            p.extension().and_then(|e| e.to_str()) == Some("json") && !is_metadata(p.as_path())
        })
        .collect();
    candidates.sort_by_key(|p| !p.to_string_lossy().ends_with(".onnx.json"));

    let model_stem = file_stem(model_path);
    candidates
        .iter()
        .find(|p| file_stem(p).starts_with(&model_stem))
        .or_else(|| candidates.first())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| sibling_config(model_path))
}

/// `voice.onnx` -> `voice.onnx.json`
fn sibling_config(model_path: &Path) -> PathBuf {
    let mut name = model_path.as_os_str().to_os_string();
    name.push(".json");
    PathBuf::from(name)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.is_empty()).cloned()
}

/// `es_mx_junior` -> `Es Mx Junior`
fn title_case(raw: &str) -> String {
    raw.replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
