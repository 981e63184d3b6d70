//! Turning a segment list into one audio stream.

use std::fs;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::audio::{silence_frames, AudioChunk, WavEncoding};
use crate::error::TtsError;
use crate::render::CapabilityHandle;
use crate::segment::Segment;

/// Audio format hints read from a voice's config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioHints {
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

impl AudioHints {
    /// Read `audio.sample_rate` (or `sampleRate`, also at the top level) and
    /// `audio.num_channels` (or `channels`). Unreadable configs give no hints.
    pub fn from_config(path: &Path) -> Self {
        let Some(json) = fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
        else {
            return Self::default();
        };
        let audio = json.get("audio");
        let positive = |v: Option<&serde_json::Value>| -> Option<u64> {
            let v = v?;
            v.as_u64()
                .or_else(|| v.as_f64().filter(|f| *f >= 1.0).map(|f| f as u64))
                .filter(|n| *n > 0)
        };

        let sample_rate = ["sample_rate", "sampleRate"]
            .iter()
            .find_map(|key| positive(audio.and_then(|a| a.get(*key))))
            .or_else(|| {
                ["sample_rate", "sampleRate"]
                    .iter()
                    .find_map(|key| positive(json.get(*key)))
            })
            .and_then(|n| u32::try_from(n).ok());
        let channels = ["num_channels", "channels"]
            .iter()
            .find_map(|key| audio.and_then(|a| a.get(*key)).and_then(|v| v.as_u64()))
            .filter(|n| *n > 0)
            .and_then(|n| u16::try_from(n).ok());

        Self {
            sample_rate,
            channels,
        }
    }
}

enum Piece {
    Speech(AudioChunk),
    Silence(usize),
}

/// Renders segments in order and concatenates them.
#[derive(Debug, Clone)]
pub struct Assembler<'a> {
    work_dir: &'a Path,
    max_pause_ms: u64,
}

impl<'a> Assembler<'a> {
    /// `work_dir` receives the per-segment temporary files.
    pub fn new(work_dir: &'a Path, max_pause_ms: u64) -> Self {
        Self {
            work_dir,
            max_pause_ms,
        }
    }

    /// Render every segment and join the results.
    ///
    /// All speech must share one sample rate and channel count; segments are
    /// never resampled. Pauses before the sample rate is known are skipped.
    pub fn assemble(
        &self,
        handle: &mut CapabilityHandle,
        segments: &[Segment],
        length_scale: f32,
        hints: AudioHints,
    ) -> Result<AudioChunk, TtsError> {
        let mut sample_rate = hints.sample_rate;
        let mut channels: Option<u16> = None;
        let mut pieces = Vec::with_capacity(segments.len());

        for segment in segments {
            match segment {
                Segment::Pause(millis) => {
                    let Some(rate) = sample_rate else {
                        log::debug!("Skipping {millis}ms pause before the sample rate is known");
                        continue;
                    };
                    let millis = if *millis > self.max_pause_ms {
                        log::warn!("Clamping {millis}ms pause to {}ms", self.max_pause_ms);
                        self.max_pause_ms
                    } else {
                        *millis
                    };
                    let frames = silence_frames(rate, millis);
                    if frames > 0 {
                        pieces.push(Piece::Silence(frames));
                    }
                }
                Segment::Text(text) => {
                    // The temp part is removed as soon as it has been read back.
                    let chunk = handle.render(text, length_scale, self.work_dir)?.chunk;

                    match sample_rate {
                        None => sample_rate = Some(chunk.sample_rate),
                        Some(rate) if rate != chunk.sample_rate => {
                            return Err(TtsError::synthesis(format!(
                                "inconsistent sample rates ({rate} Hz vs {} Hz), cannot concatenate",
                                chunk.sample_rate
                            )));
                        }
                        Some(_) => {}
                    }
                    match channels {
                        None => channels = Some(chunk.channels),
                        Some(n) if n != chunk.channels => {
                            return Err(TtsError::synthesis(format!(
                                "inconsistent channel counts ({n} vs {}), cannot concatenate",
                                chunk.channels
                            )));
                        }
                        Some(_) => {}
                    }
                    pieces.push(Piece::Speech(chunk));
                }
            }
        }

        if pieces.is_empty() {
            return Err(TtsError::synthesis("the text has no synthesizable content"));
        }
        let Some(sample_rate) = sample_rate else {
            return Err(TtsError::synthesis(
                "could not determine the sample rate of the output",
            ));
        };
        let channels = channels.or(hints.channels).unwrap_or(1).max(1);

        let total: usize = pieces
            .iter()
            .map(|p| match p {
                Piece::Speech(chunk) => chunk.samples.len(),
                Piece::Silence(frames) => frames * channels as usize,
            })
            .sum();
        let mut samples = Vec::with_capacity(total);
        for piece in pieces {
            match piece {
                Piece::Speech(chunk) => samples.extend_from_slice(&chunk.samples),
                Piece::Silence(frames) => {
                    samples.resize(samples.len() + frames * channels as usize, 0.0)
                }
            }
        }

        Ok(AudioChunk::new(samples, sample_rate, channels))
    }
}

/// Write `chunk` to `target` through a temporary file in the same directory,
/// so a failed write never leaves a partial output behind.
pub fn write_output(
    chunk: &AudioChunk,
    target: &Path,
    encoding: WavEncoding,
) -> Result<(), TtsError> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let mut file = tempfile::Builder::new()
        .prefix(".tts_")
        .suffix(".wav")
        .tempfile_in(dir)
        .map_err(|e| TtsError::synthesis(format!("could not create output file: {e}")))?;
    chunk
        .write_wav_to(file.as_file_mut(), encoding)
        .map_err(|e| TtsError::synthesis(format!("could not write output audio: {e}")))?;
    publish(file, target)
}

/// Mode given to finished output files; temp files start out owner-only.
#[cfg(unix)]
const OUTPUT_MODE: u32 = 0o644;

/// Rename a finished temp file onto `target` with regular file permissions.
pub(crate) fn publish(file: NamedTempFile, target: &Path) -> Result<(), TtsError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(fs::Permissions::from_mode(OUTPUT_MODE))
            .map_err(|e| TtsError::synthesis(format!("could not save output audio: {e}")))?;
    }
    file.persist(target)
        .map_err(|e| TtsError::synthesis(format!("could not save output audio: {}", e.error)))?;
    Ok(())
}
