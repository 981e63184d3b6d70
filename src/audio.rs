use std::io::{BufWriter, Seek, Write};
use std::path::Path;

/// Sample encoding used when writing WAV files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WavEncoding {
    /// 16-bit signed PCM, the native Piper output format.
    #[default]
    Pcm16,
    /// 32-bit IEEE float.
    Float32,
}

/// A block of decoded audio.
///
/// Samples are interleaved when `channels > 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Samples in the range `-1.0..=1.0`
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels, at least 1
    pub channels: u16,
}

impl AudioChunk {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels: channels.max(1),
        }
    }

    /// A block of zeroed samples lasting `millis` at the given rate.
    ///
    /// Returns `None` when the duration resolves to zero frames.
    pub fn silence(sample_rate: u32, channels: u16, millis: u64) -> Option<Self> {
        let frames = silence_frames(sample_rate, millis);
        if frames == 0 {
            return None;
        }
        let channels = channels.max(1);
        Some(Self::new(
            vec![0.0; frames * channels as usize],
            sample_rate,
            channels,
        ))
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Read a WAV file, normalising integer PCM to floats.
    pub fn read_wav(path: &Path) -> Result<Self, hound::Error> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        let samples = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(Self::new(samples, spec.sample_rate, spec.channels))
    }

    /// Write the audio to a WAV file at `path`.
    pub fn write_wav(&self, path: &Path, encoding: WavEncoding) -> Result<(), hound::Error> {
        let file = std::fs::File::create(path)?;
        self.write_wav_to(file, encoding)
    }

    /// Write the audio as WAV into any seekable writer.
    pub fn write_wav_to<W: Write + Seek>(
        &self,
        writer: W,
        encoding: WavEncoding,
    ) -> Result<(), hound::Error> {
        let spec = match encoding {
            WavEncoding::Pcm16 => hound::WavSpec {
                channels: self.channels,
                sample_rate: self.sample_rate,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            },
            WavEncoding::Float32 => hound::WavSpec {
                channels: self.channels,
                sample_rate: self.sample_rate,
                bits_per_sample: 32,
                sample_format: hound::SampleFormat::Float,
            },
        };
        let mut writer = hound::WavWriter::new(BufWriter::new(writer), spec)?;
        match encoding {
            WavEncoding::Pcm16 => {
                for &sample in &self.samples {
                    let scaled = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                    writer.write_sample(scaled)?;
                }
            }
            WavEncoding::Float32 => {
                for &sample in &self.samples {
                    writer.write_sample(sample)?;
                }
            }
        }
        writer.finalize()?;
        Ok(())
    }
}

/// Number of frames covering `millis` at `sample_rate`, rounded to nearest.
pub fn silence_frames(sample_rate: u32, millis: u64) -> usize {
    (sample_rate as f64 * millis as f64 / 1000.0).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_rounds_to_nearest_frame() {
        assert_eq!(silence_frames(22050, 300), 6615);
        assert_eq!(silence_frames(22050, 1), 22);
        assert_eq!(silence_frames(16000, 0), 0);
    }

    #[test]
    fn silence_covers_every_channel() {
        let chunk = AudioChunk::silence(8000, 2, 250).expect("non-empty silence");
        assert_eq!(chunk.frames(), 2000);
        assert_eq!(chunk.samples.len(), 4000);
        assert!(chunk.samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn zero_frame_silence_is_skipped() {
        assert!(AudioChunk::silence(1000, 1, 0).is_none());
    }

    #[test]
    fn pcm16_file_reads_back_with_same_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let chunk = AudioChunk::new(vec![0.0, 0.5, -0.5, 0.25], 16000, 2);
        chunk.write_wav(&path, WavEncoding::Pcm16).unwrap();

        let read = AudioChunk::read_wav(&path).unwrap();
        assert_eq!(read.sample_rate, 16000);
        assert_eq!(read.channels, 2);
        assert_eq!(read.frames(), 2);
        assert!((read.samples[1] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn float_file_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let chunk = AudioChunk::new(vec![0.125, -0.75, 0.0], 24000, 1);
        chunk.write_wav(&path, WavEncoding::Float32).unwrap();
        assert_eq!(AudioChunk::read_wav(&path).unwrap(), chunk);
    }
}
