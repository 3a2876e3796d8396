use anyhow::{Context, Result};
use std::io::Cursor;

use super::backend::AudioFrame;

/// In-memory WAV writer accumulating 16-bit PCM frames
///
/// The format is fixed by the first frame written.
#[derive(Debug, Default)]
pub struct WavBuffer {
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
}

impl WavBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_frame(&mut self, frame: &AudioFrame) {
        if self.samples.is_empty() && self.sample_rate == 0 {
            self.sample_rate = frame.sample_rate;
            self.channels = frame.channels;
        }
        self.samples.extend_from_slice(&frame.samples);
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Measured duration: samples / (sample_rate * channels)
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }

    /// Encode the collected samples as a complete WAV file
    pub fn finish(self) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: self.channels.max(1),
            sample_rate: if self.sample_rate == 0 { 16000 } else { self.sample_rate },
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer =
                hound::WavWriter::new(&mut cursor, spec).context("Failed to create WAV writer")?;
            for &sample in &self.samples {
                writer.write_sample(sample).context("Failed to write sample to WAV")?;
            }
            writer.finalize().context("Failed to finalize WAV data")?;
        }

        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(len: usize, timestamp_ms: u64) -> AudioFrame {
        AudioFrame {
            samples: vec![100; len],
            sample_rate: 16000,
            channels: 1,
            timestamp_ms,
        }
    }

    #[test]
    fn test_duration_from_sample_count() {
        let mut buffer = WavBuffer::new();
        for i in 0..15 {
            buffer.write_frame(&frame(1600, i * 100));
        }

        assert_eq!(buffer.sample_count(), 24000);
        assert!((buffer.duration_secs() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_buffer_has_zero_duration() {
        let buffer = WavBuffer::new();
        assert_eq!(buffer.duration_secs(), 0.0);
    }

    #[test]
    fn test_finish_produces_readable_wav() -> Result<()> {
        let mut buffer = WavBuffer::new();
        buffer.write_frame(&frame(1600, 0));

        let bytes = buffer.finish()?;
        assert_eq!(&bytes[0..4], b"RIFF");

        let reader = hound::WavReader::new(Cursor::new(bytes))?;
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len(), 1600);
        Ok(())
    }
}
