// Integration tests for audio file processing
//
// These tests verify that we can read WAV files and extract audio data correctly.

use anyhow::Result;
use celpip_practice::audio::AudioFile;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_fixture(
    dir: &Path,
    name: &str,
    seconds: f64,
    sample_rate: u32,
    channels: u16,
) -> Result<PathBuf> {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec)?;
    let frames = (seconds * sample_rate as f64) as usize;
    for i in 0..frames {
        let left = (i % 1000) as i16;
        writer.write_sample(left)?;
        if channels == 2 {
            writer.write_sample(-left)?;
        }
    }
    writer.finalize()?;
    Ok(path)
}

#[test]
fn test_audio_file_open() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_fixture(dir.path(), "task1-answer.wav", 2.0, 16000, 1)?;

    let audio = AudioFile::open(&path)?;

    assert!((audio.duration_seconds - 2.0).abs() < 0.001);
    assert_eq!(audio.sample_rate, 16000);
    assert_eq!(audio.channels, 1);
    assert_eq!(audio.samples.len(), 32000);

    // Verify path is stored
    assert!(audio.path.contains("task1-answer.wav"));

    Ok(())
}

#[test]
fn test_audio_file_nonexistent() {
    let path = PathBuf::from("/nonexistent/path/to/audio.wav");
    let result = AudioFile::open(&path);

    assert!(result.is_err(), "Opening nonexistent file should fail");
}

#[test]
fn test_audio_file_rejects_non_wav() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("notes.wav");
    std::fs::write(&path, b"not really audio")?;

    assert!(AudioFile::open(&path).is_err());
    Ok(())
}

#[test]
fn test_stereo_to_mono_averages_channels() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_fixture(dir.path(), "stereo.wav", 0.5, 8000, 2)?;
    let audio = AudioFile::open(&path)?;

    assert_eq!(audio.channels, 2);
    assert_eq!(audio.samples.len() % audio.channels as usize, 0);

    let mono = audio.to_mono();
    assert_eq!(mono.len(), 4000);
    // Left and right cancel out
    assert!(mono.iter().all(|&s| s == 0));

    Ok(())
}

#[test]
fn test_frames_cover_the_whole_file() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_fixture(dir.path(), "short.wav", 0.25, 16000, 1)?;
    let audio = AudioFile::open(&path)?;

    let frames = audio.frames(100, true);
    assert_eq!(frames.len(), 3, "two full frames and a 50ms remainder");
    assert_eq!(frames[2].samples.len(), 800);
    assert_eq!(frames[2].timestamp_ms, 200);

    let total: usize = frames.iter().map(|f| f.samples.len()).sum();
    assert_eq!(total, audio.samples.len());

    Ok(())
}

#[test]
fn test_decimate_keeps_whole_frames() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_fixture(dir.path(), "stereo.wav", 0.5, 8000, 2)?;
    let audio = AudioFile::open(&path)?.decimate(2);

    assert_eq!(audio.sample_rate, 4000);
    assert_eq!(audio.channels, 2);
    assert_eq!(audio.samples.len(), 4000);
    assert!((audio.duration_seconds - 0.5).abs() < 1e-9);
    // Channel pairs stay aligned after dropping frames
    assert!(audio.samples.chunks_exact(2).all(|pair| pair[0] == -pair[1]));

    let unchanged = AudioFile::open(&path)?.decimate(1);
    assert_eq!(unchanged.sample_rate, 8000);

    Ok(())
}
