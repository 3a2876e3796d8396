// Unit tests for audio backend abstractions
//
// These tests verify the core audio types and the file-replay backend.

use anyhow::Result;
use celpip_practice::audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource, FileBackend,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn write_fixture(dir: &Path, frames: usize, sample_rate: u32, channels: u16) -> Result<PathBuf> {
    let path = dir.join("fixture.wav");
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec)?;
    for i in 0..frames {
        for c in 0..channels {
            writer.write_sample((i as i16).wrapping_mul(3).wrapping_add(c as i16))?;
        }
    }
    writer.finalize()?;
    Ok(path)
}

#[test]
fn test_audio_frame_timing_calculation() {
    let frame = AudioFrame {
        samples: vec![0i16; 1600], // 100ms at 16kHz
        sample_rate: 16000,
        channels: 1,
        timestamp_ms: 0,
    };

    assert!((frame.duration_secs() - 0.1).abs() < 0.001, "Duration should be 100ms");
}

#[test]
fn test_audio_frame_stereo_interleaved() {
    // Stereo audio: samples are interleaved [L, R, L, R, ...]
    let frame = AudioFrame {
        samples: vec![100, 200, 150, 250, 175, 275],
        sample_rate: 3,
        channels: 2,
        timestamp_ms: 0,
    };

    assert!((frame.duration_secs() - 1.0).abs() < f64::EPSILON);
}

#[test]
fn test_audio_frame_without_format_has_no_duration() {
    let frame = AudioFrame {
        samples: vec![1, 2, 3],
        sample_rate: 0,
        channels: 1,
        timestamp_ms: 0,
    };

    assert_eq!(frame.duration_secs(), 0.0);
}

#[test]
fn test_audio_backend_config_default() {
    let config = AudioBackendConfig::default();

    assert_eq!(config.target_sample_rate, 16000, "Default should be 16kHz speech");
    assert_eq!(config.target_channels, 1, "Default should be mono");
    assert_eq!(config.buffer_duration_ms, 100, "Default buffer should be 100ms");
}

#[test]
fn test_audio_source_parsing() {
    assert_eq!(AudioSource::parse("microphone"), AudioSource::Microphone);
    assert_eq!(AudioSource::parse(" mic "), AudioSource::Microphone);
    assert_eq!(AudioSource::parse(""), AudioSource::Microphone);
    assert_eq!(
        AudioSource::parse("answers/task1.wav"),
        AudioSource::File(PathBuf::from("answers/task1.wav"))
    );
}

#[tokio::test]
async fn test_file_backend_emits_all_frames_then_closes() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_fixture(dir.path(), 16000, 16000, 1)?;

    let mut backend = FileBackend::new(&path, AudioBackendConfig::default()).with_realtime(false);
    let mut rx = backend.start().await?;

    let mut frames = Vec::new();
    while let Some(frame) = rx.recv().await {
        frames.push(frame);
    }

    assert_eq!(frames.len(), 10);
    assert!(frames.iter().all(|f| f.samples.len() == 1600));
    assert_eq!(frames[3].timestamp_ms, 300);

    backend.stop().await?;
    assert!(!backend.is_capturing());

    Ok(())
}

#[tokio::test]
async fn test_file_backend_downmixes_to_target_channels() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_fixture(dir.path(), 800, 8000, 2)?;

    let mut backend = FileBackend::new(&path, AudioBackendConfig::default()).with_realtime(false);
    let mut rx = backend.start().await?;

    let frame = rx.recv().await.expect("first frame");
    assert_eq!(frame.channels, 1);
    assert_eq!(frame.sample_rate, 8000);
    assert_eq!(frame.samples.len(), 800);
    // Left is 3i, right is 3i + 1; the average truncates to 3i
    assert_eq!(frame.samples[10], 30);

    backend.stop().await?;
    Ok(())
}

#[test]
fn test_decimation_factor_follows_target_rate() {
    let config = AudioBackendConfig::default();
    assert_eq!(config.decimation_factor(48000), 3);
    assert_eq!(config.decimation_factor(44100), 2);
    assert_eq!(config.decimation_factor(16000), 1);
    assert_eq!(config.decimation_factor(8000), 1, "never upsample");

    let unset = AudioBackendConfig {
        target_sample_rate: 0,
        ..AudioBackendConfig::default()
    };
    assert_eq!(unset.decimation_factor(48000), 1);
}

#[tokio::test]
async fn test_file_backend_decimates_to_target_rate() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_fixture(dir.path(), 48000, 48000, 1)?;

    let mut backend = FileBackend::new(&path, AudioBackendConfig::default()).with_realtime(false);
    let mut rx = backend.start().await?;

    let mut frames = Vec::new();
    while let Some(frame) = rx.recv().await {
        frames.push(frame);
    }

    assert!(frames.iter().all(|f| f.sample_rate == 16000));
    assert_eq!(frames.iter().map(|f| f.samples.len()).sum::<usize>(), 16000);
    assert_eq!(frames.len(), 10);
    // Every third source frame survives
    assert_eq!(frames[0].samples[1], 9);

    backend.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_realtime_file_backend_stops_early() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_fixture(dir.path(), 16000 * 10, 16000, 1)?;

    let mut backend = FileBackend::new(&path, AudioBackendConfig::default());
    let mut rx = backend.start().await?;
    assert!(backend.is_capturing());
    assert!(backend.start().await.is_err(), "second start is refused");

    tokio::time::sleep(Duration::from_millis(250)).await;
    backend.stop().await?;

    let mut received = 0;
    while rx.recv().await.is_some() {
        received += 1;
    }
    assert!((1..10).contains(&received), "received {received} frames");

    Ok(())
}

#[tokio::test]
async fn test_factory_creates_file_backend() -> Result<()> {
    let backend = AudioBackendFactory::create(
        AudioSource::File(PathBuf::from("answer.wav")),
        AudioBackendConfig::default(),
    )?;
    assert_eq!(backend.name(), "file");
    assert!(!backend.is_capturing());
    Ok(())
}

#[cfg(not(feature = "microphone"))]
#[test]
fn test_factory_reports_missing_microphone_support() {
    let result = AudioBackendFactory::create(AudioSource::Microphone, AudioBackendConfig::default());
    assert!(result.is_err());
}
