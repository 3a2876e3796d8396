// Integration tests for spoken-response capture
//
// A WAV file replayed through `FileBackend` plays the part of the microphone.

use anyhow::Result;
use celpip_practice::api::{
    ApiError, CreateEvaluationRequest, EvaluationResult, EvaluationService, EvaluationSlot, Prompt,
    Question, Submission, SubmitReceipt,
};
use celpip_practice::audio::{AudioBackendConfig, AudioFile, FileBackend};
use celpip_practice::capture::{Artifact, CaptureAdapter, CaptureError, MicrophoneCapture};
use celpip_practice::session::{Clock, Phase, SessionConfig, SessionController};
use celpip_practice::OpenAccess;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn write_tone(dir: &Path, seconds: f64, sample_rate: u32, channels: u16) -> Result<PathBuf> {
    let path = dir.join("answer.wav");
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(&path, spec)?;
    let frames = (seconds * sample_rate as f64) as usize;
    for i in 0..frames {
        let t = i as f64 / sample_rate as f64;
        let sample = ((t * 440.0 * std::f64::consts::TAU).sin() * 8000.0) as i16;
        for _ in 0..channels {
            writer.write_sample(sample)?;
        }
    }
    writer.finalize()?;

    Ok(path)
}

fn file_capture(path: &Path) -> MicrophoneCapture {
    let backend = FileBackend::new(path, AudioBackendConfig::default()).with_realtime(false);
    MicrophoneCapture::new(Box::new(backend))
}

/// Let the replay task deliver every frame
async fn drain() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_capture_produces_wav_with_measured_duration() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_tone(dir.path(), 1.5, 16000, 1)?;
    let mut capture = file_capture(&path);

    capture.acquire().await?;
    drain().await;
    capture.release();

    let artifact = capture.finalize().await?;
    let Artifact::Audio(audio) = artifact else {
        panic!("expected audio");
    };

    assert_eq!(audio.mime_type, "audio/wav");
    assert!((audio.duration_secs - 1.5).abs() < 0.01);

    let reader = hound::WavReader::new(Cursor::new(audio.bytes))?;
    assert_eq!(reader.spec().sample_rate, 16000);
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.len(), 24000);

    Ok(())
}

#[tokio::test]
async fn test_stereo_source_is_downmixed() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_tone(dir.path(), 1.0, 8000, 2)?;
    let mut capture = file_capture(&path);

    capture.acquire().await?;
    drain().await;
    capture.release();

    let Artifact::Audio(audio) = capture.finalize().await? else {
        panic!("expected audio");
    };
    let reader = hound::WavReader::new(Cursor::new(audio.bytes))?;
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.len(), 8000);

    Ok(())
}

#[tokio::test]
async fn test_adapter_can_be_reacquired() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_tone(dir.path(), 0.5, 16000, 1)?;
    let mut capture = file_capture(&path);

    for _ in 0..2 {
        capture.acquire().await?;
        drain().await;
        capture.release();
        let artifact = capture.finalize().await?;
        assert!(artifact.is_submittable());
    }

    Ok(())
}

#[tokio::test]
async fn test_missing_file_is_unavailable() -> Result<()> {
    let dir = TempDir::new()?;
    let mut capture = file_capture(&dir.path().join("answer.wav"));

    let err = capture.acquire().await.unwrap_err();
    assert!(matches!(err, CaptureError::Unavailable(_)));

    // The backend is kept, so the same adapter works once the source exists
    write_tone(dir.path(), 0.2, 16000, 1)?;
    capture.acquire().await?;
    drain().await;
    capture.release();
    assert!(capture.finalize().await?.is_submittable());

    Ok(())
}

#[tokio::test]
async fn test_finalize_without_acquire_reports_nothing_captured() {
    let mut capture = file_capture(Path::new("/nonexistent.wav"));
    let err = capture.finalize().await.unwrap_err();
    assert!(matches!(err, CaptureError::NotCaptured));
}

#[tokio::test]
async fn test_realtime_replay_stops_on_release() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_tone(dir.path(), 5.0, 16000, 1)?;
    let backend = FileBackend::new(&path, AudioBackendConfig::default());
    let mut capture = MicrophoneCapture::new(Box::new(backend));

    capture.acquire().await?;
    tokio::time::sleep(Duration::from_millis(550)).await;
    capture.release();

    let Artifact::Audio(audio) = capture.finalize().await? else {
        panic!("expected audio");
    };
    assert!(audio.duration_secs > 0.2, "got {}", audio.duration_secs);
    assert!(audio.duration_secs < 2.0, "got {}", audio.duration_secs);

    let source = AudioFile::open(&path)?;
    assert!(audio.duration_secs < source.duration_seconds);

    Ok(())
}

// ============================================================================
// Through the session controller
// ============================================================================

#[derive(Default)]
struct RecordingService {
    submissions: Mutex<Vec<Submission>>,
}

#[async_trait::async_trait]
impl EvaluationService for RecordingService {
    async fn create_evaluation(
        &self,
        _request: &CreateEvaluationRequest,
    ) -> Result<EvaluationSlot, ApiError> {
        Ok(EvaluationSlot {
            evaluation_uuid: "slot-1".into(),
            response_time: Some(60),
            status: None,
        })
    }

    async fn submit(&self, submission: &Submission) -> Result<SubmitReceipt, ApiError> {
        self.submissions.lock().unwrap().push(submission.clone());
        Ok(SubmitReceipt {
            evaluation_uuid: "eval-1".into(),
        })
    }

    async fn fetch_result(
        &self,
        _prompt_uuid: &str,
        _evaluation_uuid: Option<&str>,
    ) -> Result<EvaluationResult, ApiError> {
        Err(ApiError::Timeout)
    }
}

#[tokio::test]
async fn test_spoken_response_is_submitted_as_wav() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_tone(dir.path(), 1.0, 16000, 1)?;
    let service = Arc::new(RecordingService::default());

    let controller = SessionController::new(
        Box::new(file_capture(&path)),
        service.clone(),
        Arc::new(OpenAccess),
        SessionConfig::default().with_clock(Clock::Manual),
    );

    let prompt = Prompt {
        id: 4,
        prompt_uuid: "p-4".into(),
        name: "Describing a Scene".into(),
        name_prefix: "Task 3".into(),
        short_description: None,
        is_required_auth: false,
        preparation_time: 30,
        response_time: 60,
    };
    let question = Question {
        uuid: "q-4".into(),
        name: "A busy market".into(),
        image_path: Some("/images/market.png".into()),
    };

    controller.begin(&prompt, &question).await?;
    drain().await;
    controller.tick().await?;
    let snapshot = controller.stop_capture().await?;
    assert_eq!(snapshot.phase, Phase::Review);

    let summary = snapshot.artifact.expect("artifact summary");
    assert_eq!(summary.mime_type.as_deref(), Some("audio/wav"));
    assert!((summary.duration_secs.unwrap_or_default() - 1.0).abs() < 0.01);

    controller.submit().await?;
    let submissions = service.submissions.lock().unwrap();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].time_taken_secs, 1);
    assert!(matches!(submissions[0].artifact, Artifact::Audio(_)));

    Ok(())
}
