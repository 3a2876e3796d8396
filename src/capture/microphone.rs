use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::adapter::{CaptureAdapter, CaptureError};
use super::artifact::{Artifact, AudioArtifact, CaptureKind};
use crate::audio::{AudioBackend, AudioFrame, WavBuffer};

type Collected = (Box<dyn AudioBackend>, WavBuffer);

/// Spoken-response capture over an `AudioBackend`
///
/// While acquired, a collector task owns the backend and appends every frame
/// to an in-memory WAV buffer. Releasing signals the collector, which stops
/// the backend and hands both back on `finalize`.
pub struct MicrophoneCapture {
    backend: Option<Box<dyn AudioBackend>>,
    stop_tx: Option<oneshot::Sender<()>>,
    collector: Option<JoinHandle<Collected>>,
}

impl MicrophoneCapture {
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        Self {
            backend: Some(backend),
            stop_tx: None,
            collector: None,
        }
    }
}

async fn collect(
    mut backend: Box<dyn AudioBackend>,
    mut audio_rx: mpsc::Receiver<AudioFrame>,
    mut stop_rx: oneshot::Receiver<()>,
) -> Collected {
    let mut buffer = WavBuffer::new();

    loop {
        tokio::select! {
            frame = audio_rx.recv() => match frame {
                Some(frame) => buffer.write_frame(&frame),
                None => {
                    info!("Audio source ended");
                    break;
                }
            },
            _ = &mut stop_rx => {
                // Keep whatever was already delivered
                while let Ok(frame) = audio_rx.try_recv() {
                    buffer.write_frame(&frame);
                }
                break;
            }
        }
    }

    // Closing the channel unblocks a producer waiting on capacity
    drop(audio_rx);
    if let Err(e) = backend.stop().await {
        warn!("Failed to stop audio backend {}: {}", backend.name(), e);
    }

    info!(
        "Collected {:.1}s of audio ({} samples)",
        buffer.duration_secs(),
        buffer.sample_count()
    );

    (backend, buffer)
}

#[async_trait::async_trait]
impl CaptureAdapter for MicrophoneCapture {
    async fn acquire(&mut self) -> Result<(), CaptureError> {
        let mut backend = self
            .backend
            .take()
            .ok_or_else(|| CaptureError::Unavailable("capture already in progress".into()))?;

        let audio_rx = match backend.start().await {
            Ok(rx) => rx,
            Err(e) => {
                let message = format!("{e:#}");
                self.backend = Some(backend);
                return Err(CaptureError::Unavailable(message));
            }
        };

        info!("Audio capture started via {}", backend.name());

        let (stop_tx, stop_rx) = oneshot::channel();
        self.stop_tx = Some(stop_tx);
        self.collector = Some(tokio::spawn(collect(backend, audio_rx, stop_rx)));
        Ok(())
    }

    fn release(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }

    async fn finalize(&mut self) -> Result<Artifact, CaptureError> {
        let collector = self.collector.take().ok_or(CaptureError::NotCaptured)?;

        let (backend, buffer) = collector
            .await
            .map_err(|e| CaptureError::Finalize(format!("collector task failed: {e}")))?;
        self.backend = Some(backend);

        let duration_secs = buffer.duration_secs();
        let bytes = buffer
            .finish()
            .map_err(|e| CaptureError::Finalize(format!("{e:#}")))?;

        Ok(Artifact::Audio(AudioArtifact {
            bytes,
            mime_type: "audio/wav".to_string(),
            duration_secs,
        }))
    }

    fn kind(&self) -> CaptureKind {
        CaptureKind::Speaking
    }

    fn name(&self) -> &str {
        "microphone"
    }
}
