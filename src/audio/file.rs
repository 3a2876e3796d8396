use anyhow::{bail, Context, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Keep every `factor`-th interleaved frame, dividing the sample rate
    pub fn decimate(mut self, factor: u32) -> Self {
        if factor <= 1 || self.channels == 0 {
            return self;
        }

        let channels = self.channels as usize;
        self.samples = self
            .samples
            .chunks_exact(channels)
            .step_by(factor as usize)
            .flatten()
            .copied()
            .collect();
        self.sample_rate /= factor;
        debug!("Decimated {} by {}x to {}Hz", self.path, factor, self.sample_rate);
        self
    }

    /// Average interleaved channels down to mono
    pub fn to_mono(&self) -> Vec<i16> {
        if self.channels <= 1 {
            return self.samples.clone();
        }

        self.samples
            .chunks_exact(self.channels as usize)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / self.channels as i32) as i16
            })
            .collect()
    }

    /// Split the file into frames of `frame_ms` milliseconds
    pub fn frames(&self, frame_ms: u64, mono: bool) -> Vec<AudioFrame> {
        let (samples, channels) = if mono {
            (self.to_mono(), 1)
        } else {
            (self.samples.clone(), self.channels)
        };

        let per_frame =
            ((self.sample_rate as u64 * frame_ms / 1000) as usize * channels as usize).max(1);

        samples
            .chunks(per_frame)
            .enumerate()
            .map(|(i, chunk)| AudioFrame {
                samples: chunk.to_vec(),
                sample_rate: self.sample_rate,
                channels,
                timestamp_ms: i as u64 * frame_ms,
            })
            .collect()
    }
}

/// Replays a WAV file as a capture source
///
/// With real-time pacing enabled (the default) frames are emitted once per
/// buffer duration, so a 45s answer takes 45s to "speak".
pub struct FileBackend {
    path: PathBuf,
    config: AudioBackendConfig,
    realtime: bool,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>, config: AudioBackendConfig) -> Self {
        Self {
            path: path.into(),
            config,
            realtime: true,
            stop_tx: None,
            task: None,
        }
    }

    /// Emit all frames immediately instead of pacing them
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }
}

#[async_trait::async_trait]
impl AudioBackend for FileBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.is_capturing() {
            bail!("Already capturing");
        }

        let file = AudioFile::open(&self.path)
            .with_context(|| format!("Audio source unavailable: {}", self.path.display()))?;
        let factor = self.config.decimation_factor(file.sample_rate);
        let file = file.decimate(factor);

        let frame_ms = self.config.buffer_duration_ms.max(1);
        let frames = file.frames(frame_ms, self.config.target_channels == 1);
        let realtime = self.realtime;

        let (tx, rx) = mpsc::channel(100);
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut pace = tokio::time::interval(Duration::from_millis(frame_ms));

            for frame in frames {
                if realtime {
                    tokio::select! {
                        _ = pace.tick() => {}
                        _ = &mut stop_rx => break,
                    }
                } else if stop_rx.try_recv().is_ok() {
                    break;
                }

                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        info!("File backend started: {}", self.path.display());

        self.stop_tx = Some(stop_tx);
        self.task = Some(task);

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("File backend task ended abnormally: {}", e);
            }
        }

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn name(&self) -> &str {
        "file"
    }
}
