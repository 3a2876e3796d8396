// Live microphone backend using cpal
//
// cpal streams are not Send, so each capture owns a dedicated thread that
// builds the stream, keeps it alive and drops it when told to stop.

use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};

pub struct CpalBackend {
    config: AudioBackendConfig,
    stop_tx: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalBackend {
    pub fn new(config: AudioBackendConfig) -> Self {
        Self {
            config,
            stop_tx: None,
            thread: None,
        }
    }
}

fn build_stream(tx: mpsc::Sender<AudioFrame>, config: AudioBackendConfig) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device found"))?;

    info!("Input device: {:?}", device.description());

    let target_rate = config.target_sample_rate;
    let target_channels = config.target_channels;

    // Prefer a config the device can run at the target rate directly
    let supported: Vec<_> = device
        .supported_input_configs()
        .context("Microphone permission denied or device busy")?
        .collect();
    let desired = supported
        .iter()
        .filter(|c| {
            c.min_sample_rate() <= target_rate
                && c.max_sample_rate() >= target_rate
                && c.sample_format() == cpal::SampleFormat::F32
        })
        .min_by_key(|c| c.channels());

    let (stream_config, decimation) = match desired {
        Some(supported) => (supported.clone().with_sample_rate(target_rate).config(), 1),
        None => {
            let default_config = device
                .default_input_config()
                .context("Microphone permission denied or device busy")?;
            let factor = config.decimation_factor(default_config.sample_rate());
            info!(
                "Using native rate {}Hz, decimating by {}x",
                default_config.sample_rate(),
                factor
            );
            (default_config.config(), factor)
        }
    };

    let sample_rate = stream_config.sample_rate / decimation;
    let channels = stream_config.channels as usize;
    let step = decimation as usize;
    let started = Instant::now();

    let stream = device.build_input_stream(
        &stream_config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let kept = data.chunks(channels).step_by(step);
            let samples: Vec<i16> = if target_channels == 1 {
                kept.map(|chunk| to_i16(chunk.iter().sum::<f32>() / channels as f32))
                    .collect()
            } else {
                kept.flat_map(|chunk| chunk.iter().map(|&s| to_i16(s))).collect()
            };

            let frame = AudioFrame {
                samples,
                sample_rate,
                channels: if target_channels == 1 { 1 } else { channels as u16 },
                timestamp_ms: started.elapsed().as_millis() as u64,
            };

            // Never block the audio thread; drop the frame if the consumer lags
            if tx.try_send(frame).is_err() {
                warn!("Dropping microphone frame (consumer not keeping up)");
            }
        },
        |err| error!("Input stream error: {err}"),
        None,
    )?;

    stream.play()?;
    info!("Microphone capturing at {}Hz", sample_rate);
    Ok(stream)
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

#[async_trait::async_trait]
impl AudioBackend for CpalBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.thread.is_some() {
            bail!("Already capturing");
        }

        let (tx, rx) = mpsc::channel(256);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), String>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let config = self.config.clone();

        let thread = std::thread::spawn(move || match build_stream(tx, config) {
            Ok(stream) => {
                let _ = ready_tx.send(Ok(()));
                // Either an explicit stop or the backend being dropped ends capture
                let _ = stop_rx.recv();
                drop(stream);
                info!("Microphone stream closed");
            }
            Err(e) => {
                let _ = ready_tx.send(Err(format!("{e:#}")));
            }
        });

        match ready_rx.await {
            Ok(Ok(())) => {
                self.stop_tx = Some(stop_tx);
                self.thread = Some(thread);
                info!("Microphone capture started");
                Ok(rx)
            }
            Ok(Err(message)) => bail!("Failed to open microphone: {message}"),
            Err(_) => bail!("Microphone thread exited before reporting readiness"),
        }
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        if let Some(thread) = self.thread.take() {
            tokio::task::spawn_blocking(move || thread.join())
                .await
                .context("Failed to join microphone thread")?
                .map_err(|_| anyhow!("Microphone thread panicked"))?;
        }

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.thread.is_some()
    }

    fn name(&self) -> &str {
        "microphone"
    }
}
