use anyhow::{Context, Result};
use serde::Deserialize;

use crate::audio::{AudioBackendConfig, AudioSource};

/// Environment variable prefix; nested keys use `__`, e.g. `CELPIP__API__BASE_URL`
pub const ENV_PREFIX: &str = "CELPIP";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub api: ApiConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "celpip-practice".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

/// Scoring backend connection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Bearer token sent with every request
    pub token: Option<String>,
    /// Default request timeout
    pub timeout_secs: u64,
    /// Upper bound for a scoring submission
    pub submit_timeout_secs: u64,
    pub language_id: u32,
    pub targeting_score: u8,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            token: None,
            timeout_secs: 10,
            submit_timeout_secs: 60,
            language_id: 1,     // English
            targeting_score: 12,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// `microphone` or a path to a WAV file
    pub source: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_duration_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            source: "microphone".to_string(),
            sample_rate: 16000,
            channels: 1,
            buffer_duration_ms: 100,
        }
    }
}

impl AudioConfig {
    pub fn source(&self) -> AudioSource {
        AudioSource::parse(&self.source)
    }

    pub fn backend_config(&self) -> AudioBackendConfig {
        AudioBackendConfig {
            target_sample_rate: self.sample_rate,
            target_channels: self.channels,
            buffer_duration_ms: self.buffer_duration_ms,
        }
    }
}

impl Config {
    /// Load from an optional file (any format `config` understands), then
    /// apply `CELPIP__*` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {path}"))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_when_file_missing() -> Result<()> {
        let config = Config::load("/nonexistent/celpip-practice")?;
        assert_eq!(config.service.http.port, 8787);
        assert_eq!(config.api.submit_timeout_secs, 60);
        assert_eq!(config.api.targeting_score, 12);
        assert_eq!(config.audio.source(), AudioSource::Microphone);
        Ok(())
    }

    #[test]
    fn test_file_overrides_defaults() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(
            file,
            "[api]\nbase_url = \"https://scoring.example\"\ntargeting_score = 9\n\n[audio]\nsource = \"answer.wav\""
        )?;

        let path = file.path().with_extension("");
        let path = path.to_string_lossy();
        let config = Config::load(&path)?;

        assert_eq!(config.api.base_url, "https://scoring.example");
        assert_eq!(config.api.targeting_score, 9);
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(
            config.audio.source(),
            AudioSource::File("answer.wav".into())
        );
        Ok(())
    }
}
