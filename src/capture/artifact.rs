use serde::{Deserialize, Serialize};

/// Which kind of response a capture adapter produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureKind {
    Speaking,
    Writing,
}

impl CaptureKind {
    /// Path segment used by the scoring backend (`evaluation/submit/:type`)
    pub fn slug(&self) -> &'static str {
        match self {
            CaptureKind::Speaking => "speaking",
            CaptureKind::Writing => "writing",
        }
    }
}

impl std::fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

/// Finalized audio recording
#[derive(Debug, Clone, PartialEq)]
pub struct AudioArtifact {
    /// Encoded audio (complete file)
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`
    pub mime_type: String,
    /// Measured duration in seconds
    pub duration_secs: f64,
}

impl AudioArtifact {
    /// Upload file name matching the MIME type
    pub fn file_name(&self) -> &'static str {
        match self.mime_type.as_str() {
            "audio/wav" | "audio/x-wav" => "recording.wav",
            "audio/mp4" => "recording.m4a",
            "audio/mpeg" => "recording.mp3",
            "audio/ogg" => "recording.ogg",
            _ => "recording.webm",
        }
    }
}

/// The captured response of one attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Audio(AudioArtifact),
    Text(String),
}

impl Artifact {
    pub fn kind(&self) -> CaptureKind {
        match self {
            Artifact::Audio(_) => CaptureKind::Speaking,
            Artifact::Text(_) => CaptureKind::Writing,
        }
    }

    /// Non-blank text, or audio with a positive measured duration
    pub fn is_submittable(&self) -> bool {
        match self {
            Artifact::Audio(audio) => audio.duration_secs > 0.0 && !audio.bytes.is_empty(),
            Artifact::Text(text) => !text.trim().is_empty(),
        }
    }

    pub fn summary(&self) -> ArtifactSummary {
        match self {
            Artifact::Audio(audio) => ArtifactSummary {
                kind: CaptureKind::Speaking,
                duration_secs: Some(audio.duration_secs),
                byte_len: Some(audio.bytes.len()),
                word_count: None,
                mime_type: Some(audio.mime_type.clone()),
            },
            Artifact::Text(text) => ArtifactSummary {
                kind: CaptureKind::Writing,
                duration_secs: None,
                byte_len: None,
                word_count: Some(text.split_whitespace().count()),
                mime_type: None,
            },
        }
    }
}

/// Lightweight description of an artifact for status views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub kind: CaptureKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_len: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}
