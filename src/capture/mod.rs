//! Capture adapters
//!
//! A capture adapter turns user input into the artifact that gets scored:
//! - `MicrophoneCapture`: audio frames from an `AudioBackend`, encoded as WAV
//! - `TextCapture`: a typed response written through a `TextInput` handle

mod adapter;
mod artifact;
mod microphone;
mod text;

pub use adapter::{CaptureAdapter, CaptureError, CaptureLease};
pub use artifact::{Artifact, ArtifactSummary, AudioArtifact, CaptureKind};
pub use microphone::MicrophoneCapture;
pub use text::{TextCapture, TextInput};
