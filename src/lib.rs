pub mod access;
pub mod api;
pub mod audio;
pub mod capture;
pub mod config;
pub mod http;
pub mod session;

pub use access::{AccessPolicy, Identity, IdentityPolicy, OpenAccess};
pub use api::{ApiError, EvaluationService, HttpEvaluationClient, Prompt, PromptCatalog, Question};
pub use audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFile, AudioFrame, AudioSource,
    FileBackend, WavBuffer,
};
pub use capture::{
    Artifact, CaptureAdapter, CaptureError, CaptureKind, CaptureLease, MicrophoneCapture,
    TextCapture, TextInput,
};
pub use config::Config;
pub use http::{create_router, AppState};
pub use session::{
    Clock, ErrorKind, Phase, SessionConfig, SessionController, SessionError, SessionSnapshot,
};
