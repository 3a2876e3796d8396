use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use super::error::HttpError;
use crate::access::AccessPolicy;
use crate::api::{EvaluationService, PromptCatalog, PromptListing};
use crate::audio::AudioBackendFactory;
use crate::capture::{CaptureAdapter, CaptureKind, MicrophoneCapture, TextCapture, TextInput};
use crate::config::AudioConfig;
use crate::session::{SessionConfig, SessionController};

/// A prompt loaded from the catalog
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub listing: PromptListing,
    pub kind: CaptureKind,
}

/// The controller for one prompt, plus the text handle for writing sessions
#[derive(Clone)]
pub struct SessionEntry {
    pub controller: SessionController,
    pub text_input: Option<TextInput>,
}

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// One session per prompt (prompt UUID → session)
    pub sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,

    /// Prompts loaded through `GET /prompts/:kind` (prompt UUID → entry)
    pub catalog: Arc<RwLock<HashMap<String, CatalogEntry>>>,

    pub service: Arc<dyn EvaluationService>,

    pub prompts: Arc<dyn PromptCatalog>,

    pub access: Arc<dyn AccessPolicy>,

    pub session_config: SessionConfig,

    /// Audio source used for speaking sessions
    pub audio: AudioConfig,
}

impl AppState {
    pub fn new(
        service: Arc<dyn EvaluationService>,
        prompts: Arc<dyn PromptCatalog>,
        access: Arc<dyn AccessPolicy>,
        session_config: SessionConfig,
        audio: AudioConfig,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            catalog: Arc::new(RwLock::new(HashMap::new())),
            service,
            prompts,
            access,
            session_config,
            audio,
        }
    }

    /// Replace the catalog entries of one kind
    pub async fn load_catalog(&self, kind: CaptureKind, listings: &[PromptListing]) {
        let mut catalog = self.catalog.write().await;
        catalog.retain(|_, entry| entry.kind != kind);
        for listing in listings {
            catalog.insert(
                listing.prompt.prompt_uuid.clone(),
                CatalogEntry {
                    listing: listing.clone(),
                    kind,
                },
            );
        }
        info!("Catalog holds {} {} prompts", listings.len(), kind);
    }

    pub async fn catalog_entry(&self, prompt_id: &str) -> Result<CatalogEntry, HttpError> {
        self.catalog
            .read()
            .await
            .get(prompt_id)
            .cloned()
            .ok_or_else(|| HttpError::NotFound(format!("Prompt {prompt_id} is not in the catalog")))
    }

    pub async fn session(&self, prompt_id: &str) -> Result<SessionEntry, HttpError> {
        self.sessions
            .read()
            .await
            .get(prompt_id)
            .cloned()
            .ok_or_else(|| HttpError::NotFound(format!("No session for prompt {prompt_id}")))
    }

    /// Existing session for the prompt, or a new one with a fresh capture adapter
    pub async fn session_or_create(
        &self,
        prompt_id: &str,
        kind: CaptureKind,
    ) -> Result<SessionEntry, HttpError> {
        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.get(prompt_id) {
            return Ok(entry.clone());
        }

        let (adapter, text_input): (Box<dyn CaptureAdapter>, Option<TextInput>) = match kind {
            CaptureKind::Speaking => {
                let backend =
                    AudioBackendFactory::create(self.audio.source(), self.audio.backend_config())
                        .map_err(|e| HttpError::Unavailable(format!("{e:#}")))?;
                (Box::new(MicrophoneCapture::new(backend)), None)
            }
            CaptureKind::Writing => {
                let (capture, input) = TextCapture::new();
                (Box::new(capture), Some(input))
            }
        };

        let controller = SessionController::new(
            adapter,
            self.service.clone(),
            self.access.clone(),
            self.session_config.clone(),
        );
        info!(
            "Created {} session {} for prompt {}",
            kind,
            controller.id(),
            prompt_id
        );

        let entry = SessionEntry {
            controller,
            text_input,
        };
        sessions.insert(prompt_id.to_string(), entry.clone());
        Ok(entry)
    }
}
