use super::error::HttpError;
use super::state::AppState;
use crate::api::{EvaluationResult, PromptListing};
use crate::capture::{Artifact, ArtifactSummary, CaptureKind};
use crate::session::SessionSnapshot;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

type ApiResult<T> = Result<Json<T>, HttpError>;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TextUpdateRequest {
    pub text: String,

    /// Append instead of replacing the whole response
    #[serde(default)]
    pub append: bool,
}

#[derive(Debug, Serialize)]
pub struct TextUpdateResponse {
    pub word_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ArtifactResponse {
    pub summary: ArtifactSummary,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Base64-encoded audio file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_base64: Option<String>,

    /// Local file for playback
    pub preview_path: String,
}

#[derive(Debug, Deserialize)]
pub struct ResultQuery {
    pub evaluation_id: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

fn parse_kind(kind: &str) -> Result<CaptureKind, HttpError> {
    match kind {
        "speaking" => Ok(CaptureKind::Speaking),
        "writing" => Ok(CaptureKind::Writing),
        other => Err(HttpError::BadRequest(format!(
            "Unknown prompt kind {other}, expected speaking or writing"
        ))),
    }
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /prompts/:kind
/// Load prompts of one kind (speaking | writing) into the catalog
pub async fn list_prompts(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> ApiResult<Vec<PromptListing>> {
    let kind = parse_kind(&kind)?;
    let listings = state.prompts.prompts(kind).await?;
    state.load_catalog(kind, &listings).await;
    Ok(Json(listings))
}

/// POST /sessions/:prompt_id/begin
pub async fn begin_session(
    State(state): State<AppState>,
    Path(prompt_id): Path<String>,
) -> ApiResult<SessionSnapshot> {
    let entry = state.catalog_entry(&prompt_id).await?;
    let session = state.session_or_create(&prompt_id, entry.kind).await?;

    info!("Beginning attempt for prompt {}", prompt_id);
    let snapshot = session
        .controller
        .begin(&entry.listing.prompt, &entry.listing.question)
        .await?;
    Ok(Json(snapshot))
}

/// PUT /sessions/:prompt_id/text
/// Write into the response of a writing session while it is capturing
pub async fn update_text(
    State(state): State<AppState>,
    Path(prompt_id): Path<String>,
    Json(req): Json<TextUpdateRequest>,
) -> ApiResult<TextUpdateResponse> {
    let session = state.session(&prompt_id).await?;
    let Some(input) = session.text_input else {
        return Err(HttpError::BadRequest(format!(
            "Prompt {prompt_id} is not a writing prompt"
        )));
    };

    let accepted = if req.append {
        input.append(&req.text)
    } else {
        input.set(req.text)
    };
    if !accepted {
        warn!("Text for prompt {} arrived while input is closed", prompt_id);
        return Err(HttpError::Conflict(
            "The response can only be edited while capturing".to_string(),
        ));
    }

    Ok(Json(TextUpdateResponse {
        word_count: input.word_count(),
    }))
}

/// POST /sessions/:prompt_id/stop
pub async fn stop_session(
    State(state): State<AppState>,
    Path(prompt_id): Path<String>,
) -> ApiResult<SessionSnapshot> {
    let session = state.session(&prompt_id).await?;
    Ok(Json(session.controller.stop_capture().await?))
}

/// POST /sessions/:prompt_id/retake
pub async fn retake_session(
    State(state): State<AppState>,
    Path(prompt_id): Path<String>,
) -> ApiResult<SessionSnapshot> {
    let session = state.session(&prompt_id).await?;
    Ok(Json(session.controller.retake().await?))
}

/// POST /sessions/:prompt_id/submit
pub async fn submit_session(
    State(state): State<AppState>,
    Path(prompt_id): Path<String>,
) -> ApiResult<SessionSnapshot> {
    let session = state.session(&prompt_id).await?;
    Ok(Json(session.controller.submit().await?))
}

/// GET /sessions/:prompt_id
pub async fn get_session(
    State(state): State<AppState>,
    Path(prompt_id): Path<String>,
) -> ApiResult<SessionSnapshot> {
    let session = state.session(&prompt_id).await?;
    Ok(Json(session.controller.snapshot().await))
}

/// GET /sessions/:prompt_id/artifact
pub async fn get_artifact(
    State(state): State<AppState>,
    Path(prompt_id): Path<String>,
) -> ApiResult<ArtifactResponse> {
    let session = state.session(&prompt_id).await?;
    let controller = session.controller;

    let Some(artifact) = controller.artifact().await else {
        return Err(HttpError::NotFound(format!(
            "Prompt {prompt_id} has no captured response"
        )));
    };
    let preview_path = controller.preview_path().await?;

    let (text, audio_base64) = match &artifact {
        Artifact::Text(text) => (Some(text.clone()), None),
        Artifact::Audio(audio) => (None, Some(STANDARD.encode(&audio.bytes))),
    };

    Ok(Json(ArtifactResponse {
        summary: artifact.summary(),
        text,
        audio_base64,
        preview_path: preview_path.display().to_string(),
    }))
}

/// DELETE /sessions/:prompt_id
/// Cancel the attempt and drop the session
pub async fn delete_session(
    State(state): State<AppState>,
    Path(prompt_id): Path<String>,
) -> ApiResult<SessionSnapshot> {
    let session = state.session(&prompt_id).await?;
    let snapshot = session.controller.cancel().await?;

    state.sessions.write().await.remove(&prompt_id);
    info!("Session for prompt {} removed", prompt_id);
    Ok(Json(snapshot))
}

/// GET /results/:prompt_id
pub async fn get_result(
    State(state): State<AppState>,
    Path(prompt_id): Path<String>,
    Query(query): Query<ResultQuery>,
) -> ApiResult<EvaluationResult> {
    // Default to the evaluation this server submitted, if any
    let evaluation_id = match query.evaluation_id {
        Some(id) => Some(id),
        None => match state.session(&prompt_id).await {
            Ok(session) => session.controller.snapshot().await.evaluation_id,
            Err(_) => None,
        },
    };

    let result = state
        .service
        .fetch_result(&prompt_id, evaluation_id.as_deref())
        .await?;
    Ok(Json(result))
}

/// GET /history/:kind
pub async fn list_history(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> ApiResult<Vec<EvaluationResult>> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.prompts.history(kind).await?))
}
