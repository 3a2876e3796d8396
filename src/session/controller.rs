use chrono::{DateTime, Utc};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::SessionConfig;
use super::countdown::Countdown;
use super::error::SessionError;
use super::phase::Phase;
use super::preview::PreviewFile;
use super::snapshot::SessionSnapshot;
use crate::access::AccessPolicy;
use crate::api::{CreateEvaluationRequest, EvaluationService, Prompt, Question, Submission};
use crate::capture::{Artifact, CaptureAdapter, CaptureKind, CaptureLease};

/// Drives one practice attempt from instruction through capture and review to a
/// scored result
///
/// The controller is a cheap, cloneable handle. All state lives behind a
/// single async mutex; remote calls run with the lock released and are
/// guarded by the `in_flight` flag or the `Submitting` phase. Operations that
/// await a remote call or the capture adapter run in their own task, so a
/// caller that stops waiting cannot leave the session half-way through a
/// transition.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

struct Inner {
    id: Uuid,
    kind: CaptureKind,
    config: SessionConfig,
    service: Arc<dyn EvaluationService>,
    access: Arc<dyn AccessPolicy>,
    state: Mutex<SessionState>,
}

/// Prompt, question and slot of the attempt in progress
struct Attempt {
    prompt: Prompt,
    question_id: String,
    slot_id: String,
    limit_secs: u32,
    started_at: DateTime<Utc>,
}

struct SessionState {
    phase: Phase,
    attempt: Option<Attempt>,
    /// Prompt that was refused at `begin`, kept for `refresh_access`
    locked_prompt: Option<Prompt>,
    remaining_secs: u32,
    elapsed_secs: u32,
    artifact: Option<Artifact>,
    evaluation_id: Option<String>,
    in_flight: bool,
    last_error: Option<String>,
    countdown: Option<Countdown>,
    preview: Option<PreviewFile>,
    lease: CaptureLease,
}

impl SessionState {
    fn new(lease: CaptureLease) -> Self {
        Self {
            phase: Phase::Instruction,
            attempt: None,
            locked_prompt: None,
            remaining_secs: 0,
            elapsed_secs: 0,
            artifact: None,
            evaluation_id: None,
            in_flight: false,
            last_error: None,
            countdown: None,
            preview: None,
            lease,
        }
    }

    fn snapshot(&self, session_id: Uuid) -> SessionSnapshot {
        debug_assert_eq!(self.artifact.is_some(), self.phase.holds_artifact());
        debug_assert!(self.remaining_secs + self.elapsed_secs <= self.limit_secs() || self.attempt.is_none());

        SessionSnapshot {
            session_id,
            phase: self.phase,
            prompt_id: self.attempt.as_ref().map(|a| a.prompt.prompt_uuid.clone()),
            question_id: self.attempt.as_ref().map(|a| a.question_id.clone()),
            slot_id: self.attempt.as_ref().map(|a| a.slot_id.clone()),
            response_time_limit_secs: self.limit_secs(),
            remaining_secs: self.remaining_secs,
            elapsed_secs: self.elapsed_secs,
            capture_started_at: self.attempt.as_ref().map(|a| a.started_at),
            artifact: self.artifact.as_ref().map(Artifact::summary),
            evaluation_id: self.evaluation_id.clone(),
            last_error: self.last_error.clone(),
            in_flight: self.in_flight,
        }
    }

    fn limit_secs(&self) -> u32 {
        self.attempt.as_ref().map_or(0, |a| a.limit_secs)
    }

    /// Record `err` as the last error and hand it back
    fn fail(&mut self, err: SessionError) -> SessionError {
        self.last_error = Some(err.user_message());
        err
    }

    /// Drop everything belonging to the current attempt and go back to Instruction
    fn reset_attempt(&mut self) {
        if let Some(mut countdown) = self.countdown.take() {
            countdown.cancel();
        }
        self.attempt = None;
        self.artifact = None;
        self.preview = None;
        self.remaining_secs = 0;
        self.elapsed_secs = 0;
        self.phase = Phase::Instruction;
    }
}

impl SessionController {
    pub fn new(
        adapter: Box<dyn CaptureAdapter>,
        service: Arc<dyn EvaluationService>,
        access: Arc<dyn AccessPolicy>,
        config: SessionConfig,
    ) -> Self {
        let id = Uuid::new_v4();
        let kind = adapter.kind();
        info!("Creating {} session {} ({})", kind, id, adapter.name());

        Self {
            inner: Arc::new(Inner {
                id,
                kind,
                config,
                service,
                access,
                state: Mutex::new(SessionState::new(CaptureLease::new(adapter))),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn kind(&self) -> CaptureKind {
        self.inner.kind
    }

    pub async fn phase(&self) -> Phase {
        self.inner.state.lock().await.phase
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.lock().await.snapshot(self.inner.id)
    }

    /// Start an attempt: check access, create the evaluation slot, acquire
    /// the capture resource and start the countdown
    ///
    /// Allowed from Instruction and Locked. On any failure the session is
    /// left in Instruction (or Locked when access is denied).
    pub async fn begin(
        &self,
        prompt: &Prompt,
        question: &Question,
    ) -> Result<SessionSnapshot, SessionError> {
        let inner = self.inner.clone();
        let (prompt, question) = (prompt.clone(), question.clone());
        run_detached("begin", inner.begin(prompt, question)).await
    }

    /// Advance the countdown by one second
    ///
    /// Ignored outside Capturing. Reaching zero stops the capture exactly as
    /// `stop_capture` would.
    pub async fn tick(&self) -> Result<SessionSnapshot, SessionError> {
        let inner = self.inner.clone();
        run_detached("tick", async move { inner.tick().await }).await
    }

    /// Stop capturing before the time limit and move to Review
    pub async fn stop_capture(&self) -> Result<SessionSnapshot, SessionError> {
        let inner = self.inner.clone();
        run_detached("stop", async move { inner.stop_capture().await }).await
    }

    /// Discard the reviewed artifact and return to Instruction
    pub async fn retake(&self) -> Result<SessionSnapshot, SessionError> {
        self.inner.retake().await
    }

    /// Submit the reviewed artifact for scoring
    ///
    /// On success the evaluation id is recorded once and never changes. On
    /// failure the session returns to Review with the artifact intact.
    pub async fn submit(&self) -> Result<SessionSnapshot, SessionError> {
        let inner = self.inner.clone();
        run_detached("submit", inner.submit()).await
    }

    /// Re-check a Locked session after the identity changed
    pub async fn refresh_access(&self) -> SessionSnapshot {
        self.inner.refresh_access().await
    }

    /// Abandon the current attempt
    ///
    /// Capturing releases the resource and discards input; Review discards the
    /// artifact. Instruction, Locked and Result are left untouched. Refused
    /// with `Busy` while a begin or submit is waiting on the backend.
    pub async fn cancel(&self) -> Result<SessionSnapshot, SessionError> {
        let inner = self.inner.clone();
        run_detached("cancel", async move { inner.cancel().await }).await
    }

    /// Copy of the captured artifact while one exists
    pub async fn artifact(&self) -> Option<Artifact> {
        self.inner.state.lock().await.artifact.clone()
    }

    /// Path of a temporary file holding the artifact for playback
    ///
    /// The file lives until the artifact is discarded or the session is dropped.
    pub async fn preview_path(&self) -> Result<PathBuf, SessionError> {
        let mut state = self.inner.state.lock().await;

        if let Some(preview) = &state.preview {
            return Ok(preview.path().to_path_buf());
        }

        let Some(artifact) = &state.artifact else {
            return Err(SessionError::InvalidPhase {
                operation: "preview",
                phase: state.phase,
            });
        };

        let preview = PreviewFile::write(artifact)
            .map_err(|e| SessionError::Unexpected(format!("{e:#}")))?;
        let path = preview.path().to_path_buf();
        debug!("Session {} preview written to {}", self.inner.id, path.display());
        state.preview = Some(preview);
        Ok(path)
    }
}

/// Run a transition to completion even if the caller stops waiting
async fn run_detached<F>(operation: &str, fut: F) -> Result<SessionSnapshot, SessionError>
where
    F: Future<Output = Result<SessionSnapshot, SessionError>> + Send + 'static,
{
    tokio::spawn(fut)
        .await
        .map_err(|e| SessionError::Unexpected(format!("{operation} task failed: {e}")))?
}

impl Inner {
    async fn begin(
        self: Arc<Self>,
        prompt: Prompt,
        question: Question,
    ) -> Result<SessionSnapshot, SessionError> {
        {
            let mut state = self.state.lock().await;

            if !matches!(state.phase, Phase::Instruction | Phase::Locked) {
                return Err(SessionError::InvalidPhase {
                    operation: "begin",
                    phase: state.phase,
                });
            }
            if state.in_flight {
                return Err(SessionError::Busy);
            }

            if self.access.is_locked(&prompt).await {
                warn!(
                    "Session {} locked: prompt {} requires sign-in",
                    self.id, prompt.prompt_uuid
                );
                state.phase = Phase::Locked;
                state.locked_prompt = Some(prompt);
                return Err(state.fail(SessionError::Locked));
            }

            state.locked_prompt = None;
            state.last_error = None;
            state.in_flight = true;
        }

        info!(
            "Session {} creating evaluation slot for prompt {} / question {}",
            self.id, prompt.prompt_uuid, question.uuid
        );
        let request = CreateEvaluationRequest {
            prompt_uuid: prompt.prompt_uuid.clone(),
            question_uuid: question.uuid.clone(),
            language_id: self.config.language_id,
        };
        let slot = self.service.create_evaluation(&request).await;

        let mut state = self.state.lock().await;
        state.in_flight = false;

        let slot = match slot {
            Ok(slot) => slot,
            Err(e) => {
                error!("Session {} failed to create evaluation slot: {}", self.id, e);
                state.phase = Phase::Instruction;
                return Err(state.fail(e.into()));
            }
        };

        if let Err(e) = state.lease.acquire().await {
            error!(
                "Session {} could not acquire {}: {}",
                self.id,
                state.lease.name(),
                e
            );
            state.phase = Phase::Instruction;
            return Err(state.fail(e.into()));
        }

        let limit_secs = slot
            .response_time
            .filter(|secs| *secs > 0)
            .or((prompt.response_time > 0).then_some(prompt.response_time))
            .unwrap_or(self.config.default_response_secs);

        state.attempt = Some(Attempt {
            prompt,
            question_id: question.uuid,
            slot_id: slot.evaluation_uuid,
            limit_secs,
            started_at: Utc::now(),
        });
        state.remaining_secs = limit_secs;
        state.elapsed_secs = 0;
        state.artifact = None;
        state.preview = None;
        state.phase = Phase::Capturing;
        state.countdown = Some(self.start_countdown());

        info!(
            "Session {} capturing ({}s limit, slot {})",
            self.id,
            limit_secs,
            state.attempt.as_ref().map_or("", |a| a.slot_id.as_str())
        );
        Ok(state.snapshot(self.id))
    }

    fn start_countdown(self: &Arc<Self>) -> Countdown {
        let weak = Arc::downgrade(self);

        Countdown::start(self.config.clock, move || {
            let weak = weak.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return false;
                };
                match inner.tick().await {
                    Ok(snapshot) => snapshot.phase == Phase::Capturing,
                    Err(e) => {
                        warn!("Session {} countdown stopped: {}", inner.id, e);
                        false
                    }
                }
            }
        })
    }

    async fn tick(&self) -> Result<SessionSnapshot, SessionError> {
        let mut state = self.state.lock().await;

        if state.phase != Phase::Capturing {
            return Ok(state.snapshot(self.id));
        }

        let limit = state.limit_secs();
        state.remaining_secs = state.remaining_secs.saturating_sub(1);
        state.elapsed_secs = (state.elapsed_secs + 1).min(limit);
        debug!(
            "Session {} tick: {}s remaining",
            self.id, state.remaining_secs
        );

        if state.remaining_secs == 0 {
            let first_expiry = state.countdown.as_ref().map_or(true, Countdown::expire);
            if first_expiry {
                info!("Session {} reached its time limit", self.id);
                self.finish_capture(&mut state).await?;
            }
        }

        Ok(state.snapshot(self.id))
    }

    async fn stop_capture(&self) -> Result<SessionSnapshot, SessionError> {
        let mut state = self.state.lock().await;

        if state.phase != Phase::Capturing {
            return Err(SessionError::InvalidPhase {
                operation: "stop",
                phase: state.phase,
            });
        }

        info!(
            "Session {} stopped manually after {}s",
            self.id, state.elapsed_secs
        );
        self.finish_capture(&mut state).await?;
        Ok(state.snapshot(self.id))
    }

    /// Shared exit from Capturing for manual stop and expiry
    async fn finish_capture(&self, state: &mut SessionState) -> Result<(), SessionError> {
        if let Some(mut countdown) = state.countdown.take() {
            countdown.cancel();
        }
        state.lease.release();

        match state.lease.finalize().await {
            Ok(artifact) => {
                match &artifact {
                    Artifact::Audio(audio) => info!(
                        "Session {} in review ({:.1}s of audio, {} bytes)",
                        self.id,
                        audio.duration_secs,
                        audio.bytes.len()
                    ),
                    Artifact::Text(text) => info!(
                        "Session {} in review ({} words)",
                        self.id,
                        text.split_whitespace().count()
                    ),
                }
                state.artifact = Some(artifact);
                state.phase = Phase::Review;
                state.last_error = None;
                Ok(())
            }
            Err(e) => {
                error!("Session {} failed to finalize capture: {}", self.id, e);
                state.reset_attempt();
                Err(state.fail(e.into()))
            }
        }
    }

    async fn retake(&self) -> Result<SessionSnapshot, SessionError> {
        let mut state = self.state.lock().await;

        if state.phase != Phase::Review {
            return Err(SessionError::InvalidPhase {
                operation: "retake",
                phase: state.phase,
            });
        }

        info!("Session {} discarding response for retake", self.id);
        state.reset_attempt();
        state.last_error = None;
        Ok(state.snapshot(self.id))
    }

    async fn submit(self: Arc<Self>) -> Result<SessionSnapshot, SessionError> {
        let submission = {
            let mut state = self.state.lock().await;

            if state.phase != Phase::Review {
                return Err(SessionError::InvalidPhase {
                    operation: "submit",
                    phase: state.phase,
                });
            }

            let artifact = state.artifact.clone();
            let attempt = state
                .attempt
                .as_ref()
                .map(|a| (a.prompt.clone(), a.slot_id.clone()));

            let (Some(artifact), Some((prompt, slot_id))) = (artifact, attempt) else {
                return Err(state.fail(SessionError::Unexpected(
                    "review without a captured response".to_string(),
                )));
            };

            if !artifact.is_submittable() {
                warn!("Session {} refused to submit an empty response", self.id);
                return Err(state.fail(SessionError::EmptyArtifact));
            }

            if self.access.is_locked(&prompt).await {
                warn!(
                    "Session {} cannot submit: prompt {} requires sign-in",
                    self.id, prompt.prompt_uuid
                );
                return Err(state.fail(SessionError::Locked));
            }

            state.phase = Phase::Submitting;
            state.in_flight = true;
            state.last_error = None;

            Submission {
                evaluation_uuid: slot_id,
                targeting_score: self.config.targeting_score,
                time_taken_secs: state.elapsed_secs,
                artifact,
            }
        };

        info!(
            "Session {} submitting {} response for slot {} ({}s taken)",
            self.id, self.kind, submission.evaluation_uuid, submission.time_taken_secs
        );

        let outcome =
            match tokio::time::timeout(self.config.submit_timeout, self.service.submit(&submission))
                .await
            {
                Ok(Ok(receipt)) => Ok(receipt),
                Ok(Err(e)) => Err(SessionError::Remote(e)),
                Err(_) => Err(SessionError::SubmitTimeout(
                    self.config.submit_timeout.as_secs(),
                )),
            };

        let mut state = self.state.lock().await;
        state.in_flight = false;

        match outcome {
            Ok(receipt) => {
                let evaluation_id = state
                    .evaluation_id
                    .get_or_insert(receipt.evaluation_uuid)
                    .clone();
                state.phase = Phase::Result;
                info!("Session {} scored as evaluation {}", self.id, evaluation_id);
                Ok(state.snapshot(self.id))
            }
            Err(e) => {
                error!("Session {} submission failed: {}", self.id, e);
                state.phase = Phase::Review;
                Err(state.fail(e))
            }
        }
    }

    async fn refresh_access(&self) -> SessionSnapshot {
        let mut state = self.state.lock().await;

        if state.phase == Phase::Locked {
            let unlocked = match &state.locked_prompt {
                Some(prompt) => !self.access.is_locked(prompt).await,
                None => true,
            };
            if unlocked {
                info!("Session {} unlocked", self.id);
                state.phase = Phase::Instruction;
                state.locked_prompt = None;
                state.last_error = None;
            }
        }

        state.snapshot(self.id)
    }

    async fn cancel(&self) -> Result<SessionSnapshot, SessionError> {
        let mut state = self.state.lock().await;

        // A begin waiting on its slot would acquire the adapter after we return
        if state.in_flight {
            return Err(SessionError::Busy);
        }

        match state.phase {
            Phase::Capturing => {
                info!("Session {} cancelled while capturing", self.id);
                if let Some(mut countdown) = state.countdown.take() {
                    countdown.cancel();
                }
                state.lease.release();
                // Collect and discard so the adapter is ready for the next acquisition
                if let Err(e) = state.lease.finalize().await {
                    debug!("Session {} discarded capture: {}", self.id, e);
                }
                state.reset_attempt();
            }
            Phase::Review => {
                info!("Session {} cancelled in review", self.id);
                state.reset_attempt();
            }
            Phase::Submitting => return Err(SessionError::Busy),
            Phase::Instruction | Phase::Locked | Phase::Result => {}
        }

        Ok(state.snapshot(self.id))
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        debug!("Session {} dropped", self.id);
    }
}
