use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::ApiError;
use super::messages::{
    CreateEvaluationRequest, CurrentCustomerResponse, Customer, CustomerAnalytics, Envelope,
    ErrorBody, EvaluationResult, EvaluationSlot, PromptListing, Submission, SubmitReceipt,
};
use crate::capture::{Artifact, CaptureKind};
use crate::config::ApiConfig;

/// Remote evaluator operations the session controller depends on
#[async_trait::async_trait]
pub trait EvaluationService: Send + Sync {
    /// Create an evaluation slot for a prompt/question pair
    async fn create_evaluation(
        &self,
        request: &CreateEvaluationRequest,
    ) -> Result<EvaluationSlot, ApiError>;

    /// Send a captured response for scoring
    async fn submit(&self, submission: &Submission) -> Result<SubmitReceipt, ApiError>;

    /// Fetch the scored result for a prompt (latest, or a specific evaluation)
    async fn fetch_result(
        &self,
        prompt_uuid: &str,
        evaluation_uuid: Option<&str>,
    ) -> Result<EvaluationResult, ApiError>;
}

/// Source of the prompt catalog and the customer's past attempts at it
#[async_trait::async_trait]
pub trait PromptCatalog: Send + Sync {
    /// Prompts of one test type, each with a randomly assigned question
    async fn prompts(&self, kind: CaptureKind) -> Result<Vec<PromptListing>, ApiError>;

    /// Scored attempts of one test type, newest first as the backend returns them
    async fn history(&self, kind: CaptureKind) -> Result<Vec<EvaluationResult>, ApiError>;
}

/// REST client for the scoring backend
#[derive(Clone)]
pub struct HttpEvaluationClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    submit_timeout: Duration,
}

impl HttpEvaluationClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        info!("Scoring backend: {}", config.base_url);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|t| !t.is_empty()),
            submit_timeout: Duration::from_secs(config.submit_timeout_secs),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.authorize(self.client.get(self.url(path))).send().await?;
        read_json(response).await
    }

    /// GET /celpip/prompts-questions?testTypeSlug=
    pub async fn prompts(&self, kind: CaptureKind) -> Result<Vec<PromptListing>, ApiError> {
        let response = self
            .authorize(self.client.get(self.url("celpip/prompts-questions")))
            .query(&[("testTypeSlug", kind.slug())])
            .send()
            .await?;
        let prompts: Vec<PromptListing> = read_json(response).await?;
        debug!("Loaded {} {} prompts", prompts.len(), kind);
        Ok(prompts)
    }

    /// GET /evaluation/history?promptTypeSlug=
    pub async fn history(&self, kind: CaptureKind) -> Result<Vec<EvaluationResult>, ApiError> {
        let response = self
            .authorize(self.client.get(self.url("evaluation/history")))
            .query(&[("promptTypeSlug", kind.slug())])
            .send()
            .await?;
        let attempts: Vec<EvaluationResult> = read_json(response).await?;
        debug!("Loaded {} past {} attempts", attempts.len(), kind);
        Ok(attempts)
    }

    /// GET /evaluation/analytics
    pub async fn analytics(&self) -> Result<CustomerAnalytics, ApiError> {
        self.get("evaluation/analytics").await
    }

    /// GET /customers/auth/me; `None` when the caller is anonymous
    pub async fn current_customer(&self) -> Result<Option<Customer>, ApiError> {
        match self.get::<CurrentCustomerResponse>("customers/auth/me").await {
            Ok(response) => Ok(response.customer),
            Err(ApiError::Status { status: 401, .. }) | Err(ApiError::Status { status: 403, .. }) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait::async_trait]
impl EvaluationService for HttpEvaluationClient {
    async fn create_evaluation(
        &self,
        request: &CreateEvaluationRequest,
    ) -> Result<EvaluationSlot, ApiError> {
        info!(
            "Creating evaluation slot (prompt={}, question={})",
            request.prompt_uuid, request.question_uuid
        );

        let response = self
            .authorize(self.client.post(self.url("evaluation/create")))
            .json(request)
            .send()
            .await?;

        read_json(response).await
    }

    async fn submit(&self, submission: &Submission) -> Result<SubmitReceipt, ApiError> {
        let kind = submission.artifact.kind();
        let targeting_score = submission.targeting_score.to_string();
        let time_taken = submission.time_taken_secs.to_string();

        let request = self
            .authorize(self.client.post(self.url(&format!("evaluation/submit/{}", kind.slug()))))
            .query(&[
                ("evaluationUUID", submission.evaluation_uuid.as_str()),
                ("targetingScore", targeting_score.as_str()),
                ("timeTaken", time_taken.as_str()),
            ])
            .timeout(self.submit_timeout);

        let request = match &submission.artifact {
            Artifact::Audio(audio) => {
                let part = Part::bytes(audio.bytes.clone())
                    .file_name(audio.file_name())
                    .mime_str(&audio.mime_type)
                    .map_err(|e| ApiError::Transport(format!("invalid audio MIME type: {e}")))?;
                request.multipart(Form::new().part("audio", part))
            }
            Artifact::Text(text) => request.json(&serde_json::json!({ "text": text })),
        };

        info!(
            "Submitting {} response (evaluation={}, timeTaken={}s)",
            kind, submission.evaluation_uuid, submission.time_taken_secs
        );

        let response = request.send().await?;
        let receipt: Envelope<SubmitReceipt> = read_json(response).await?;
        Ok(receipt.into_inner())
    }

    async fn fetch_result(
        &self,
        prompt_uuid: &str,
        evaluation_uuid: Option<&str>,
    ) -> Result<EvaluationResult, ApiError> {
        let mut request = self
            .authorize(self.client.get(self.url(&format!("evaluation/results/{prompt_uuid}"))));
        if let Some(evaluation_uuid) = evaluation_uuid {
            request = request.query(&[("evaluationUUID", evaluation_uuid)]);
        }

        let response = request.send().await?;
        read_json(response).await
    }
}

#[async_trait::async_trait]
impl PromptCatalog for HttpEvaluationClient {
    async fn prompts(&self, kind: CaptureKind) -> Result<Vec<PromptListing>, ApiError> {
        HttpEvaluationClient::prompts(self, kind).await
    }

    async fn history(&self, kind: CaptureKind) -> Result<Vec<EvaluationResult>, ApiError> {
        HttpEvaluationClient::history(self, kind).await
    }
}

/// Decode a success body, or turn an error body into `ApiError::Status`
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.display_message())
            .or_else(|| {
                let text = String::from_utf8_lossy(&body).trim().to_string();
                (!text.is_empty()).then_some(text)
            })
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

        warn!("Scoring backend returned {}: {}", status, message);
        return Err(ApiError::Status {
            status: status.as_u16(),
            message,
        });
    }

    Ok(serde_json::from_slice(&body)?)
}
