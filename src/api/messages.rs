use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::capture::Artifact;

// ============================================================================
// Catalog
// ============================================================================

/// A practice prompt with its time budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    #[serde(default)]
    pub id: i64,
    pub prompt_uuid: String,
    pub name: String,
    #[serde(default)]
    pub name_prefix: String,
    #[serde(default)]
    pub short_description: Option<String>,
    /// Anonymous users may not attempt prompts with this flag (sent as bool or 0/1)
    #[serde(default, deserialize_with = "de_flag")]
    pub is_required_auth: bool,
    /// Seconds
    #[serde(default, deserialize_with = "de_seconds")]
    pub preparation_time: u32,
    /// Seconds
    #[serde(default, deserialize_with = "de_seconds")]
    pub response_time: u32,
}

/// The question variant assigned to an attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub image_path: Option<String>,
}

/// Prompt listing entry: prompt, random question, and the latest evaluation if any
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptListing {
    #[serde(flatten)]
    pub prompt: Prompt,
    pub question: Question,
    #[serde(default)]
    pub evaluation_uuid: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub score: Option<String>,
    #[serde(default)]
    pub status: Option<EvaluationStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationStatus {
    Completed,
    InProgress,
    Cancelled,
}

// ============================================================================
// Evaluation lifecycle
// ============================================================================

/// POST /evaluation/create
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEvaluationRequest {
    #[serde(rename = "promptUUID")]
    pub prompt_uuid: String,
    #[serde(rename = "questionUUID")]
    pub question_uuid: String,
    #[serde(rename = "languageId")]
    pub language_id: u32,
}

/// Evaluation record returned when a slot is created
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationSlot {
    pub evaluation_uuid: String,
    /// Permitted response time in seconds (the backend sends a string)
    #[serde(default, deserialize_with = "de_opt_seconds")]
    pub response_time: Option<u32>,
    #[serde(default)]
    pub status: Option<EvaluationStatus>,
}

/// A captured response ready to be scored
#[derive(Debug, Clone)]
pub struct Submission {
    /// Slot the response belongs to
    pub evaluation_uuid: String,
    pub targeting_score: u8,
    /// Elapsed seconds of actual capture
    pub time_taken_secs: u32,
    pub artifact: Artifact,
}

/// Confirmation of a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    #[serde(rename = "evaluationUUID", alias = "evaluationUuid")]
    pub evaluation_uuid: String,
}

/// Responses may come bare or wrapped as `{data, message}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Wrapped {
        data: T,
        #[serde(default)]
        message: Option<String>,
    },
    Bare(T),
}

impl<T> Envelope<T> {
    pub fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data, .. } => data,
            Envelope::Bare(data) => data,
        }
    }
}

/// GET /evaluation/results/:promptUUID
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub evaluation_uuid: String,
    #[serde(default)]
    pub session_id: Option<String>,
    /// CLB band, e.g. "CLB 7"
    #[serde(default, deserialize_with = "de_opt_string")]
    pub score: Option<String>,
    #[serde(default)]
    pub status: Option<EvaluationStatus>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub feedback: Vec<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub tips: Vec<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub vocabulary_examples: Vec<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub fluency_comment: Vec<String>,
    #[serde(default)]
    pub ideal_response_summary: Option<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub sample_responses: Vec<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub response_time: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub targeting_score: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub previous_score: Option<String>,
    #[serde(default)]
    pub is_completed_once: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// GET /evaluation/analytics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomerAnalytics {
    pub overall_avg_score: f64,
    pub score_change_percentage: f64,
    pub avg_speaking_score: f64,
    pub avg_writing_score: f64,
    #[serde(rename = "avgSecondsLast6Days")]
    pub avg_seconds_last_6_days: f64,
}

// ============================================================================
// Identity
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub customer_uuid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// GET /customers/auth/me
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentCustomerResponse {
    pub customer: Option<Customer>,
}

// ============================================================================
// Errors
// ============================================================================

/// Error body: `{message}` or a 422 `{errors: {field: [msg, ..]}}`
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Option<serde_json::Map<String, Value>>,
}

impl ErrorBody {
    /// First validation message if present, else the top-level message
    pub fn display_message(&self) -> Option<String> {
        let first_error = self
            .errors
            .as_ref()
            .and_then(|errors| errors.values().next())
            .and_then(|value| match value {
                Value::String(s) => Some(s.clone()),
                Value::Array(items) => {
                    let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
                    (!parts.is_empty()).then(|| parts.join(", "))
                }
                _ => None,
            });

        first_error.or_else(|| self.message.clone())
    }
}

// ============================================================================
// Lenient field decoding
// ============================================================================

fn de_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        Value::String(s) => matches!(s.as_str(), "1" | "true"),
        _ => false,
    })
}

fn seconds_from(value: Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_f64().map(|f| f.max(0.0) as u32),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.max(0.0) as u32),
        _ => None,
    }
}

fn de_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    Ok(seconds_from(Value::deserialize(deserializer)?).unwrap_or(0))
}

fn de_opt_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    Ok(seconds_from(Value::deserialize(deserializer)?))
}

fn de_opt_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn de_string_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Value::String(s) if !s.is_empty() => vec![s],
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_listing_deserialization() {
        let json = r#"{
            "id": 3,
            "namePrefix": "Task 1",
            "name": "Giving Advice",
            "isRequiredAuth": 1,
            "preparationTime": 30,
            "responseTime": 90,
            "promptUuid": "p-1",
            "question": {"name": "A friend is moving", "uuid": "q-9", "imagePath": null},
            "evaluationUuid": "e-4",
            "score": 7,
            "status": "COMPLETED"
        }"#;

        let listing: PromptListing = serde_json::from_str(json).unwrap();
        assert_eq!(listing.prompt.prompt_uuid, "p-1");
        assert!(listing.prompt.is_required_auth);
        assert_eq!(listing.prompt.response_time, 90);
        assert_eq!(listing.question.uuid, "q-9");
        assert_eq!(listing.score.as_deref(), Some("7"));
        assert_eq!(listing.status, Some(EvaluationStatus::Completed));
    }

    #[test]
    fn test_slot_response_time_is_parsed_from_string() {
        let slot: EvaluationSlot =
            serde_json::from_str(r#"{"evaluationUuid": "e-1", "responseTime": "60"}"#).unwrap();
        assert_eq!(slot.response_time, Some(60));

        let slot: EvaluationSlot =
            serde_json::from_str(r#"{"evaluationUuid": "e-1", "responseTime": null}"#).unwrap();
        assert_eq!(slot.response_time, None);
    }

    #[test]
    fn test_create_request_field_names() {
        let request = CreateEvaluationRequest {
            prompt_uuid: "p".into(),
            question_uuid: "q".into(),
            language_id: 1,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["promptUUID"], "p");
        assert_eq!(json["questionUUID"], "q");
        assert_eq!(json["languageId"], 1);
    }

    #[test]
    fn test_receipt_accepts_wrapped_and_bare() {
        let wrapped: Envelope<SubmitReceipt> = serde_json::from_str(
            r#"{"data": {"evaluationUUID": "e-7"}, "message": "Submitted"}"#,
        )
        .unwrap();
        assert_eq!(wrapped.into_inner().evaluation_uuid, "e-7");

        let bare: Envelope<SubmitReceipt> =
            serde_json::from_str(r#"{"evaluationUUID": "e-8"}"#).unwrap();
        assert_eq!(bare.into_inner().evaluation_uuid, "e-8");
    }

    #[test]
    fn test_validation_error_message() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"message": "Invalid", "errors": {"text": ["too short", "too plain"]}}"#,
        )
        .unwrap();
        assert_eq!(body.display_message().as_deref(), Some("too short, too plain"));

        let body: ErrorBody = serde_json::from_str(r#"{"message": "Unauthorized"}"#).unwrap();
        assert_eq!(body.display_message().as_deref(), Some("Unauthorized"));
    }

    #[test]
    fn test_result_tolerates_null_lists() {
        let result: EvaluationResult = serde_json::from_str(
            r#"{"evaluationUuid": "e-1", "score": "CLB 8", "feedback": null, "tips": ["Slow down"]}"#,
        )
        .unwrap();
        assert_eq!(result.score.as_deref(), Some("CLB 8"));
        assert!(result.feedback.is_empty());
        assert_eq!(result.tips, vec!["Slow down".to_string()]);
    }
}
