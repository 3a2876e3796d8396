pub mod client;
pub mod error;
pub mod messages;

pub use client::{EvaluationService, HttpEvaluationClient, PromptCatalog};
pub use error::ApiError;
pub use messages::{
    CreateEvaluationRequest, Customer, CustomerAnalytics, EvaluationResult, EvaluationSlot,
    EvaluationStatus, Prompt, PromptListing, Question, Submission, SubmitReceipt,
};
