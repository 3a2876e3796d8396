//! HTTP API server for a local practice UI
//!
//! This module provides a REST API over the session controllers, one per prompt:
//! - GET /prompts/:kind - Load speaking or writing prompts into the catalog
//! - POST /sessions/:prompt_id/{begin,stop,retake,submit} - Drive the attempt
//! - PUT /sessions/:prompt_id/text - Type into a writing response
//! - GET /sessions/:prompt_id[/artifact] - Snapshot or captured response
//! - DELETE /sessions/:prompt_id - Cancel and drop the session
//! - GET /results/:prompt_id - Scored result from the backend
//! - GET /history/:kind - Past scored attempts of one kind
//! - GET /health - Health check

mod error;
mod handlers;
mod routes;
mod state;

pub use error::{ErrorResponse, HttpError};
pub use routes::create_router;
pub use state::{AppState, CatalogEntry, SessionEntry};
