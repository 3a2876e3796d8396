//! Authenticated-access policy
//!
//! The session controller receives an `AccessPolicy` at construction and asks
//! it whether a prompt is locked before starting or submitting an attempt.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::api::{ApiError, Customer, HttpEvaluationClient, Prompt};

#[async_trait::async_trait]
pub trait AccessPolicy: Send + Sync {
    /// True when the current identity may not attempt this prompt
    async fn is_locked(&self, prompt: &Prompt) -> bool;
}

/// Policy that never locks (offline practice, tests)
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAccess;

#[async_trait::async_trait]
impl AccessPolicy for OpenAccess {
    async fn is_locked(&self, _prompt: &Prompt) -> bool {
        false
    }
}

/// Current identity, shared between the policy and whoever signs in/out
#[derive(Debug, Clone, Default)]
pub struct Identity {
    customer: Arc<RwLock<Option<Customer>>>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(customer: Customer) -> Self {
        Self {
            customer: Arc::new(RwLock::new(Some(customer))),
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.customer.read().await.is_some()
    }

    pub async fn customer(&self) -> Option<Customer> {
        self.customer.read().await.clone()
    }

    pub async fn sign_in(&self, customer: Customer) {
        info!("Signed in as {}", customer.customer_uuid);
        *self.customer.write().await = Some(customer);
    }

    pub async fn sign_out(&self) {
        *self.customer.write().await = None;
    }

    /// Re-read the identity from `GET /customers/auth/me`
    pub async fn refresh(&self, client: &HttpEvaluationClient) -> Result<bool, ApiError> {
        let customer = client.current_customer().await?;
        let authenticated = customer.is_some();
        *self.customer.write().await = customer;
        info!("Identity refreshed (authenticated={})", authenticated);
        Ok(authenticated)
    }
}

/// Locks prompts that require an account while the identity is anonymous
#[derive(Debug, Clone, Default)]
pub struct IdentityPolicy {
    identity: Identity,
}

impl IdentityPolicy {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

#[async_trait::async_trait]
impl AccessPolicy for IdentityPolicy {
    async fn is_locked(&self, prompt: &Prompt) -> bool {
        prompt.is_required_auth && !self.identity.is_authenticated().await
    }
}
