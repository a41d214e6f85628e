//! Bearer-token verification seam. Tokens are opaque strings minted by the
//! auth service; the engine's only operation on them is `verify`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use poker_domain::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthIdentity {
    pub user_id: UserId,
    pub username: String,
    pub is_admin: bool,
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// `Some(identity)` for a live token, `None` for anything else.
    async fn verify(&self, token: &str) -> Option<AuthIdentity>;
}

/// Token table for single-process deployments and tests: `issue` plays the
/// auth service's minting role, `verify` is the engine-side lookup.
#[derive(Debug, Default)]
pub struct InMemoryTokenVerifier {
    tokens: Mutex<HashMap<String, AuthIdentity>>,
}

impl InMemoryTokenVerifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, identity: AuthIdentity) -> String {
        let token = Uuid::now_v7().simple().to_string();
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.insert(token.clone(), identity);
        }
        token
    }

    pub fn revoke(&self, token: &str) {
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.remove(token);
        }
    }
}

#[async_trait]
impl TokenVerifier for InMemoryTokenVerifier {
    async fn verify(&self, token: &str) -> Option<AuthIdentity> {
        self.tokens.lock().ok()?.get(token).cloned()
    }
}
