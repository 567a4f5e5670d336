//! Access-token caching.
//!
//! Provides a thread-safe, async-aware token cache with:
//! - Refresh margin to avoid token expiry during requests
//! - Single-flight refresh under a write lock
//! - Fallback to the existing token while it is still usable

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{AuthError, AuthResult};

/// Refresh tokens this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Used when the provider reports an expiry we cannot convert.
const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

/// OAuth scope for Cloud Storage object access.
pub const STORAGE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";

/// OAuth scope for Firestore (served by the Datastore API).
pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }

    fn is_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Map a provider's wall-clock expiry onto the monotonic clock. An expiry in
/// the past maps to now, so the next call refreshes.
fn monotonic_expiry(expires_at: DateTime<Utc>) -> Instant {
    let remaining = expires_at - Utc::now();
    if remaining <= chrono::Duration::zero() {
        return Instant::now();
    }
    Instant::now() + remaining.to_std().unwrap_or(TOKEN_DEFAULT_TTL)
}

fn valid_token(slot: &Option<CachedToken>) -> Option<String> {
    slot.as_ref()
        .filter(|cached| cached.is_valid())
        .map(|cached| cached.access_token.clone())
}

/// Token cache bound to one provider and one scope.
pub struct TokenCache {
    auth: Arc<dyn TokenProvider>,
    scope: &'static str,
    slot: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(auth: Arc<dyn TokenProvider>, scope: &'static str) -> Self {
        Self {
            auth,
            scope,
            slot: RwLock::new(None),
        }
    }

    pub fn scope(&self) -> &'static str {
        self.scope
    }

    /// Drop the cached token, forcing a refresh on the next call.
    pub async fn invalidate(&self) {
        self.slot.write().await.take();
    }

    /// Bearer token for this cache's scope.
    ///
    /// Readers share the cached token. Only the task holding the write lock
    /// asks the provider, and it re-checks the slot first since another task
    /// may have refreshed while it waited.
    pub async fn get_token(&self) -> AuthResult<String> {
        if let Some(token) = valid_token(&*self.slot.read().await) {
            return Ok(token);
        }

        let mut slot = self.slot.write().await;
        if let Some(token) = valid_token(&slot) {
            return Ok(token);
        }

        let fetched = self.auth.token(&[self.scope]).await;
        match fetched {
            Ok(token) => {
                let access_token = token.as_str().to_string();
                *slot = Some(CachedToken {
                    access_token: access_token.clone(),
                    expires_at: monotonic_expiry(token.expires_at()),
                });
                debug!(scope = self.scope, "Refreshed access token");
                Ok(access_token)
            }
            Err(e) => match slot.as_ref().filter(|cached| cached.is_usable()) {
                Some(stale) => {
                    warn!(scope = self.scope, "Token refresh failed, reusing current token: {}", e);
                    Ok(stale.access_token.clone())
                }
                None => Err(AuthError::Token(e.to_string())),
            },
        }
    }
}
