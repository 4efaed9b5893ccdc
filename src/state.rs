use std::sync::Arc;

use crate::identity::{HeaderIdentityProvider, IdentityProvider};
use crate::rate_limit::{RateLimitPolicy, RateLimiter};
use crate::store::{MemoryPageStore, PageStore};

// app's shared state
pub struct AppState {
    pub store: Arc<dyn PageStore>,
    pub rate_limiter: RateLimiter,
    pub identity: Arc<dyn IdentityProvider>,
    pub secure_cookies: bool, // mark edit-token cookies Secure
}

impl AppState {
    pub fn new(
        store: Arc<dyn PageStore>,
        rate_limiter: RateLimiter,
        identity: Arc<dyn IdentityProvider>,
        secure_cookies: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            rate_limiter,
            identity,
            secure_cookies,
        })
    }

    // In-memory store, default policy, header identity
    pub fn in_memory(policy: RateLimitPolicy) -> Arc<Self> {
        Self::new(
            Arc::new(MemoryPageStore::new()),
            RateLimiter::in_memory(policy),
            Arc::new(HeaderIdentityProvider::default()),
            false,
        )
    }
}
