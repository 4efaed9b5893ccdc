//! Caller resolution.
//!
//! Sign-in itself happens upstream. An auth proxy forwards the signed-in user
//! id in a trusted header; anonymous editors carry their edit token in a
//! cookie.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use sha2::{Digest, Sha256};
use std::convert::Infallible;
use std::sync::Arc;

use crate::state::AppState;

pub const EDIT_TOKEN_COOKIE: &str = "linkhub_edit_token";
pub const DEFAULT_USER_HEADER: &str = "x-linkhub-user";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Authenticated {
        user_id: String,
        edit_token: Option<String>,
    },
    Anonymous {
        edit_token: Option<String>,
    },
}

impl Caller {
    pub fn user(user_id: impl Into<String>) -> Self {
        Caller::Authenticated {
            user_id: user_id.into(),
            edit_token: None,
        }
    }

    pub fn anonymous(edit_token: Option<String>) -> Self {
        Caller::Anonymous { edit_token }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Caller::Authenticated { user_id, .. } => Some(user_id),
            Caller::Anonymous { .. } => None,
        }
    }

    pub fn edit_token(&self) -> Option<&str> {
        match self {
            Caller::Authenticated { edit_token, .. } | Caller::Anonymous { edit_token } => {
                edit_token.as_deref()
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Caller::Authenticated { .. })
    }
}

pub trait IdentityProvider: Send + Sync + 'static {
    fn resolve_caller(&self, headers: &HeaderMap) -> Caller;
}

/// Trusts a user-id header injected by the fronting auth proxy.
#[derive(Debug, Clone)]
pub struct HeaderIdentityProvider {
    user_header: String,
}

impl HeaderIdentityProvider {
    pub fn new(user_header: impl Into<String>) -> Self {
        Self {
            user_header: user_header.into().to_ascii_lowercase(),
        }
    }
}

impl Default for HeaderIdentityProvider {
    fn default() -> Self {
        Self::new(DEFAULT_USER_HEADER)
    }
}

impl IdentityProvider for HeaderIdentityProvider {
    fn resolve_caller(&self, headers: &HeaderMap) -> Caller {
        let edit_token = cookie(headers, EDIT_TOKEN_COOKIE);
        let user_id = headers
            .get(self.user_header.as_str())
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty());

        match user_id {
            Some(user_id) => Caller::Authenticated {
                user_id: user_id.to_string(),
                edit_token,
            },
            None => Caller::Anonymous { edit_token },
        }
    }
}

impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(state.identity.resolve_caller(&parts.headers))
    }
}

pub fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

// Only the digest of an edit token is stored
pub fn hash_edit_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn edit_token_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        EDIT_TOKEN_COOKIE,
        token,
        60 * 60 * 24 * 30
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn resolves_user_and_token() {
        let provider = HeaderIdentityProvider::default();
        let mut headers = HeaderMap::new();
        assert_eq!(provider.resolve_caller(&headers), Caller::anonymous(None));

        headers.insert(
            "cookie",
            HeaderValue::from_static("theme=dark; linkhub_edit_token=abc123"),
        );
        assert_eq!(
            provider.resolve_caller(&headers),
            Caller::anonymous(Some("abc123".into()))
        );

        headers.insert(DEFAULT_USER_HEADER, HeaderValue::from_static("user-1"));
        let caller = provider.resolve_caller(&headers);
        assert_eq!(caller.user_id(), Some("user-1"));
        assert_eq!(caller.edit_token(), Some("abc123"));
    }

    #[test]
    fn token_digest_is_stable() {
        assert_eq!(hash_edit_token("t"), hash_edit_token("t"));
        assert_ne!(hash_edit_token("t"), hash_edit_token("u"));
        assert_eq!(hash_edit_token("t").len(), 64);
    }
}
