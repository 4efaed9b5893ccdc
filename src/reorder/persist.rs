use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;
use tracing::warn;

use crate::identity::{Caller, DEFAULT_USER_HEADER, EDIT_TOKEN_COOKIE};
use crate::models::{OrderUpdate, ReorderRequest};
use crate::store::{Collection, PageStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistError {
    #[error("Request failed: {0}")]
    Network(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error("Rejected: {0}")]
    Rejected(String),
}

impl From<StoreError> for PersistError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unauthorized => PersistError::Unauthorized,
            StoreError::NotFound(_) => PersistError::NotFound,
            other => PersistError::Rejected(other.to_string()),
        }
    }
}

/// Where a reorder session sends its batches.
#[async_trait]
pub trait OrderPersistence: Send + Sync {
    async fn persist(&self, items: Vec<OrderUpdate>) -> Result<(), PersistError>;
}

// Applies batches straight to a store, for callers living in the same process
pub struct StoreOrderPersistence {
    store: Arc<dyn PageStore>,
    caller: Caller,
    collection: Collection,
}

impl StoreOrderPersistence {
    pub fn new(store: Arc<dyn PageStore>, caller: Caller, collection: Collection) -> Self {
        Self {
            store,
            caller,
            collection,
        }
    }
}

#[async_trait]
impl OrderPersistence for StoreOrderPersistence {
    async fn persist(&self, items: Vec<OrderUpdate>) -> Result<(), PersistError> {
        self.store
            .apply_order_batch(&self.caller, &self.collection, &items)
            .await
            .map_err(PersistError::from)
    }
}

/// Sends batches to the order endpoints of a running server.
pub struct HttpOrderClient {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
}

impl HttpOrderClient {
    pub fn new(client: reqwest::Client, base_url: &str, collection: &Collection) -> Self {
        let base_url = base_url.trim_end_matches('/');
        let url = match collection {
            Collection::Pages => format!("{}/api/pages/order", base_url),
            Collection::Links { page_id } => format!("{}/api/pages/{}/links/order", base_url, page_id),
        };
        Self {
            client,
            url,
            headers: HeaderMap::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn with_user(self, user_id: &str) -> Result<Self, PersistError> {
        self.with_user_header(DEFAULT_USER_HEADER, user_id)
    }

    /// For servers started with a custom `--user-header`.
    pub fn with_user_header(mut self, header: &str, user_id: &str) -> Result<Self, PersistError> {
        let name = HeaderName::from_bytes(header.to_ascii_lowercase().as_bytes())
            .map_err(|e| PersistError::Rejected(e.to_string()))?;
        let value = HeaderValue::from_str(user_id).map_err(|e| PersistError::Rejected(e.to_string()))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn with_edit_token(mut self, token: &str) -> Result<Self, PersistError> {
        let value = HeaderValue::from_str(&format!("{}={}", EDIT_TOKEN_COOKIE, token))
            .map_err(|e| PersistError::Rejected(e.to_string()))?;
        self.headers.insert(COOKIE, value);
        Ok(self)
    }
}

#[async_trait]
impl OrderPersistence for HttpOrderClient {
    async fn persist(&self, items: Vec<OrderUpdate>) -> Result<(), PersistError> {
        let res = self
            .client
            .put(&self.url)
            .headers(self.headers.clone())
            .json(&ReorderRequest { items })
            .send()
            .await
            .map_err(|e| PersistError::Network(e.to_string()))?;

        let status = res.status();
        if status.is_success() {
            return Ok(());
        }
        warn!(url = %self.url, %status, "order batch refused");
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(PersistError::Unauthorized),
            StatusCode::NOT_FOUND => Err(PersistError::NotFound),
            _ => {
                let body = res.text().await.unwrap_or_default();
                Err(PersistError::Rejected(format!("{}: {}", status, body)))
            }
        }
    }
}
