//! Persistence collaborator for pages and links.

mod memory;

pub use memory::MemoryPageStore;

use async_trait::async_trait;

use crate::identity::Caller;
use crate::models::{Link, OrderUpdate, Page};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Alias already taken")]
    AliasTaken,

    #[error("Page is already owned")]
    AlreadyOwned,

    #[error("Constraint violated: {0}")]
    Constraint(String),
}

/// An ordered collection whose members can be reordered together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collection {
    /// Links of one page.
    Links { page_id: String },
    /// Pages of the calling user.
    Pages,
}

#[derive(Debug, Clone)]
pub struct NewPage {
    pub alias: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub owner_id: Option<String>,
    pub edit_token_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct PageChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewLink {
    pub page_id: String,
    pub title: String,
    pub url: String,
}

#[async_trait]
pub trait PageStore: Send + Sync {
    async fn create_page(&self, page: NewPage) -> Result<Page, StoreError>;

    async fn page_by_id(&self, id: &str) -> Result<Page, StoreError>;

    async fn page_by_alias(&self, alias: &str) -> Result<Page, StoreError>;

    /// Pages the caller can edit, by `order` then creation time.
    async fn pages_for(&self, caller: &Caller) -> Result<Vec<Page>, StoreError>;

    async fn update_page(
        &self,
        caller: &Caller,
        id: &str,
        changes: PageChanges,
    ) -> Result<Page, StoreError>;

    async fn delete_page(&self, caller: &Caller, id: &str) -> Result<(), StoreError>;

    /// Hand an ownerless page to the signed-in caller.
    async fn attach_page(&self, caller: &Caller, id: &str) -> Result<Page, StoreError>;

    async fn create_link(&self, caller: &Caller, link: NewLink) -> Result<Link, StoreError>;

    async fn update_link(
        &self,
        caller: &Caller,
        id: &str,
        title: String,
        url: String,
    ) -> Result<Link, StoreError>;

    async fn delete_link(&self, caller: &Caller, id: &str) -> Result<(), StoreError>;

    /// Ids of the collection's members if the caller owns it.
    async fn find_owned_collection(
        &self,
        caller: &Caller,
        collection: &Collection,
    ) -> Result<Vec<String>, StoreError>;

    /// Apply every update or none of them.
    async fn apply_order_batch(
        &self,
        caller: &Caller,
        collection: &Collection,
        items: &[OrderUpdate],
    ) -> Result<(), StoreError>;
}
