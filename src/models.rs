use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Link shown on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub page_id: String,
    pub title: String,
    pub url: String,
    pub order: u32,
    pub created_at: DateTime<Utc>,
}

// Page with its links, links sorted for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub alias: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_public: bool,
    pub owner_id: Option<String>,
    #[serde(skip)]
    pub edit_token_hash: String,
    pub order: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub links: Vec<Link>,
}

/// One row of an order batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub id: String,
    pub order: u32,
}

// Create page request (alias only honoured for signed-in users)
#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct CreatePageRequest {
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct UpdatePageRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LinkRequest {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReorderRequest {
    pub items: Vec<OrderUpdate>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ErrorBody {
    pub error: String,
}
