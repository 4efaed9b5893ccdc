use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use std::sync::Arc;

use crate::error::AppError;
use crate::identity::Caller;
use crate::models::{Link, LinkRequest, ReorderRequest};
use crate::rate_limit::ActionClass;
use crate::state::AppState;
use crate::store::{Collection, NewLink};

fn validate_link(payload: &LinkRequest) -> Result<(String, String), AppError> {
    let title = payload.title.trim();
    let url = payload.url.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("Title is required".to_string()));
    }
    let host = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    if !host.is_some_and(|rest| !rest.is_empty()) {
        return Err(AppError::BadRequest(
            "URL must start with http:// or https://".to_string(),
        ));
    }
    Ok((title.to_string(), url.to_string()))
}

pub async fn create_link(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(page_id): Path<String>,
    Json(payload): Json<LinkRequest>,
) -> Result<(StatusCode, Json<Link>), AppError> {
    if let Some(user_id) = caller.user_id() {
        state
            .rate_limiter
            .check_action(ActionClass::AuthCreateLink, user_id)?;
    }

    let (title, url) = validate_link(&payload)?;
    let link = state
        .store
        .create_link(
            &caller,
            NewLink {
                page_id,
                title,
                url,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(link)))
}

pub async fn update_link(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<LinkRequest>,
) -> Result<Json<Link>, AppError> {
    let (title, url) = validate_link(&payload)?;
    Ok(Json(state.store.update_link(&caller, &id, title, url).await?))
}

pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.store.delete_link(&caller, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reorder_links(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(page_id): Path<String>,
    Json(payload): Json<ReorderRequest>,
) -> Result<StatusCode, AppError> {
    state
        .store
        .apply_order_batch(&caller, &Collection::Links { page_id }, &payload.items)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
