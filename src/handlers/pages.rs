use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::identity::{Caller, edit_token_cookie, hash_edit_token};
use crate::models::{CreatePageRequest, Page, ReorderRequest, UpdatePageRequest};
use crate::rate_limit::{ActionClass, client_identifier};
use crate::state::AppState;
use crate::store::{Collection, NewPage, PageChanges};

const ALIAS_MIN: usize = 3;
const ALIAS_MAX: usize = 50;

// Latin letters, digits, hyphen and underscore only
pub fn validate_alias(alias: &str) -> Result<(), AppError> {
    let len = alias.chars().count();
    if len < ALIAS_MIN {
        return Err(AppError::BadRequest(format!(
            "Alias must be at least {ALIAS_MIN} characters"
        )));
    }
    if len > ALIAS_MAX {
        return Err(AppError::BadRequest(format!(
            "Alias must be at most {ALIAS_MAX} characters"
        )));
    }
    if !alias
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::BadRequest(
            "Alias can only contain Latin letters, digits, hyphens, and underscores".to_string(),
        ));
    }
    Ok(())
}

pub async fn create_page(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    headers: HeaderMap,
    Json(payload): Json<CreatePageRequest>,
) -> Result<Response, AppError> {
    match caller.user_id() {
        Some(user_id) => state
            .rate_limiter
            .check_action(ActionClass::AuthCreatePage, user_id)?,
        None => state
            .rate_limiter
            .check_action(ActionClass::AnonCreatePage, &client_identifier(&headers))?,
    }

    // custom aliases are for signed-in users; everyone else gets a UUID
    let requested = payload
        .alias
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty() && caller.is_authenticated());
    let alias = match requested {
        Some(alias) => {
            validate_alias(alias)?;
            alias.to_string()
        }
        None => Uuid::new_v4().to_string(),
    };

    let edit_token = Uuid::new_v4().to_string();
    let page = state
        .store
        .create_page(NewPage {
            alias,
            title: payload.title,
            description: payload.description,
            owner_id: caller.user_id().map(str::to_string),
            edit_token_hash: hash_edit_token(&edit_token),
        })
        .await?;
    info!(page_id = %page.id, alias = %page.alias, owned = page.owner_id.is_some(), "page created");

    let mut response = (StatusCode::CREATED, Json(page)).into_response();
    if !caller.is_authenticated() {
        let cookie = HeaderValue::from_str(&edit_token_cookie(&edit_token, state.secure_cookies))
            .map_err(|e| AppError::Internal(e.to_string()))?;
        response.headers_mut().insert(SET_COOKIE, cookie);
    }
    Ok(response)
}

pub async fn list_pages(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<Vec<Page>>, AppError> {
    if !caller.is_authenticated() && caller.edit_token().is_none() {
        return Err(AppError::Unauthorized);
    }
    Ok(Json(state.store.pages_for(&caller).await?))
}

// Public view; private pages are visible to their editors only
pub async fn view_page(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(alias): Path<String>,
) -> Result<Json<Page>, AppError> {
    let page = state.store.page_by_alias(&alias).await?;
    if !page.is_public {
        let collection = Collection::Links {
            page_id: page.id.clone(),
        };
        if state
            .store
            .find_owned_collection(&caller, &collection)
            .await
            .is_err()
        {
            return Err(AppError::NotFound("Page"));
        }
    }
    Ok(Json(page))
}

pub async fn update_page(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<UpdatePageRequest>,
) -> Result<Json<Page>, AppError> {
    let changes = PageChanges {
        title: payload.title,
        description: payload.description,
        is_public: payload.is_public,
    };
    Ok(Json(state.store.update_page(&caller, &id, changes).await?))
}

pub async fn delete_page(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.store.delete_page(&caller, &id).await?;
    info!(page_id = %id, "page deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn attach_page(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<Page>, AppError> {
    Ok(Json(state.store.attach_page(&caller, &id).await?))
}

pub async fn reorder_pages(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(payload): Json<ReorderRequest>,
) -> Result<StatusCode, AppError> {
    state
        .store
        .apply_order_batch(&caller, &Collection::Pages, &payload.items)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
