use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post, put},
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    attach_page, create_link, create_page, delete_link, delete_page, health_handler,
    list_pages, metrics_handler, reorder_links, reorder_pages, update_link, update_page,
    view_page,
};
use crate::middleware::{api_rate_limit, block_suspicious_agents, security_headers};
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    // GET /api/pages/{id} takes the page alias; the other verbs take its id
    let api = Router::new()
        .route("/api/pages", post(create_page).get(list_pages))
        .route("/api/pages/order", put(reorder_pages))
        .route(
            "/api/pages/{id}",
            get(view_page).patch(update_page).delete(delete_page),
        )
        .route("/api/pages/{id}/attach", post(attach_page))
        .route("/api/pages/{id}/links", post(create_link))
        .route("/api/pages/{id}/links/order", put(reorder_links))
        .route("/api/links/{id}", patch(update_link).delete(delete_link))
        .layer(middleware::from_fn_with_state(state.clone(), api_rate_limit));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(api)
        .layer(middleware::from_fn(block_suspicious_agents))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}
