use axum::{
    extract::{Request, State},
    http::{HeaderValue, Method, header::USER_AGENT},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use crate::error::AppError;
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL};
use crate::rate_limit::{ActionClass, client_identifier};
use crate::state::AppState;

const SUSPICIOUS_AGENTS: [&str; 7] = [
    "bot",
    "crawler",
    "spider",
    "scraper",
    "curl",
    "wget",
    "python-requests",
];
const ALLOWED_BOTS: [&str; 2] = ["Googlebot", "Bingbot"];

// General API budget per client, plus request metrics
pub async fn api_rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    REQUEST_TOTAL.inc();
    let ip = client_identifier(request.headers());
    if let Err(exceeded) = state.rate_limiter.check_action(ActionClass::GeneralApi, &ip) {
        warn!(ip = %ip, retry_after = exceeded.retry_after_secs, "Rate limit exceeded");
        return AppError::RateLimited(exceeded).into_response();
    }

    let start_time = Instant::now();
    let response = next.run(request).await;
    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
    response
}

pub fn is_suspicious_agent(user_agent: &str) -> bool {
    let lowered = user_agent.to_lowercase();
    SUSPICIOUS_AGENTS.iter().any(|agent| lowered.contains(agent))
        && !ALLOWED_BOTS.iter().any(|bot| user_agent.contains(bot))
}

// Scripted clients may read but not write
pub async fn block_suspicious_agents(request: Request, next: Next) -> Response {
    let mutating = [Method::POST, Method::PUT, Method::PATCH, Method::DELETE]
        .contains(request.method());
    if mutating {
        let user_agent = request
            .headers()
            .get(USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default();
        if is_suspicious_agent(user_agent) {
            warn!(user_agent, "Blocked suspicious user agent");
            return AppError::Forbidden.into_response();
        }
    }
    next.run(request).await
}

pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert("x-xss-protection", HeaderValue::from_static("1; mode=block"));
    headers.insert(
        "referrer-policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        "permissions-policy",
        HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
    );
    // JSON only, nothing to load or embed
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    response
}
