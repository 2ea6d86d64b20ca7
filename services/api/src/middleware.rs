//! Request middleware: rate limiting, session loading and CSRF handling

use std::net::SocketAddr;

use axum::{
    body::{Body, to_bytes},
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, Method, header::CONTENT_TYPE},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::SignedCookieJar;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    csrf::{CSRF_FIELD, CSRF_HEADER},
    error::ApiError,
    rate_limiter::RateLimitStatus,
    session::{SESSION_COOKIE, Session},
    state::AppState,
};

/// Paths that never require a CSRF token
pub const CSRF_EXEMPT_PATHS: &[&str] = &["/health", "/api/session"];

/// Largest body buffered while looking for a `_csrf` field
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Fixed-window limit per client IP
pub async fn rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = client_ip(&req);

    match state.rate_limiter.check(&ip).await {
        RateLimitStatus::Allowed { .. } => Ok(next.run(req).await),
        RateLimitStatus::Limited { retry_after } => {
            warn!("Rate limit exceeded for {}", ip);
            Err(ApiError::TooManyRequests {
                retry_after_secs: retry_after.as_secs().max(1),
            })
        }
    }
}

fn client_ip(req: &Request) -> String {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    req.headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Resolve the signed session cookie into a [`Session`] extension
pub async fn load_session(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        match state.sessions.get(cookie.value()).await {
            Ok(Some(session)) => {
                req.extensions_mut().insert(session);
            }
            Ok(None) => debug!("Unknown or expired session cookie"),
            Err(e) => warn!("Failed to load session: {}", e),
        }
    }

    next.run(req).await
}

/// Make sure a session has a live CSRF token and expose it in `X-CSRF-Token`
pub async fn add_csrf_token(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(session_id) = session_id(&req) else {
        return next.run(req).await;
    };

    state.csrf.issue_or_reuse(&session_id).await;
    let mut response = next.run(req).await;

    // The handler may have replaced or revoked the token
    if let Some(token) = state.csrf.current_token(&session_id).await {
        if let Ok(value) = HeaderValue::from_str(&token) {
            response.headers_mut().insert(CSRF_HEADER, value);
        }
    }

    response
}

/// Reject state-changing requests without a valid CSRF token
pub async fn csrf_protection(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if is_safe_method(req.method()) || CSRF_EXEMPT_PATHS.contains(&req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let session_id = session_id(&req)
        .ok_or_else(|| ApiError::unauthorized("Session required for CSRF protection"))?;

    let (token, req) = match header_token(&req) {
        Some(token) => (Some(token), req),
        None => body_token(req).await?,
    };
    let token = token.ok_or_else(|| ApiError::forbidden("CSRF token required"))?;

    if !state.csrf.validate_token(&session_id, &token).await {
        warn!("Invalid CSRF token for {} {}", req.method(), req.uri().path());
        return Err(ApiError::forbidden("Invalid CSRF token"));
    }

    Ok(next.run(req).await)
}

fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn session_id(req: &Request) -> Option<String> {
    req.extensions().get::<Session>().map(|s| s.id.clone())
}

fn header_token(req: &Request) -> Option<String> {
    req.headers()
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Read `_csrf` from a JSON or form body, handing back an equivalent request
async fn body_token(req: Request) -> Result<(Option<String>, Request), ApiError> {
    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| ApiError::BadRequest("Request body too large".to_string()))?;

    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    let token = if content_type.starts_with("application/json") {
        serde_json::from_slice::<Value>(&bytes).ok().and_then(|body| {
            body.get(CSRF_FIELD)
                .and_then(Value::as_str)
                .map(str::to_string)
        })
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let prefix = format!("{}=", CSRF_FIELD);
        std::str::from_utf8(&bytes).ok().and_then(|body| {
            body.split('&')
                .find_map(|pair| pair.strip_prefix(prefix.as_str()))
                .map(str::to_string)
        })
    } else {
        None
    };

    let token = token.filter(|token| !token.is_empty());
    Ok((token, Request::from_parts(parts, Body::from(bytes))))
}
