//! Middleware for session context and security headers

use crate::handlers::AppState;
use crate::models::{Role, SessionContext};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Build the caller's session from headers set by the authenticating proxy
pub fn session_from_headers(headers: &HeaderMap) -> Result<SessionContext, &'static str> {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or("Not authenticated")?;

    let role: Role = headers
        .get(USER_ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or("Not authenticated")?
        .parse()
        .map_err(|_| "Unknown role")?;

    Ok(SessionContext {
        user_id: user_id.to_string(),
        role,
    })
}

/// Session extracted by middleware, available via Extension<SessionContext>
pub async fn require_session(mut request: Request<Body>, next: Next) -> Response {
    let session = match session_from_headers(request.headers()) {
        Ok(s) => s,
        Err(message) => {
            tracing::warn!("Rejected request to {}: {}", request.uri().path(), message);
            return (
                StatusCode::UNAUTHORIZED,
                axum::Json(json!({"success": false, "error": message})),
            )
                .into_response();
        }
    };

    request.extensions_mut().insert(session);
    next.run(request).await
}

/// Security headers middleware
pub async fn security_headers(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));
    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    if state.is_production {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000; includeSubDomains"),
        );
    }

    response
}
