//! Token authentication.

use axum::body::{Body, to_bytes};
use axum::extract::{Query, Request, State};
use axum::http::{HeaderMap, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::warn;

use super::error::HttpError;
use super::form::{FORM_BODY_LIMIT, decode_form, is_form};
use crate::state::AppState;

/// Custom header carrying the token.
pub const TOKEN_HEADER: &str = "x-auth-token";

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Finds the token of a request: `X-Auth-Token`, then `Authorization`
/// (raw or `Bearer`), then the `token` query parameter.
pub fn extract_token(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    let header = |name: &'static str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(token) = header(TOKEN_HEADER) {
        return Some(token.to_string());
    }
    if let Some(value) = header("authorization") {
        let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }
    Query::<TokenQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty())
}

/// Rejects requests without a valid token with `401`.
///
/// When neither header nor query carries a token, a form-encoded body is
/// searched for a `token` field; the body is handed on unchanged.
pub async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let (found, request) = match extract_token(request.headers(), request.uri()) {
        Some(token) => (Some(token), request),
        None if is_form(request.headers()) => match token_from_form(request).await {
            Ok(pair) => pair,
            Err(rejection) => return rejection.into_response(),
        },
        None => (None, request),
    };

    match found {
        Some(token) if state.robot.is_valid_token(&token) => next.run(request).await,
        found => {
            warn!(
                path = %request.uri().path(),
                token_given = found.is_some(),
                "Rejected unauthenticated request"
            );
            HttpError::unauthorized().into_response()
        }
    }
}

async fn token_from_form(request: Request) -> Result<(Option<String>, Request), HttpError> {
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, FORM_BODY_LIMIT)
        .await
        .map_err(|e| HttpError::bad_request(format!("unreadable body: {e}")))?;
    let token = decode_form::<TokenQuery>(bytes.clone())
        .await
        .and_then(|q| q.token)
        .filter(|t| !t.is_empty());
    Ok((token, Request::from_parts(parts, Body::from(bytes))))
}

#[cfg(test)]
mod tests {
    use axum::http::header::AUTHORIZATION;

    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn test_token_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers, &uri("/?token=q")), Some("q".to_string()));

        headers.insert(AUTHORIZATION, "Bearer b".parse().unwrap());
        assert_eq!(extract_token(&headers, &uri("/?token=q")), Some("b".to_string()));

        headers.insert(AUTHORIZATION, "raw".parse().unwrap());
        assert_eq!(extract_token(&headers, &uri("/")), Some("raw".to_string()));

        headers.insert(TOKEN_HEADER, "h".parse().unwrap());
        assert_eq!(extract_token(&headers, &uri("/")), Some("h".to_string()));
    }

    #[test]
    fn test_missing_token() {
        let headers = HeaderMap::new();
        assert_eq!(extract_token(&headers, &uri("/api/send")), None);
        assert_eq!(extract_token(&headers, &uri("/api/send?token=")), None);
        assert_eq!(extract_token(&headers, &uri("/api/send?channel=x")), None);
    }
}
