//! `application/x-www-form-urlencoded` bodies.

use axum::Form;
use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method};
use serde::de::DeserializeOwned;

/// Largest body buffered to look for form fields.
pub const FORM_BODY_LIMIT: usize = 1024 * 1024;

const FORM_MIME: &str = "application/x-www-form-urlencoded";

/// Returns whether the request declares a form-encoded body.
pub fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().starts_with(FORM_MIME))
}

/// Decodes an already-buffered form body. `None` when it does not parse.
pub async fn decode_form<T: DeserializeOwned>(body: Bytes) -> Option<T> {
    let request = Request::builder()
        .method(Method::POST)
        .header(CONTENT_TYPE, FORM_MIME)
        .body(Body::from(body))
        .ok()?;
    Form::<T>::from_request(request, &())
        .await
        .ok()
        .map(|Form(value)| value)
}
