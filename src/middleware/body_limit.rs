//! Request body ceiling.
//!
//! A declared `Content-Length` over the limit is refused up front. The body is
//! also wrapped in [`Limited`] so a missing or understated length still fails
//! when the body is read (`ApiJson` turns that into a 413).

use crate::error::ApiError;
use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::Limited;

pub async fn limit_body(State(max_bytes): State<usize>, req: Request, next: Next) -> Response {
    let declared = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    if declared.is_some_and(|len| len > max_bytes as u64) {
        return ApiError::PayloadTooLarge.into_response();
    }

    let (parts, body) = req.into_parts();
    let req = Request::from_parts(parts, Body::new(Limited::new(body, max_bytes)));

    next.run(req).await
}
