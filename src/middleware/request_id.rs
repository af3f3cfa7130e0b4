//! Correlation ID
//!
//! Reuses a sane inbound `X-Request-ID` or mints `YYYYMMDDHHMMSS-<16 hex>`.
//! The id is stored as a [`RequestId`] extension and echoed on the response.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    Router,
};
use tower::{util::MapRequestLayer, ServiceBuilder};
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, SetRequestIdLayer};

pub use tower_http::request_id::RequestId;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Longest inbound id that is reused verbatim
const MAX_INBOUND_LEN: usize = 128;

/// Mints timestamped ids for requests that arrive without a usable one
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampRequestId;

impl TimestampRequestId {
    pub fn generate() -> String {
        let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
        let suffix: [u8; 8] = rand::random();
        format!("{}-{}", stamp, hex::encode(suffix))
    }
}

impl MakeRequestId for TimestampRequestId {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Self::generate()).ok().map(RequestId::new)
    }
}

fn usable(value: &HeaderValue) -> bool {
    match value.to_str() {
        Ok(value) => {
            !value.is_empty()
                && value.len() <= MAX_INBOUND_LEN
                && value.bytes().all(|b| b.is_ascii_graphic())
        }
        Err(_) => false,
    }
}

/// Drop an inbound id that is not worth echoing so a fresh one is minted
fn discard_unusable_id(mut req: Request) -> Request {
    let keep = req.headers().get(&REQUEST_ID_HEADER).map(usable);
    if keep == Some(false) {
        req.headers_mut().remove(&REQUEST_ID_HEADER);
    }
    req
}

/// Wrap `router` with the correlation id stage
pub fn apply<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(
        ServiceBuilder::new()
            .layer(MapRequestLayer::new(discard_unusable_id))
            .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, TimestampRequestId))
            .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER)),
    )
}
