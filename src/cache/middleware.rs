//! Response-cache middleware for the global feed route.
//!
//! Layered over `GET /` only; every other feed is composed fresh. On a hit
//! the stored payload is replayed verbatim with no store query, so within
//! the TTL window a page may show posts that were deleted after render.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::counter;
use tracing::{debug, instrument};

use super::{
    CacheConfig,
    keys::FeedPageKey,
    store::{CachedResponse, ResponseCache},
};

/// Rendered pages are small; anything larger is served uncached rather
/// than buffered.
const MAX_CACHED_BODY_BYTES: usize = 1024 * 1024;

/// Shared cache state for the middleware.
#[derive(Clone)]
pub struct CacheState {
    pub config: CacheConfig,
    pub store: Arc<ResponseCache>,
}

/// Serve `GET /` from the rendered-page store when a fresh entry exists;
/// otherwise run the handler and store a 200 result. Concurrent misses on
/// one key both recompute and the last writer wins.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn response_cache_layer(
    State(cache): State<CacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.config.enable_response_cache {
        return next.run(request).await;
    }

    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = FeedPageKey::from_query(request.uri().query());

    if let Some(cached) = cache.store.get(&key, Instant::now()) {
        counter!("brusio_response_cache_hit_total").increment(1);
        debug!(
            cache = "response",
            outcome = "hit",
            page = key.page,
            "serving cached feed page"
        );
        return build_response(cached);
    }

    counter!("brusio_response_cache_miss_total").increment(1);
    debug!(
        cache = "response",
        outcome = "miss",
        page = key.page,
        "composing feed page"
    );

    let response = next.run(request).await;

    if response.status() == StatusCode::OK {
        let (parts, body) = response.into_parts();
        let bytes = match axum::body::to_bytes(body, MAX_CACHED_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        };

        let cached = CachedResponse {
            status: parts.status.as_u16(),
            headers: parts
                .headers
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|text| (name.to_string(), text.to_string()))
                })
                .collect(),
            body: bytes.clone(),
        };

        if cache.store.insert(key, cached, Instant::now()).is_some() {
            counter!("brusio_response_cache_evict_total").increment(1);
        }

        Response::from_parts(parts, Body::from(bytes))
    } else {
        response
    }
}

/// Rebuild a response from cached data.
fn build_response(cached: CachedResponse) -> Response {
    use axum::http::HeaderValue;

    let mut builder = Response::builder().status(cached.status);

    for (name, value) in cached.headers {
        if let Ok(header_value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, header_value);
        }
    }

    builder
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
