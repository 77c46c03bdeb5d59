//! HTTP front for the interception layer.
//!
//! Every inbound request is mapped onto an origin resource and handed to the
//! interceptor; the store decides whether the network is consulted at all.
//! `/healthz` is the only route the gateway answers itself.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use url::Url;

use squall_client::{UrlError, resolve};
use squall_core::{AppConfig, Interceptor, Manifest, ResourceRequest, Served};

use crate::error::GatewayError;

/// Connection-scoped headers that must not be replayed from the store or
/// forwarded from the upstream.
const HOP_BY_HOP: [&str; 5] = ["connection", "transfer-encoding", "content-length", "keep-alive", "upgrade"];

/// Response header naming which side answered: "precache" or "network".
const CACHE_SOURCE_HEADER: &str = "x-squall-cache";

/// Shared state for all gateway handlers.
#[derive(Clone)]
pub struct AppState {
    pub interceptor: Interceptor,
    pub origin: Url,
}

/// Build the gateway router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .fallback(serve_resource)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Resolve the configured precache paths into an absolute-URL manifest.
pub fn manifest_from_config(config: &AppConfig, origin: &Url) -> Result<Manifest, UrlError> {
    let mut entries = Vec::with_capacity(config.precache.len());
    for entry in &config.precache {
        entries.push(resolve(origin, entry)?.to_string());
    }
    Ok(Manifest::new(entries))
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    ready: bool,
    precached: u64,
}

async fn healthz(State(state): State<AppState>) -> Response {
    let precached = state.interceptor.store().response_count().await.unwrap_or(0);
    Json(Health { status: "ok", ready: state.interceptor.is_ready(), precached }).into_response()
}

async fn serve_resource(State(state): State<AppState>, request: Request) -> Response {
    let resource = match to_resource_request(&state.origin, &request) {
        Ok(r) => r,
        Err(e) => return GatewayError::BadRequest(e.to_string()).into_response(),
    };

    match state.interceptor.handle(&resource).await {
        Ok(served) => into_http(served),
        Err(e) => GatewayError::Upstream(e).into_response(),
    }
}

/// Map an inbound HTTP request onto the origin resource it asks for.
///
/// A resource request is identity plus headers; inbound bodies are not part
/// of the model and are dropped.
fn to_resource_request(origin: &Url, request: &Request) -> Result<ResourceRequest, UrlError> {
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = resolve(origin, path_and_query)?;

    let mut headers = Vec::new();
    for (name, value) in request.headers() {
        if name == header::HOST {
            continue;
        }
        if let Ok(v) = value.to_str() {
            headers.push((name.as_str().to_string(), v.to_string()));
        }
    }

    Ok(ResourceRequest { method: request.method().to_string(), url: url.to_string(), headers })
}

fn into_http(served: Served) -> Response {
    let Served { status, content_type, headers, body, source } = served;

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);

    let out = response.headers_mut();
    for (name, value) in &headers {
        if HOP_BY_HOP.contains(&name.to_ascii_lowercase().as_str()) {
            continue;
        }
        if let (Ok(n), Ok(v)) = (HeaderName::try_from(name.as_str()), HeaderValue::from_str(value)) {
            out.append(n, v);
        }
    }

    if !out.contains_key(header::CONTENT_TYPE)
        && let Some(ct) = content_type
        && let Ok(v) = HeaderValue::from_str(&ct)
    {
        out.insert(header::CONTENT_TYPE, v);
    }

    out.insert(
        HeaderName::from_static(CACHE_SOURCE_HEADER),
        HeaderValue::from_static(source.as_str()),
    );

    response
}
