//! The interception policy: precache initialization and cache-first lookup.
//!
//! Two operations, evaluated independently against the shared store:
//!
//! - [`Interceptor::initialize`] runs once per activation: it ensures every
//!   manifest entry is present in the store, fetching and staging whatever is
//!   missing and committing the batch in one transaction.
//! - [`Interceptor::handle`] runs per request: store lookup first, network
//!   fallback second, never the other way around, and never a write.
//!
//! The host driver awaits `initialize` before routing any request to
//! `handle`; the readiness flag exists so the host can report that gate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};

use crate::error::{Error, InitError};
use crate::store::install_runs::InstallRun;
use crate::store::key::resource_key;
use crate::store::{StoreDb, StoredResponse};

/// Manifest entries are fetched and keyed as plain GETs.
const PRECACHE_METHOD: &str = "GET";

/// An outbound resource request.
///
/// Opaque to the policy beyond its identity (method + URL) and whatever the
/// fetch mechanism wants to forward (headers).
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl ResourceRequest {
    /// A plain GET for the given URL.
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: PRECACHE_METHOD.to_string(), url: url.into(), headers: Vec::new() }
    }

    /// The store key for this request's identity.
    pub fn key(&self) -> String {
        resource_key(&self.method, &self.url)
    }
}

/// An ordered list of absolute resource URLs to precache.
///
/// Owned by the caller; the policy never persists it.
#[derive(Debug, Clone)]
pub struct Manifest {
    entries: Vec<String>,
}

impl Manifest {
    pub fn new(entries: Vec<String>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What the fetch mechanism hands back for one request.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub fetch_ms: u64,
}

/// The resource-fetch capability the policy falls back to.
///
/// Implemented by the reqwest client in squall-client and by in-memory
/// doubles in tests. The policy depends on it, never the reverse.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: &ResourceRequest) -> Result<FetchedResource, Error>;
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeSource {
    Precache,
    Network,
}

impl ServeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServeSource::Precache => "precache",
            ServeSource::Network => "network",
        }
    }
}

/// A response on its way back to the caller, tagged with its source.
#[derive(Debug, Clone)]
pub struct Served {
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub source: ServeSource,
}

impl Served {
    fn from_store(row: StoredResponse) -> Self {
        let headers = row
            .headers_json
            .as_deref()
            .and_then(|j| serde_json::from_str(j).ok())
            .unwrap_or_default();
        Self {
            status: row.status,
            content_type: row.content_type,
            headers,
            body: row.body,
            source: ServeSource::Precache,
        }
    }

    fn from_network(fetched: FetchedResource) -> Self {
        Self {
            status: fetched.status,
            content_type: fetched.content_type,
            headers: fetched.headers,
            body: fetched.body,
            source: ServeSource::Network,
        }
    }
}

/// The interception layer: one store handle, one fetch capability, two
/// operations. Cloning shares both plus the readiness flag.
#[derive(Clone)]
pub struct Interceptor {
    store: StoreDb,
    fetcher: Arc<dyn Fetch>,
    ready: Arc<AtomicBool>,
}

impl Interceptor {
    pub fn new(store: StoreDb, fetcher: Arc<dyn Fetch>) -> Self {
        Self { store, fetcher, ready: Arc::new(AtomicBool::new(false)) }
    }

    /// Whether an initialization pass has completed successfully.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &StoreDb {
        &self.store
    }

    /// Ensure every manifest entry is present in the store.
    ///
    /// Entries already stored are skipped; missing ones are fetched in
    /// manifest order and written with a single transactional batch, so a
    /// pass that fails on any entry leaves the store untouched. The host
    /// must await this before activating the request path.
    pub async fn initialize(&self, manifest: &Manifest) -> Result<(), InitError> {
        let started_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let outcome = self.run_precache(manifest).await;

        let run = InstallRun {
            started_at,
            finished_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            manifest_len: manifest.len(),
            fetched: *outcome.as_ref().unwrap_or(&0),
            outcome: match &outcome {
                Ok(_) => "ok".to_string(),
                Err(e) => e.to_string(),
            },
        };
        if let Err(e) = self.store.record_install(run).await {
            tracing::warn!("failed to record precache run: {e}");
        }

        match outcome {
            Ok(fetched) => {
                self.ready.store(true, Ordering::SeqCst);
                tracing::info!(entries = manifest.len(), fetched, "precache pass complete");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn run_precache(&self, manifest: &Manifest) -> Result<usize, InitError> {
        let keys = manifest
            .entries()
            .iter()
            .map(|url| resource_key(PRECACHE_METHOD, url))
            .collect();
        let mut missing = self
            .store
            .missing_keys(keys)
            .await
            .map_err(InitError::StorageUnavailable)?;

        let mut rows: Vec<StoredResponse> = Vec::with_capacity(missing.len());
        for url in manifest.entries() {
            let key = resource_key(PRECACHE_METHOD, url);
            // remove() also drops duplicate manifest entries after the first
            if !missing.remove(&key) {
                continue;
            }

            let request = ResourceRequest::get(url.clone());
            let fetched = self
                .fetcher
                .fetch(&request)
                .await
                .map_err(|e| InitError::from_fetch(url, e))?;

            if !(200..300).contains(&fetched.status) {
                return Err(InitError::PartialManifestFailure {
                    id: url.clone(),
                    source: Error::HttpError(format!("status {}", fetched.status)),
                });
            }

            tracing::debug!(url = %url, bytes = fetched.body.len(), "precached");
            rows.push(stage_row(key, fetched));
        }

        let fetched = rows.len();
        if fetched > 0 {
            self.store.put_all(rows).await.map_err(InitError::StorageUnavailable)?;
        }
        Ok(fetched)
    }

    /// Serve one request: store lookup first, network fallback second.
    ///
    /// A hit is returned verbatim with no network activity. A miss delegates
    /// to the fetch mechanism with the original request and returns its
    /// result unmodified, errors included; nothing is written back. A store
    /// *read* failure degrades to a miss rather than failing the request.
    pub async fn handle(&self, request: &ResourceRequest) -> Result<Served, Error> {
        let key = request.key();
        match self.store.get_response(&key).await {
            Ok(Some(row)) => {
                tracing::debug!(url = %request.url, "precache hit");
                return Ok(Served::from_store(row));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(url = %request.url, "store lookup failed, treating as miss: {e}");
            }
        }

        tracing::debug!(url = %request.url, "precache miss, delegating to network");
        let fetched = self.fetcher.fetch(request).await?;
        Ok(Served::from_network(fetched))
    }
}

fn stage_row(key: String, fetched: FetchedResource) -> StoredResponse {
    StoredResponse {
        key,
        method: PRECACHE_METHOD.to_string(),
        url: fetched.url,
        final_url: fetched.final_url,
        status: fetched.status,
        content_type: fetched.content_type,
        headers_json: serde_json::to_string(&fetched.headers).ok(),
        body: fetched.body,
        fetched_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    /// In-memory fetch double: a fixed route table plus a call counter.
    struct StubFetch {
        routes: HashMap<String, FetchedResource>,
        calls: AtomicUsize,
    }

    impl StubFetch {
        fn new(routes: Vec<(&str, u16, &[u8])>) -> Self {
            let routes = routes
                .into_iter()
                .map(|(url, status, body)| {
                    (
                        url.to_string(),
                        FetchedResource {
                            url: url.to_string(),
                            final_url: url.to_string(),
                            status,
                            content_type: Some("text/html".to_string()),
                            headers: vec![("content-type".to_string(), "text/html".to_string())],
                            body: body.to_vec(),
                            fetch_ms: 1,
                        },
                    )
                })
                .collect();
            Self { routes, calls: AtomicUsize::new(0) }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetch for StubFetch {
        async fn fetch(&self, request: &ResourceRequest) -> Result<FetchedResource, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.routes.get(&request.url) {
                Some(r) => Ok(r.clone()),
                None => Err(Error::NetworkUnreachable(format!("no route to {}", request.url))),
            }
        }
    }

    fn reference_manifest() -> Manifest {
        Manifest::new(vec![
            "http://origin/".to_string(),
            "http://origin/static/logo.png".to_string(),
            "http://origin/static/manifest.json".to_string(),
        ])
    }

    fn reference_routes() -> Vec<(&'static str, u16, &'static [u8])> {
        vec![
            ("http://origin/", 200, b"<html>root</html>"),
            ("http://origin/static/logo.png", 200, b"png-bytes"),
            ("http://origin/static/manifest.json", 200, b"{\"name\":\"app\"}"),
        ]
    }

    async fn initialized() -> (Interceptor, Arc<StubFetch>) {
        let store = StoreDb::open_in_memory().await.unwrap();
        let fetch = Arc::new(StubFetch::new(reference_routes()));
        let interceptor = Interceptor::new(store, fetch.clone());
        interceptor.initialize(&reference_manifest()).await.unwrap();
        (interceptor, fetch)
    }

    #[tokio::test]
    async fn test_initialize_populates_every_entry() {
        let (interceptor, _) = initialized().await;
        for url in reference_manifest().entries() {
            let key = resource_key("GET", url);
            assert!(interceptor.store().contains(&key).await.unwrap(), "missing {url}");
        }
    }

    #[tokio::test]
    async fn test_initialize_sets_readiness() {
        let store = StoreDb::open_in_memory().await.unwrap();
        let fetch = Arc::new(StubFetch::new(reference_routes()));
        let interceptor = Interceptor::new(store, fetch);
        assert!(!interceptor.is_ready());

        interceptor.initialize(&reference_manifest()).await.unwrap();
        assert!(interceptor.is_ready());
    }

    #[tokio::test]
    async fn test_initialize_failure_identifies_entry_and_writes_nothing() {
        let store = StoreDb::open_in_memory().await.unwrap();
        let fetch = Arc::new(StubFetch::new(vec![
            ("http://origin/", 200, b"<html>root</html>" as &[u8]),
            ("http://origin/static/logo.png", 500, b"oops"),
            ("http://origin/static/manifest.json", 200, b"{}"),
        ]));
        let interceptor = Interceptor::new(store, fetch);

        let err = interceptor.initialize(&reference_manifest()).await.unwrap_err();
        assert_eq!(err.failed_id(), Some("http://origin/static/logo.png"));
        assert!(matches!(err, InitError::PartialManifestFailure { .. }));

        // staged-then-commit: a failed pass leaves no partial writes
        assert_eq!(interceptor.store().response_count().await.unwrap(), 0);
        assert!(!interceptor.is_ready());
    }

    #[tokio::test]
    async fn test_initialize_unreachable_entry_is_network_unavailable() {
        let store = StoreDb::open_in_memory().await.unwrap();
        let fetch = Arc::new(StubFetch::new(vec![("http://origin/", 200, b"root" as &[u8])]));
        let interceptor = Interceptor::new(store, fetch);

        let err = interceptor.initialize(&reference_manifest()).await.unwrap_err();
        assert!(matches!(err, InitError::NetworkUnavailable { .. }));
        assert_eq!(err.failed_id(), Some("http://origin/static/logo.png"));
    }

    #[tokio::test]
    async fn test_reinitialize_fetches_nothing() {
        let (interceptor, fetch) = initialized().await;
        assert_eq!(fetch.calls(), 3);

        interceptor.initialize(&reference_manifest()).await.unwrap();
        assert_eq!(fetch.calls(), 3, "present entries must not be refetched");
    }

    #[tokio::test]
    async fn test_handle_hit_precedence() {
        let (interceptor, fetch) = initialized().await;
        let calls_before = fetch.calls();

        let served = interceptor.handle(&ResourceRequest::get("http://origin/")).await.unwrap();
        assert_eq!(served.source, ServeSource::Precache);
        assert_eq!(served.body, b"<html>root</html>");
        assert_eq!(served.status, 200);
        assert_eq!(fetch.calls(), calls_before, "a hit must perform zero fetch calls");
    }

    #[tokio::test]
    async fn test_handle_miss_falls_through_without_write_back() {
        let store = StoreDb::open_in_memory().await.unwrap();
        let mut routes = reference_routes();
        routes.push(("http://origin/unknown.js", 200, b"console.log(1)"));
        let fetch = Arc::new(StubFetch::new(routes));
        let interceptor = Interceptor::new(store, fetch.clone());
        interceptor.initialize(&reference_manifest()).await.unwrap();

        let calls_before = fetch.calls();
        let request = ResourceRequest::get("http://origin/unknown.js");
        let served = interceptor.handle(&request).await.unwrap();

        assert_eq!(served.source, ServeSource::Network);
        assert_eq!(served.body, b"console.log(1)");
        assert_eq!(fetch.calls(), calls_before + 1, "a miss performs exactly one fetch");
        assert!(
            !interceptor.store().contains(&request.key()).await.unwrap(),
            "the miss path must not write back"
        );
    }

    #[tokio::test]
    async fn test_handle_miss_propagates_fetch_error() {
        let (interceptor, _) = initialized().await;

        let err = interceptor
            .handle(&ResourceRequest::get("http://elsewhere/missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NetworkUnreachable(_)));
    }

    #[tokio::test]
    async fn test_handle_idempotent_reads() {
        let (interceptor, _) = initialized().await;
        let request = ResourceRequest::get("http://origin/static/manifest.json");

        let first = interceptor.handle(&request).await.unwrap();
        let second = interceptor.handle(&request).await.unwrap();
        assert_eq!(first.body, second.body);
        assert_eq!(first.status, second.status);
    }

    #[tokio::test]
    async fn test_handle_ignores_request_headers_for_identity() {
        let (interceptor, fetch) = initialized().await;
        let calls_before = fetch.calls();

        let mut request = ResourceRequest::get("http://origin/");
        request.headers.push(("accept".to_string(), "image/avif".to_string()));

        let served = interceptor.handle(&request).await.unwrap();
        assert_eq!(served.source, ServeSource::Precache);
        assert_eq!(fetch.calls(), calls_before);
    }
}
