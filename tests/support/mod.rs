//! Fixtures shared by the integration tests: scripted origin, recording
//! invalidation targets and a fully wired application context.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, HeaderValue, Request, StatusCode, header},
    response::Response,
};
use tower::ServiceExt;

use tenant_edge::cache::{
    CacheEntry, CacheKey, CachedResponse, InvalidationError, InvalidationTarget, Origin,
    OriginError, OriginRequest, OriginResponse, Tier, TierError, TierStore, Upstream,
};
use tenant_edge::config::{self, CliArgs, Settings};
use tenant_edge::infra::content::JsonContentStore;
use tenant_edge::infra::context::{ApplicationContext, Collaborators};
use tenant_edge::infra::tenants::MemoryTenantRegistry;

pub const SETTINGS: &str = r#"
[routing]
root_domain = "example.com"
protocol = "https"

[origin]
pages_url = "http://pages.origin.test"
assets_url = "http://assets.origin.test"
request_timeout_ms = 200

[invalidation]
stage_timeout_ms = 200
retry_interval_ms = 0

[[tenants.seed]]
id = "cool"
icon = "😎"

[[tenants.seed]]
id = "hot"
icon = "🔥"
"#;

pub const CONTENT: &str = r#"{
    "authors": [{"id": 1, "name": "Ada"}, {"id": 2, "name": "Grace"}],
    "posts": [
        {"id": 1, "title": "Hello", "content": "first", "author": 1, "publishedAt": "2024-01-01T00:00:00Z", "tags": ["intro"]},
        {"id": 2, "title": "Edges", "content": "second", "author": 2, "publishedAt": "2024-02-01T00:00:00Z", "tags": ["edge"]},
        {"id": 3, "title": "Tiers", "content": "third", "author": 1, "publishedAt": "2024-03-01T00:00:00Z", "tags": ["edge"]}
    ]
}"#;

pub fn settings() -> Settings {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    file.write_all(SETTINGS.as_bytes()).expect("write settings");
    config::load(&CliArgs {
        config_file: Some(file.path().to_path_buf()),
        command: None,
    })
    .expect("valid settings")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OriginMode {
    #[default]
    Ok,
    Failing,
    Hanging,
    Status(StatusCode),
}

#[derive(Debug, Clone)]
pub struct OriginCall {
    pub upstream: Upstream,
    pub path: String,
    pub headers: HeaderMap,
}

/// Origin that answers `origin:<path>` and records every fetch.
#[derive(Default)]
pub struct FakeOrigin {
    calls: Mutex<Vec<OriginCall>>,
    mode: Mutex<OriginMode>,
    tags: Mutex<HashMap<String, String>>,
}

impl FakeOrigin {
    pub fn set_mode(&self, mode: OriginMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// Report `tags` in the tag header whenever `path` is fetched.
    pub fn tag(&self, path: &str, tags: &str) {
        self.tags
            .lock()
            .unwrap()
            .insert(path.to_string(), tags.to_string());
    }

    pub fn calls(&self) -> Vec<OriginCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.path).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Origin for FakeOrigin {
    async fn fetch(&self, request: OriginRequest) -> Result<OriginResponse, OriginError> {
        self.calls.lock().unwrap().push(OriginCall {
            upstream: request.upstream,
            path: request.path.clone(),
            headers: request.headers.clone(),
        });
        let mode = *self.mode.lock().unwrap();
        let status = match mode {
            OriginMode::Ok => StatusCode::OK,
            OriginMode::Status(status) => status,
            OriginMode::Failing => return Err(OriginError::transport("connection refused")),
            OriginMode::Hanging => return std::future::pending().await,
        };

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        headers.insert("x-internal-build", HeaderValue::from_static("blue"));
        if let Some(tags) = self.tags.lock().unwrap().get(&request.path) {
            headers.insert("cache-tag", HeaderValue::from_str(tags).unwrap());
        }
        Ok(CachedResponse::new(
            status,
            headers,
            format!("origin:{}", request.path),
        ))
    }
}

/// Invalidation target that appends its name to a shared trace, then
/// delegates. Can be told to fail or hang.
pub struct Traced {
    name: &'static str,
    inner: Option<Arc<dyn InvalidationTarget>>,
    trace: Arc<Mutex<Vec<&'static str>>>,
    failing: AtomicBool,
    hanging: AtomicBool,
}

impl Traced {
    pub fn new(
        name: &'static str,
        inner: Option<Arc<dyn InvalidationTarget>>,
        trace: Arc<Mutex<Vec<&'static str>>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            inner,
            trace,
            failing: AtomicBool::new(false),
            hanging: AtomicBool::new(false),
        })
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn hang(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }
}

#[async_trait]
impl InvalidationTarget for Traced {
    async fn invalidate_tag(&self, tag: &str) -> Result<usize, InvalidationError> {
        self.trace.lock().unwrap().push(self.name);
        if self.hanging.load(Ordering::SeqCst) {
            return std::future::pending().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(OriginError::transport(format!("{} unavailable", self.name)).into());
        }
        match &self.inner {
            Some(inner) => inner.invalidate_tag(tag).await,
            None => Ok(0),
        }
    }
}

pub fn trace() -> Arc<Mutex<Vec<&'static str>>> {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn trace_of(trace: &Arc<Mutex<Vec<&'static str>>>) -> Vec<&'static str> {
    trace.lock().unwrap().clone()
}

pub struct Harness {
    pub app: ApplicationContext,
    pub origin: Arc<FakeOrigin>,
    pub purge: Arc<Traced>,
    pub trace: Arc<Mutex<Vec<&'static str>>>,
    pub edge: Router,
    pub internal: Router,
}

pub fn harness() -> Harness {
    let settings = settings();
    let origin = Arc::new(FakeOrigin::default());
    let trace = trace();
    let purge = Traced::new("origin", None, trace.clone());
    let collaborators = Collaborators {
        origin: origin.clone(),
        origin_purge: purge.clone(),
        registry: Arc::new(MemoryTenantRegistry::seeded(&settings.tenants.seed)),
        content: Arc::new(JsonContentStore::from_slice(CONTENT.as_bytes()).expect("content")),
    };
    let app = ApplicationContext::build(&settings, collaborators);
    let edge = tenant_edge::infra::http::build_edge_router(app.edge.clone());
    let internal = tenant_edge::infra::http::build_internal_router(app.internal.clone());
    Harness {
        app,
        origin,
        purge,
        trace,
        edge,
        internal,
    }
}

pub fn get(host: &str, path: &str) -> Request<Body> {
    request("GET", host, path, Body::empty())
}

pub fn request(method: &str, host: &str, path: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .header(header::HOST, host)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
}

/// Tier store whose every operation fails.
pub struct BrokenStore(pub Tier);

#[async_trait]
impl TierStore for BrokenStore {
    fn tier(&self) -> Tier {
        self.0
    }

    async fn get(&self, _key: &CacheKey) -> Result<Option<CacheEntry>, TierError> {
        Err(TierError::unavailable(self.0, "store offline"))
    }

    async fn put(&self, _key: CacheKey, _entry: CacheEntry) -> Result<(), TierError> {
        Err(TierError::unavailable(self.0, "store offline"))
    }

    async fn delete_tag(&self, _tag: &str) -> Result<usize, TierError> {
        Err(TierError::unavailable(self.0, "store offline"))
    }
}
