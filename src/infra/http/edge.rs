//! Public listener: every request is resolved, routed, then served through the tiers.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header::ALLOW},
    middleware,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

use crate::application::error::{ErrorReport, HttpError};
use crate::application::tenants::TenantService;
use crate::cache::{OriginError, Served, TieredCache};
use crate::routing::{FetchMode, RequestRouter, SubdomainResolver};

use super::middleware::{log_responses, set_request_context};
use super::request_host;

const SOURCE: &str = "infra::http::edge";

#[derive(Clone)]
pub struct EdgeState {
    pub resolver: Arc<SubdomainResolver>,
    pub router: Arc<RequestRouter>,
    pub cache: TieredCache,
    pub tenants: TenantService,
    /// Absolute URL admin requests on tenant hosts are sent to.
    pub admin_redirect: Arc<str>,
    pub trust_forwarded_host: bool,
}

pub fn build_edge_router(state: EdgeState) -> Router {
    Router::new()
        .fallback(edge)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn edge(State(state): State<EdgeState>, request: Request<Body>) -> Response {
    let method = request.method();
    if method != Method::GET && method != Method::HEAD {
        let mut response = HttpError::new(
            SOURCE,
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed",
            format!("{method} is not served by the edge"),
        )
        .into_response();
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
        return response;
    }

    let headers = request.headers();
    let uri = request.uri();
    let host = request_host(headers, uri, state.trust_forwarded_host);
    let tenant = state.resolver.resolve(host, &uri.to_string());
    let path = uri
        .path_and_query()
        .map(|path_and_query| path_and_query.as_str())
        .unwrap_or("/");

    let decision = state
        .router
        .route_request(tenant.as_ref(), path, FetchMode::from_headers(headers));
    debug!(
        host,
        path,
        tenant = tenant.as_ref().map(|id| id.as_str()),
        decision = decision.label(),
        "Routed request"
    );

    if let Some(tenant) = decision.tenant() {
        match state.tenants.find(tenant).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return HttpError::new(
                    SOURCE,
                    StatusCode::NOT_FOUND,
                    "Tenant not found",
                    format!("no tenant registered as `{tenant}`"),
                )
                .into_response();
            }
            Err(err) => return err.into_response(),
        }
    }

    let Some(origin_request) = decision.origin_request() else {
        return Redirect::temporary(&state.admin_redirect).into_response();
    };
    let origin_request = origin_request.with_headers(headers.clone());

    let result = match decision.cache_key() {
        Some(key) => state.cache.serve(&key, origin_request).await,
        None => state.cache.pass_through(origin_request).await,
    };

    match result {
        Ok(served) => served_response(served),
        Err(err) => origin_error_response(&err),
    }
}

fn served_response(served: Served) -> Response {
    let status = served.response.status;
    let mut response = Response::new(Body::from(served.response.body));
    *response.status_mut() = status;
    *response.headers_mut() = served.response.headers;

    if status.is_client_error() || status.is_server_error() {
        ErrorReport::from_message(
            SOURCE,
            status,
            format!("origin responded with {status}"),
        )
        .attach(&mut response);
    }
    response
}

/// Origin timeouts are 504, every other origin failure 502.
fn origin_error_response(err: &OriginError) -> Response {
    let (status, message) = if err.is_timeout() {
        (StatusCode::GATEWAY_TIMEOUT, "Gateway timeout")
    } else {
        (StatusCode::BAD_GATEWAY, "Bad gateway")
    };
    HttpError::from_error(SOURCE, status, message, err).into_response()
}
