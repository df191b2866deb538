//! Internal listener: invalidation, tenant administration, content API, health.
//!
//! Never mounted on the public listener. Requests whose host resolves to a
//! tenant are refused so these routes stay unreachable from tenant hosts.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};

use crate::application::content::ContentService;
use crate::application::error::ErrorReport;
use crate::application::tenants::TenantService;
use crate::cache::{InvalidationCoordinator, InvalidationRequest, InvalidationResult};
use crate::domain::tenant::Tenant;
use crate::routing::SubdomainResolver;

use super::content_api;
use super::error::JsonError;
use super::middleware::{log_responses, set_request_context};
use super::request_host;

const SOURCE: &str = "infra::http::internal";

#[derive(Clone)]
pub struct InternalState {
    pub invalidation: Arc<InvalidationCoordinator>,
    pub tenants: TenantService,
    pub content: ContentService,
    pub resolver: Arc<SubdomainResolver>,
    pub trust_forwarded_host: bool,
}

pub fn build_internal_router(state: InternalState) -> Router {
    let guard_state = state.clone();
    Router::new()
        .route("/_health", get(health))
        .route("/internal/invalidate", get(invalidate).post(invalidate))
        .route("/internal/invalidations", get(pending_invalidations))
        .route("/internal/tenants", get(list_tenants).post(register_tenant))
        .route(
            "/internal/tenants/{id}",
            get(get_tenant).delete(delete_tenant),
        )
        .route("/api/posts", get(content_api::list_posts))
        .route("/api/posts/{id}", get(content_api::get_post))
        .route("/api/authors", get(content_api::list_authors))
        .with_state(state)
        .layer(middleware::from_fn_with_state(guard_state, reject_tenant_hosts))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn reject_tenant_hosts(
    State(state): State<InternalState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let host = request_host(request.headers(), request.uri(), state.trust_forwarded_host);
    let tenant = state
        .resolver
        .resolve(host, &request.uri().to_string())
        .filter(|tenant| !tenant.is_root_alias());
    if let Some(tenant) = tenant {
        return JsonError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            format!("internal routes are not served on tenant host `{tenant}`"),
        )
        .into_response();
    }
    next.run(request).await
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TagQuery {
    tag: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvalidateResponse {
    message: &'static str,
    #[serde(flatten)]
    result: InvalidationResult,
}

/// Runs the ordered invalidation. A run that stopped at a stage answers 500
/// with the result so callers can see where it will resume.
async fn invalidate(
    State(state): State<InternalState>,
    Query(query): Query<TagQuery>,
) -> Result<Response, JsonError> {
    let tag = query
        .tag
        .filter(|tag| !tag.trim().is_empty())
        .ok_or_else(|| JsonError::new(SOURCE, StatusCode::BAD_REQUEST, "Tag is required"))?;

    let result = state
        .invalidation
        .invalidate(&tag)
        .await
        .map_err(|err| JsonError::from_app(SOURCE, err.into()))?;

    if result.success {
        Ok(Json(InvalidateResponse {
            message: "Cache invalidated successfully",
            result,
        })
        .into_response())
    } else {
        let detail = result.error.clone().unwrap_or_default();
        let mut response = (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(InvalidateResponse {
                message: "Invalidation incomplete",
                result,
            }),
        )
            .into_response();
        ErrorReport::from_message(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            detail,
        )
        .attach(&mut response);
        Ok(response)
    }
}

#[derive(Debug, Serialize)]
struct PendingResponse {
    pending: Vec<InvalidationRequest>,
}

async fn pending_invalidations(State(state): State<InternalState>) -> Json<PendingResponse> {
    Json(PendingResponse {
        pending: state.invalidation.pending(),
    })
}

#[derive(Debug, Serialize)]
struct TenantsResponse {
    tenants: Vec<Tenant>,
}

#[derive(Debug, Serialize)]
struct TenantResponse {
    tenant: Tenant,
}

#[derive(Debug, Deserialize)]
struct RegisterTenantRequest {
    id: String,
    icon: String,
}

async fn list_tenants(
    State(state): State<InternalState>,
) -> Result<Json<TenantsResponse>, JsonError> {
    let tenants = state
        .tenants
        .list()
        .await
        .map_err(|err| JsonError::from_app(SOURCE, err))?;
    Ok(Json(TenantsResponse { tenants }))
}

async fn register_tenant(
    State(state): State<InternalState>,
    Json(body): Json<RegisterTenantRequest>,
) -> Result<(StatusCode, Json<TenantResponse>), JsonError> {
    let tenant = state
        .tenants
        .register(&body.id, &body.icon)
        .await
        .map_err(|err| JsonError::from_app(SOURCE, err))?;
    Ok((StatusCode::CREATED, Json(TenantResponse { tenant })))
}

async fn get_tenant(
    State(state): State<InternalState>,
    Path(id): Path<String>,
) -> Result<Json<TenantResponse>, JsonError> {
    let tenant = state
        .tenants
        .get(&id)
        .await
        .map_err(|err| JsonError::from_app(SOURCE, err))?;
    Ok(Json(TenantResponse { tenant }))
}

async fn delete_tenant(
    State(state): State<InternalState>,
    Path(id): Path<String>,
) -> Result<Response, JsonError> {
    let deletion = state
        .tenants
        .delete(&id)
        .await
        .map_err(|err| JsonError::from_app(SOURCE, err))?;
    let status = if deletion.invalidation.success {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((status, Json(deletion)).into_response())
}
