//! Public listener behaviour: host resolution, namespace rewrites and the
//! tiered cache in front of origin.

mod support;

use axum::{
    body::Body,
    http::{StatusCode, header},
};

use tenant_edge::cache::{CacheKey, HostClass, Upstream};
use tenant_edge::domain::tenant::TenantId;

use support::{OriginMode, body_text, get, harness, request, send};

#[tokio::test]
async fn tenant_root_is_rewritten_into_namespace() {
    let h = harness();

    let response = send(&h.edge, get("cool.example.com", "/")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.origin.paths(), vec!["/s/cool".to_string()]);
    assert_eq!(support::header(&response, "x-edge-cache"), Some("MISS"));
    assert_eq!(support::header(&response, "x-edge-tier"), Some("origin"));
    assert_eq!(body_text(response).await, "origin:/s/cool");
}

#[tokio::test]
async fn tenant_paths_and_queries_are_appended() {
    let h = harness();

    send(&h.edge, get("cool.example.com", "/posts/7?ref=home")).await;

    assert_eq!(h.origin.paths(), vec!["/s/cool/posts/7?ref=home".to_string()]);
}

#[tokio::test]
async fn root_and_www_hosts_pass_through() {
    let h = harness();

    send(&h.edge, get("example.com", "/pricing")).await;
    send(&h.edge, get("www.example.com", "/about")).await;

    assert_eq!(
        h.origin.paths(),
        vec!["/pricing".to_string(), "/about".to_string()]
    );
    assert!(h.app.regional.contains(&CacheKey::new(HostClass::Root, "/pricing")));
}

#[tokio::test]
async fn unknown_tenant_is_not_found_without_origin() {
    let h = harness();

    let response = send(&h.edge, get("ghost.example.com", "/")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(h.origin.call_count(), 0);
}

#[tokio::test]
async fn admin_on_tenant_host_redirects_to_root() {
    let h = harness();

    let response = send(&h.edge, get("cool.example.com", "/admin/settings")).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        support::header(&response, "location"),
        Some("https://example.com/admin")
    );
    assert_eq!(h.origin.call_count(), 0);
    assert!(h.app.regional.is_empty());
    assert!(h.app.shield.is_empty());
}

#[tokio::test]
async fn tenants_never_share_entries() {
    let h = harness();

    let cool = send(&h.edge, get("cool.example.com", "/about")).await;
    let hot = send(&h.edge, get("hot.example.com", "/about")).await;

    assert_eq!(
        h.origin.paths(),
        vec!["/s/cool/about".to_string(), "/s/hot/about".to_string()]
    );
    assert_ne!(body_text(cool).await, body_text(hot).await);
    assert_eq!(h.app.regional.len(), 2);
    assert_eq!(h.app.regional.tagged("cool"), 1);
    assert_eq!(h.app.regional.tagged("hot"), 1);
}

#[tokio::test]
async fn second_request_is_served_from_regional() {
    let h = harness();

    send(&h.edge, get("cool.example.com", "/")).await;
    let response = send(&h.edge, get("cool.example.com", "/")).await;

    assert_eq!(h.origin.call_count(), 1);
    assert_eq!(support::header(&response, "x-edge-cache"), Some("HIT"));
    assert_eq!(support::header(&response, "x-edge-tier"), Some("regional"));
    assert_eq!(body_text(response).await, "origin:/s/cool");
}

#[tokio::test]
async fn shared_assets_are_fetched_once_for_all_tenants() {
    let h = harness();

    send(&h.edge, get("cool.example.com", "/_next/static/app.js")).await;
    let response = send(&h.edge, get("hot.example.com", "/_next/static/app.js")).await;

    let calls = h.origin.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].upstream, Upstream::Assets);
    assert_eq!(calls[0].path, "/_next/static/app.js");
    assert_eq!(support::header(&response, "x-edge-cache"), Some("HIT"));
}

#[tokio::test]
async fn non_navigation_requests_are_forwarded_unmodified_and_uncached() {
    let h = harness();

    for _ in 0..2 {
        let request = axum::http::Request::builder()
            .uri("/api/data")
            .header(header::HOST, "cool.example.com")
            .header("sec-fetch-mode", "cors")
            .body(Body::empty())
            .unwrap();
        send(&h.edge, request).await;
    }

    assert_eq!(
        h.origin.paths(),
        vec!["/api/data".to_string(), "/api/data".to_string()]
    );
    assert!(h.app.regional.is_empty());
}

#[tokio::test]
async fn prefetch_is_not_a_navigation() {
    let h = harness();

    let request = axum::http::Request::builder()
        .uri("/next-page")
        .header(header::HOST, "cool.example.com")
        .header("purpose", "prefetch")
        .body(Body::empty())
        .unwrap();
    send(&h.edge, request).await;

    assert_eq!(h.origin.paths(), vec!["/next-page".to_string()]);
}

#[tokio::test]
async fn responses_carry_policy_but_not_internal_headers() {
    let h = harness();
    h.origin.tag("/s/cool/posts/42", "post:42");

    let response = send(&h.edge, get("cool.example.com", "/posts/42")).await;

    assert_eq!(
        support::header(&response, "edge-cache-control"),
        Some("s-maxage=120, stale-while-revalidate=31556952")
    );
    assert!(response.headers().get("regional-cache-control").is_none());
    assert!(response.headers().get("cache-tag").is_none());
    assert!(response.headers().get("x-internal-build").is_none());
    assert!(response.headers().get("x-request-id").is_some());
    assert_eq!(h.app.regional.tagged("post:42"), 1);
}

#[tokio::test]
async fn unsupported_methods_are_rejected() {
    let h = harness();

    let response = send(
        &h.edge,
        request("POST", "cool.example.com", "/", Body::from("{}")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(support::header(&response, "allow"), Some("GET, HEAD"));
    assert_eq!(h.origin.call_count(), 0);
}

#[tokio::test]
async fn origin_failures_map_to_gateway_errors() {
    let h = harness();

    h.origin.set_mode(OriginMode::Failing);
    let failed = send(&h.edge, get("cool.example.com", "/")).await;
    assert_eq!(failed.status(), StatusCode::BAD_GATEWAY);

    h.origin.set_mode(OriginMode::Hanging);
    let timed_out = send(&h.edge, get("cool.example.com", "/slow")).await;
    assert_eq!(timed_out.status(), StatusCode::GATEWAY_TIMEOUT);

    assert!(h.app.regional.is_empty());
}

#[tokio::test]
async fn origin_errors_are_relayed_but_not_cached() {
    let h = harness();
    h.origin.set_mode(OriginMode::Status(StatusCode::NOT_FOUND));

    let first = send(&h.edge, get("cool.example.com", "/missing")).await;
    let second = send(&h.edge, get("cool.example.com", "/missing")).await;

    assert_eq!(first.status(), StatusCode::NOT_FOUND);
    assert_eq!(second.status(), StatusCode::NOT_FOUND);
    assert_eq!(h.origin.call_count(), 2);
    assert!(h.app.shield.is_empty());
}

#[tokio::test]
async fn tenants_registered_at_runtime_are_routed() {
    let h = harness();
    let before = send(&h.edge, get("new.example.com", "/")).await;
    assert_eq!(before.status(), StatusCode::NOT_FOUND);

    h.app.tenants.register("new", "✨").await.unwrap();
    let after = send(&h.edge, get("new.example.com", "/")).await;

    assert_eq!(after.status(), StatusCode::OK);
    assert_eq!(h.origin.paths(), vec!["/s/new".to_string()]);
    assert!(h.app.regional.contains(&CacheKey::new(
        HostClass::Tenant(TenantId::parse("new").unwrap()),
        "/s/new"
    )));
}
