use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use reqwest::{Client, Url};
use serde_json::Value;

use tenant_edge::application::error::AppError;
use tenant_edge::config::{InvalidateArgs, Settings};
use tenant_edge::infra::error::InfraError;

const INVALIDATE_PATH: &str = "/internal/invalidate";

/// Ask a running instance to invalidate `args.tag` and print its JSON answer.
/// Fails when the instance reports an incomplete run.
pub async fn run(settings: &Settings, args: &InvalidateArgs) -> Result<(), AppError> {
    let tag = args.tag.trim();
    if tag.is_empty() {
        return Err(AppError::validation("tag is required"));
    }

    let endpoint = endpoint(settings.server.internal_addr, args.endpoint.as_deref())?;
    let mut url = endpoint;
    url.query_pairs_mut().clear().append_pair("tag", tag);

    let client = Client::builder()
        .user_agent(concat!("tenant-edge-cli/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| InfraError::http_client(err.to_string()))?;
    let response = client
        .post(url)
        .send()
        .await
        .map_err(|err| InfraError::http_client(err.to_string()))?;
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|err| InfraError::http_client(err.to_string()))?;

    let body: Value = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
        Value::String(String::from_utf8_lossy(&bytes).into_owned())
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string())
    );

    let success = body.get("success").and_then(Value::as_bool).unwrap_or(false);
    if status.is_success() && success {
        Ok(())
    } else {
        Err(AppError::unexpected(format!(
            "invalidation of `{tag}` did not complete (status {status})"
        )))
    }
}

fn endpoint(internal_addr: SocketAddr, explicit: Option<&str>) -> Result<Url, AppError> {
    let raw = match explicit {
        Some(raw) => raw.to_string(),
        None => default_endpoint(internal_addr),
    };
    Url::parse(&raw).map_err(|err| AppError::validation(format!("invalid endpoint `{raw}`: {err}")))
}

/// A wildcard bind address is not something a client can connect to, so it
/// is swapped for loopback of the same family.
fn default_endpoint(mut addr: SocketAddr) -> String {
    if addr.ip().is_unspecified() {
        let loopback = match addr.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
        };
        addr.set_ip(loopback);
    }
    format!("http://{addr}{INVALIDATE_PATH}")
}
