//! Host to tenant resolution.
//!
//! Pure and deterministic. Rules are checked in order local, preview,
//! production; the first rule that recognises the host decides.

use url::Url;

use crate::domain::tenant::TenantId;

const LOCAL_SUFFIX: &str = ".localhost";
const LOCAL_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];
const PREVIEW_SEPARATOR: &str = "---";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubdomainResolver {
    root_domain: String,
    preview_domain: Option<String>,
}

impl SubdomainResolver {
    /// `root_domain` may carry a port; it is ignored when matching.
    pub fn new(root_domain: &str, preview_domain: Option<&str>) -> Self {
        Self {
            root_domain: strip_port(root_domain).to_ascii_lowercase(),
            preview_domain: preview_domain
                .map(|domain| domain.trim_start_matches('.').to_ascii_lowercase())
                .filter(|domain| !domain.is_empty()),
        }
    }

    pub fn root_domain(&self) -> &str {
        &self.root_domain
    }

    /// Resolve the tenant addressed by `host`. When the host is itself local
    /// or missing, the absolute request URL is consulted as well. `None`
    /// means the root site.
    ///
    /// Malformed or unrecognised hosts resolve to the root site.
    pub fn resolve(&self, host: &str, request_url: &str) -> Option<TenantId> {
        let hostname = strip_port(host.trim()).to_ascii_lowercase();
        let candidate = if is_local(&hostname, request_url) {
            local_subdomain(&hostname, request_url)
        } else {
            self.preview_subdomain(&hostname)
                .or_else(|| self.production_subdomain(&hostname))
        };
        let candidate = candidate?;

        if candidate.trim().is_empty() {
            return None;
        }
        TenantId::parse(&candidate).ok()
    }

    fn preview_subdomain(&self, hostname: &str) -> Option<String> {
        let domain = self.preview_domain.as_deref()?;
        let rest = hostname.strip_suffix(domain)?.strip_suffix('.')?;
        let (tenant, _branch) = rest.split_once(PREVIEW_SEPARATOR)?;
        Some(tenant.to_string())
    }

    fn production_subdomain(&self, hostname: &str) -> Option<String> {
        let root = self.root_domain.as_str();
        if hostname == root || hostname.strip_prefix("www.") == Some(root) {
            return None;
        }
        hostname
            .strip_suffix(root)
            .and_then(|rest| rest.strip_suffix('.'))
            .map(str::to_string)
    }
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

fn is_local_name(name: &str) -> bool {
    LOCAL_HOSTS.contains(&name) || name.ends_with(LOCAL_SUFFIX)
}

/// The request URL only counts when the Host header does not name a
/// production or preview host.
fn is_local(hostname: &str, request_url: &str) -> bool {
    if hostname.is_empty() {
        return url_host(request_url).is_some_and(|host| is_local_name(&host));
    }
    is_local_name(hostname)
}

fn url_host(request_url: &str) -> Option<String> {
    Url::parse(request_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
}

/// First label of a `*.localhost` name, preferring the request URL.
fn local_subdomain(hostname: &str, request_url: &str) -> Option<String> {
    let first_label = |name: &str| {
        name.strip_suffix(LOCAL_SUFFIX)
            .and_then(|rest| rest.split('.').next())
            .map(str::to_string)
    };
    url_host(request_url)
        .and_then(|host| first_label(&host))
        .or_else(|| first_label(hostname))
}
