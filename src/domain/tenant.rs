//! Tenant identity and registration invariants.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::error::DomainError;

/// Subdomains that can never be registered as tenants.
pub const RESERVED_TENANTS: [&str; 4] = ["www", "admin", "shield", "core"];

/// The `www` label is treated as the root site, never as a tenant.
pub const ROOT_ALIAS: &str = "www";

const MAX_TENANT_ID_LEN: usize = 63;
const MAX_ICON_CHARS: usize = 10;

/// Lowercase DNS label identifying a tenant (`[a-z0-9-]`, at most 63 chars).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Validate a candidate identifier exactly as supplied.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        if value.trim().is_empty() {
            return Err(DomainError::validation("tenant id must not be empty"));
        }
        if value.len() > MAX_TENANT_ID_LEN {
            return Err(DomainError::validation(format!(
                "tenant id must be at most {MAX_TENANT_ID_LEN} characters"
            )));
        }
        if !value
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(DomainError::validation(
                "tenant id can only contain lowercase letters, numbers, and hyphens",
            ));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root_alias(&self) -> bool {
        self.0 == ROOT_ALIAS
    }

    pub fn is_reserved(&self) -> bool {
        RESERVED_TENANTS.contains(&self.0.as_str())
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TenantId> for String {
    fn from(value: TenantId) -> Self {
        value.0
    }
}

/// Short glyph shown on a tenant's landing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantIcon(String);

impl TenantIcon {
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let count = value.chars().count();
        if count == 0 || value.trim().is_empty() {
            return Err(DomainError::validation("icon is required"));
        }
        if count > MAX_ICON_CHARS {
            return Err(DomainError::validation(format!(
                "icon must be at most {MAX_ICON_CHARS} characters"
            )));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantIcon {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TenantIcon> for String {
    fn from(value: TenantIcon) -> Self {
        value.0
    }
}

/// A registered tenant. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tenant {
    pub id: TenantId,
    pub icon: TenantIcon,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Tenant {
    pub fn new(id: TenantId, icon: TenantIcon, created_at: OffsetDateTime) -> Self {
        Self {
            id,
            icon,
            created_at,
        }
    }
}
