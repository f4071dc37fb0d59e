//! Permission implied by a forbidden admin request
//!
//! A 403 on `/api/admin/<resource>/...` means the caller lacks
//! `<canonical resource>:<action>`. Known resources map through a fixed table;
//! anything else gets a `custom:` permission so new admin routes can be
//! repaired before anyone adds them here.

use std::fmt;

use serde::Serialize;

/// Access level implied by an HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
    Delete,
}

impl Action {
    /// `DELETE` deletes, `POST`/`PUT`/`PATCH` write, everything else reads
    pub fn from_method(method: &str) -> Self {
        match method.trim().to_ascii_uppercase().as_str() {
            "DELETE" => Self::Delete,
            "POST" | "PUT" | "PATCH" => Self::Write,
            _ => Self::Read,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permission derived from a failed request; never persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionDescriptor {
    /// `<namespace>:<action>`, e.g. `admin:users:write`
    pub resource: String,
    pub action: Action,
    pub description: String,
}

struct ResourceEntry {
    segment: &'static str,
    resource: &'static str,
    description: &'static str,
}

const fn entry(segment: &'static str, resource: &'static str, description: &'static str) -> ResourceEntry {
    ResourceEntry {
        segment,
        resource,
        description,
    }
}

/// Admin route segment to canonical resource; aliases share a resource
const RESOURCES: &[ResourceEntry] = &[
    entry("users", "admin:users", "User management"),
    entry("roles", "admin:roles", "Role management"),
    entry("permissions", "admin:permissions", "Permission management"),
    entry("mail", "admin:mail", "Mail templates"),
    entry("mail-templates", "admin:mail", "Mail templates"),
    entry("notifications", "admin:notifications", "Notification templates"),
    entry("notification-templates", "admin:notifications", "Notification templates"),
    entry("sso", "admin:sso", "Single sign-on providers"),
    entry("cache", "admin:cache", "Cache management"),
    entry("ai", "admin:ai", "AI agent configuration"),
    entry("agents", "admin:ai", "AI agent configuration"),
    entry("gateway", "admin:gateway", "API gateway services"),
    entry("services", "admin:gateway", "API gateway services"),
    entry("blog", "admin:blog", "Blog content"),
    entry("posts", "admin:blog", "Blog content"),
    entry("system", "admin:system", "System diagnostics"),
    entry("diagnostics", "admin:system", "System diagnostics"),
    entry("sessions", "admin:sessions", "Session management"),
    entry("audit", "admin:audit", "Audit log"),
    entry("settings", "admin:settings", "System settings"),
    entry("api-keys", "admin:api_keys", "API keys"),
];

/// Segment used when the path has none at all
const ROOT_SEGMENT: &str = "root";

/// Permission a 403 on `(url, method)` implies; `None` for any other status
///
/// Total for 403: every path yields a well-formed descriptor.
pub fn extract_permission(status: Option<u16>, url: &str, method: &str) -> Option<PermissionDescriptor> {
    if status != Some(403) {
        return None;
    }

    let action = Action::from_method(method);
    let segments = path_segments(url);
    let name = resource_segment(&segments).unwrap_or(ROOT_SEGMENT);
    let lookup = name.to_ascii_lowercase();

    let descriptor = match RESOURCES.iter().find(|r| r.segment == lookup) {
        Some(known) => PermissionDescriptor {
            resource: format!("{}:{action}", known.resource),
            action,
            description: format!("{} ({action})", known.description),
        },
        None => {
            let custom = name.replace('-', "_");
            PermissionDescriptor {
                resource: format!("custom:{custom}:{action}"),
                action,
                description: format!("Custom permission for {name} ({action})"),
            }
        }
    };

    Some(descriptor)
}

/// The segment after `admin`, or the first segment when `admin` is absent
fn resource_segment<'a>(segments: &[&'a str]) -> Option<&'a str> {
    match segments.iter().position(|s| *s == "admin") {
        Some(idx) => segments.get(idx + 1).or_else(|| segments.get(idx)).copied(),
        None => segments.first().copied(),
    }
}

/// Non-empty path segments, ignoring scheme, host, query and fragment
fn path_segments(url: &str) -> Vec<&str> {
    let path = strip_origin(url);
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn strip_origin(url: &str) -> &str {
    url.split_once("://")
        .map_or(url, |(_, rest)| rest.find('/').map_or("", |idx| &rest[idx..]))
}

/// Route pattern for a concrete request path
///
/// Identifier segments become `:id`: anything ending in `id`, plain numbers
/// and UUIDs.
pub fn route_template(url: &str) -> String {
    let segments: Vec<&str> = path_segments(url)
        .into_iter()
        .map(|s| if is_identifier(s) { ":id" } else { s })
        .collect();

    format!("/{}", segments.join("/"))
}

fn is_identifier(segment: &str) -> bool {
    segment.to_ascii_lowercase().ends_with("id")
        || segment.bytes().all(|b| b.is_ascii_digit())
        || uuid::Uuid::try_parse(segment).is_ok()
}
