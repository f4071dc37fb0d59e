use std::fmt;

use keywarden_core::Action;
use serde::{Deserialize, Serialize};

/// Identifier of a backend record; the backend uses both numeric and string ids
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_owned())
    }
}

/// Response envelope
///
/// List and create endpoints answer either `{ "data": ... }` or the bare
/// payload. Both shapes are accepted here and nowhere else.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}

/// Permission as stored by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub id: RecordId,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl PermissionRecord {
    /// Whether this record grants exactly `resource`
    pub fn grants(&self, resource: &str) -> bool {
        self.resource.as_deref() == Some(resource) || self.name.as_deref() == Some(resource)
    }
}

/// Body of a permission create call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPermission {
    pub resource: String,
    pub name: String,
    pub action: Action,
    pub description: String,
    pub route: String,
    pub method: String,
    pub category: String,
}

/// Role as stored by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Body of a role-permission attach call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RolePermissions<'a> {
    pub permission_ids: &'a [RecordId],
}

/// Current operator session
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub roles: Vec<serde_json::Value>,
    #[serde(default)]
    pub permissions: Vec<serde_json::Value>,
}

impl Session {
    /// Display name for logs
    pub fn label(&self) -> String {
        self.email
            .clone()
            .or_else(|| self.username.clone())
            .or_else(|| self.id.as_ref().map(ToString::to_string))
            .unwrap_or_else(|| "unknown".to_owned())
    }
}
