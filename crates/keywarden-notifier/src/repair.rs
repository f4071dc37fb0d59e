//! Permission repair workflow
//!
//! Given a 403 and the permission it implies, make sure that permission
//! exists, grant it to the repair role, refresh the operator session and
//! schedule a reload so the new grant takes effect.
//!
//! The remote steps are not atomic. A permission created before a failed
//! grant is simply found and reused on the next attempt.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use keywarden_client::{AdminApi, ClientError, NewPermission, RecordId};
use keywarden_config::RepairConfig;
use keywarden_core::{ErrorEvent, ErrorStore, PermissionDescriptor, route_template};
use tokio::task::JoinHandle;

/// Category tag for permissions created by the workflow
const CUSTOM_CATEGORY: &str = "custom";

/// Reloads whatever depends on the operator's permissions
#[async_trait]
pub trait Reload: Send + Sync {
    async fn reload(&self);
}

/// Repair failures that stop the workflow
#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    /// Roles could not be fetched
    #[error("failed to fetch roles: {0}")]
    Roles(#[source] ClientError),

    /// The grant itself was rejected
    #[error("failed to grant permission to role '{role}': {source}")]
    Grant {
        role: String,
        #[source]
        source: ClientError,
    },
}

/// Successful grant
#[derive(Debug)]
pub struct Granted {
    pub permission_id: RecordId,
    pub role_id: RecordId,
    /// Whether the permission had to be created
    pub created: bool,
    /// Pending reload; resolves once the reload hook has run
    pub reload: JoinHandle<()>,
}

/// How a repair attempt ended
#[derive(Debug)]
pub enum RepairOutcome {
    Granted(Granted),
    /// Another repair for the same error is still running
    AlreadyInProgress,
    /// The event is not a 403, so nothing is implied
    NotRepairable,
    /// No permission could be found or created
    NoPermission,
    /// The repair role does not exist
    RoleNotFound,
}

type RepairCallback = dyn Fn(&ErrorEvent, &PermissionDescriptor) + Send + Sync;

/// Grants missing permissions to the repair role
pub struct PermissionRepair {
    api: Arc<dyn AdminApi>,
    store: Arc<dyn ErrorStore>,
    reloader: Arc<dyn Reload>,
    role: String,
    reload_delay: Duration,
    fixing: Arc<Mutex<HashSet<String>>>,
    on_repaired: Option<Arc<RepairCallback>>,
}

impl PermissionRepair {
    pub fn new(
        api: Arc<dyn AdminApi>,
        store: Arc<dyn ErrorStore>,
        reloader: Arc<dyn Reload>,
        config: &RepairConfig,
    ) -> Self {
        Self {
            api,
            store,
            reloader,
            role: config.role.clone(),
            reload_delay: config.reload_delay,
            fixing: Arc::default(),
            on_repaired: None,
        }
    }

    /// Invoke `callback` after a successful grant, before the reload
    #[must_use]
    pub fn with_callback(mut self, callback: impl Fn(&ErrorEvent, &PermissionDescriptor) + Send + Sync + 'static) -> Self {
        self.on_repaired = Some(Arc::new(callback));
        self
    }

    /// Whether a repair for `error_id` is running
    pub fn is_fixing(&self, error_id: &str) -> bool {
        lock(&self.fixing).contains(error_id)
    }

    /// Repair using the permission derived from the event itself
    pub async fn repair_event(&self, event: &ErrorEvent) -> Result<RepairOutcome, RepairError> {
        match event.permission() {
            Some(descriptor) => self.repair(event, &descriptor).await,
            None => Ok(RepairOutcome::NotRepairable),
        }
    }

    /// Run the workflow for one error
    ///
    /// At most one run per error id is active; concurrent calls for the same
    /// id return [`RepairOutcome::AlreadyInProgress`].
    pub async fn repair(
        &self,
        event: &ErrorEvent,
        descriptor: &PermissionDescriptor,
    ) -> Result<RepairOutcome, RepairError> {
        let Some(_guard) = FixingGuard::acquire(&self.fixing, &event.id) else {
            tracing::debug!(error_id = %event.id, "repair already in progress");
            return Ok(RepairOutcome::AlreadyInProgress);
        };

        tracing::info!(error_id = %event.id, resource = %descriptor.resource, "repairing permission");

        let permission = self.resolve_permission(event, descriptor).await;

        let roles = self.api.list_roles().await.map_err(RepairError::Roles)?;
        let Some(role) = roles.into_iter().find(|r| r.name == self.role) else {
            tracing::warn!(role = %self.role, "repair role not found");
            return Ok(RepairOutcome::RoleNotFound);
        };

        let Some((permission_id, created)) = permission else {
            tracing::warn!(resource = %descriptor.resource, "no permission to grant");
            return Ok(RepairOutcome::NoPermission);
        };

        self.api
            .add_permissions_to_role(&role.id, std::slice::from_ref(&permission_id))
            .await
            .map_err(|source| RepairError::Grant {
                role: role.name.clone(),
                source,
            })?;

        tracing::info!(
            error_id = %event.id,
            resource = %descriptor.resource,
            permission_id = %permission_id,
            role = %role.name,
            "permission granted"
        );

        self.store.dismiss(&event.id);
        self.refresh_session().await;

        if let Some(callback) = &self.on_repaired {
            callback(event, descriptor);
        }

        Ok(RepairOutcome::Granted(Granted {
            permission_id,
            role_id: role.id,
            created,
            reload: self.schedule_reload(),
        }))
    }

    /// Find the permission by resource or create it; failures are logged
    async fn resolve_permission(
        &self,
        event: &ErrorEvent,
        descriptor: &PermissionDescriptor,
    ) -> Option<(RecordId, bool)> {
        let existing = match self.api.list_permissions().await {
            Ok(existing) => existing,
            Err(e) => {
                tracing::warn!(error = %e, "failed to look up permissions");
                return None;
            }
        };

        if let Some(found) = existing.into_iter().find(|p| p.grants(&descriptor.resource)) {
            tracing::debug!(permission_id = %found.id, "reusing existing permission");
            return Some((found.id, false));
        }

        let url = event.details.url.as_deref().unwrap_or_default();
        let method = event.details.method.as_deref().unwrap_or("GET").to_ascii_uppercase();
        let route = route_template(url);

        let permission = NewPermission {
            resource: descriptor.resource.clone(),
            name: descriptor.resource.clone(),
            action: descriptor.action,
            description: format!("{} - auto-created for {method} {route}", descriptor.description),
            route,
            method,
            category: CUSTOM_CATEGORY.to_owned(),
        };

        match self.api.create_permission(&permission).await {
            Ok(created) => {
                tracing::info!(permission_id = %created.id, resource = %descriptor.resource, "created permission");
                Some((created.id, true))
            }
            Err(e) => {
                tracing::warn!(resource = %descriptor.resource, error = %e, "failed to create permission");
                None
            }
        }
    }

    async fn refresh_session(&self) {
        match self.api.current_session().await {
            Ok(session) => tracing::info!(user = %session.label(), "session refreshed"),
            Err(e) => tracing::warn!(error = %e, "failed to refresh session"),
        }
    }

    fn schedule_reload(&self) -> JoinHandle<()> {
        let reloader = Arc::clone(&self.reloader);
        let delay = self.reload_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            reloader.reload().await;
        })
    }
}

/// Membership in the fixing set, released on drop whatever the outcome
struct FixingGuard {
    fixing: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl FixingGuard {
    fn acquire(fixing: &Arc<Mutex<HashSet<String>>>, id: &str) -> Option<Self> {
        if !lock(fixing).insert(id.to_owned()) {
            return None;
        }

        Some(Self {
            fixing: Arc::clone(fixing),
            id: id.to_owned(),
        })
    }
}

impl Drop for FixingGuard {
    fn drop(&mut self) {
        lock(&self.fixing).remove(&self.id);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
