use std::sync::{Arc, OnceLock};

use super::{DataSourceHandle, Result, TenantError};

/// Tenant connection state of a single unit of work (request or job).
///
/// Starts unbound. Once a handle is bound it stays bound for the lifetime of
/// the unit of work. Clones share the binding, so the context can travel
/// through request extensions.
#[derive(Clone, Default)]
pub struct TenantContext {
    bound: Arc<OnceLock<DataSourceHandle>>,
}

impl TenantContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The handle bound to this unit of work, if any.
    pub fn current(&self) -> Option<DataSourceHandle> {
        self.bound.get().cloned()
    }

    /// Like [`current`](Self::current), failing with `NoTenantContext` when unbound.
    pub fn require(&self) -> Result<DataSourceHandle> {
        self.current().ok_or(TenantError::NoTenantContext)
    }

    pub fn is_bound(&self) -> bool {
        self.bound.get().is_some()
    }

    /// Binds `handle`. Re-binding the same tenant returns the handle already
    /// bound; binding another tenant is refused.
    pub fn set_current(&self, handle: DataSourceHandle) -> Result<DataSourceHandle> {
        let requested = handle.tenant_id();
        let bound = self.bound.get_or_init(|| handle);
        if bound.tenant_id() != requested {
            return Err(TenantError::ContextAlreadyBound {
                bound: bound.tenant_id(),
                requested,
            });
        }
        Ok(bound.clone())
    }
}

impl std::fmt::Debug for TenantContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantContext")
            .field("tenant", &self.bound.get().map(|h| h.tenant_id()))
            .finish()
    }
}
