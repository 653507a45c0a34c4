//! # Composite container identity.
//!
//! A container is named by `(tenant, bot)`: the tenant (server) it belongs to
//! and the bot identifier within that tenant. The identity is immutable for
//! the life of a container and namespaces any external resources (credential
//! paths, logs). Rendered form is `"<tenant>:<bot>"`.

use std::fmt;
use std::sync::Arc;

/// Immutable composite key naming one container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerIdentity {
    tenant: Arc<str>,
    bot: Arc<str>,
}

impl ContainerIdentity {
    /// Creates an identity from a tenant (server) name and a bot identifier.
    pub fn new(tenant: impl Into<Arc<str>>, bot: impl Into<Arc<str>>) -> Self {
        Self {
            tenant: tenant.into(),
            bot: bot.into(),
        }
    }

    /// Tenant (server) name.
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Bot identifier within the tenant.
    pub fn bot(&self) -> &str {
        &self.bot
    }

    /// Rendered `"<tenant>:<bot>"` form, shared for cheap reuse in events.
    pub(crate) fn render(&self) -> Arc<str> {
        Arc::from(format!("{}:{}", self.tenant, self.bot))
    }
}

impl fmt::Display for ContainerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tenant, self.bot)
    }
}
