//! Checked-out browsing context

use std::sync::{Arc, Weak};

use anyhow::Result;

use super::LeaseLedger;
use crate::browser::{BrowsingContext, PageSession};
use crate::proxy_pool::ProxyEndpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// Plain identity; returned to the free stack on release
    Poolable,
    /// Bound to a proxy or custom headers, or spilled past `pool_size`;
    /// destroyed on release
    Ephemeral,
}

/// A browsing context owned by exactly one operation until released
///
/// Hand it back with `BrowserPool::release`. A handle dropped while still
/// checked out (a cancelled or timed-out fetch) gives its pool slot back and
/// closes the context in the background.
pub struct ContextHandle {
    id: u64,
    kind: ContextKind,
    context: Arc<dyn BrowsingContext>,
    proxy: Option<ProxyEndpoint>,
    ledger: Weak<LeaseLedger>,
    /// Set while the handle is out on loan
    leased: bool,
}

impl std::fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("context", &self.context.id())
            .field("proxy", &self.proxy.as_ref().map(|p| &p.server))
            .field("leased", &self.leased)
            .finish()
    }
}

impl ContextHandle {
    pub(super) fn new(
        id: u64,
        kind: ContextKind,
        context: Arc<dyn BrowsingContext>,
        proxy: Option<ProxyEndpoint>,
        ledger: Weak<LeaseLedger>,
    ) -> Self {
        Self {
            id,
            kind,
            context,
            proxy,
            ledger,
            leased: false,
        }
    }

    /// Pool-unique id, stable across reuse
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    #[must_use]
    pub fn proxy(&self) -> Option<&ProxyEndpoint> {
        self.proxy.as_ref()
    }

    #[must_use]
    pub fn context(&self) -> &dyn BrowsingContext {
        self.context.as_ref()
    }

    pub(super) fn context_arc(&self) -> &Arc<dyn BrowsingContext> {
        &self.context
    }

    pub(super) fn set_leased(&mut self, leased: bool) {
        self.leased = leased;
    }

    pub async fn new_page(&self) -> Result<Box<dyn PageSession>> {
        self.context.new_page().await
    }
}

impl Drop for ContextHandle {
    fn drop(&mut self) {
        if !self.leased {
            return;
        }
        if let Some(ledger) = self.ledger.upgrade() {
            ledger.abandon(self);
        }
    }
}
