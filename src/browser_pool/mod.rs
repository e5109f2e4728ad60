//! Pool of reusable browsing contexts on a single engine process
//!
//! Plain acquisitions are served LIFO from a free stack, so the most
//! recently released context is reused first. At most `pool_size` poolable
//! contexts exist at any time; acquisitions beyond that spill to ephemeral
//! contexts instead of blocking. Acquisitions that ask for a proxy or custom
//! headers always get a fresh ephemeral context, which is destroyed on
//! release and never enters the free stack.

mod handle;

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::browser::{
    BASE_LAUNCH_ARGS, BrowserDriver, BrowserEngine, BrowsingContext, ContextOptions,
    LaunchOptions,
};
use crate::config::ServiceConfig;
use crate::errors::{ScrapeError, ScrapeResult};
use crate::proxy_pool::{ProxyEndpoint, ProxyPool};

pub use handle::{ContextHandle, ContextKind};

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct BrowserPoolConfig {
    /// Maximum number of poolable contexts alive at once
    pub pool_size: usize,
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub launch_args: Vec<String>,
    /// Budget for wiping a context before it re-enters the free stack
    pub clear_timeout: Duration,
}

impl Default for BrowserPoolConfig {
    fn default() -> Self {
        let launch = LaunchOptions::default();
        Self {
            pool_size: crate::utils::DEFAULT_BROWSER_POOL_SIZE,
            headless: launch.headless,
            executable: launch.executable,
            user_agent: launch.user_agent,
            viewport: launch.viewport,
            launch_args: launch.args,
            clear_timeout: Duration::from_millis(crate::utils::CONTEXT_CLEAR_TIMEOUT_MS),
        }
    }
}

impl From<&ServiceConfig> for BrowserPoolConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            pool_size: config.browser_pool_size(),
            headless: config.headless(),
            executable: config.chrome_executable().cloned(),
            user_agent: config.user_agent().to_string(),
            viewport: config.viewport(),
            launch_args: BASE_LAUNCH_ARGS.iter().map(|s| (*s).to_string()).collect(),
            clear_timeout: Duration::from_millis(crate::utils::CONTEXT_CLEAR_TIMEOUT_MS),
        }
    }
}

/// What the caller needs from the context it acquires
#[derive(Debug, Clone, Default)]
pub struct AcquireOptions {
    pub use_proxy: bool,
    pub extra_headers: BTreeMap<String, String>,
}

impl AcquireOptions {
    /// Whether this acquisition must get a one-use context
    #[must_use]
    pub fn needs_ephemeral(&self) -> bool {
        self.use_proxy || !self.extra_headers.is_empty()
    }
}

/// How the work done with a context went; forwarded to the proxy pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub pool_size: usize,
    pub idle: usize,
    pub poolable_live: usize,
    pub in_flight: usize,
    pub contexts_created: u64,
    pub contexts_reused: u64,
    pub ephemeral_created: u64,
}

// =============================================================================
// Lease bookkeeping
// =============================================================================

/// Counters shared between the pool and the handles it lends out
///
/// Handles hold this weakly so a dropped handle can give its slot back
/// without keeping the pool alive.
pub(crate) struct LeaseLedger {
    /// Checked-out contexts, closed on shutdown
    in_flight: Mutex<HashMap<u64, Arc<dyn BrowsingContext>>>,
    /// Poolable contexts in existence (idle + checked out)
    poolable_live: AtomicUsize,
}

impl LeaseLedger {
    fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
            poolable_live: AtomicUsize::new(0),
        }
    }

    fn lease(&self, handle: &mut ContextHandle) {
        self.in_flight
            .lock()
            .insert(handle.id(), Arc::clone(handle.context_arc()));
        handle.set_leased(true);
    }

    /// Close the books on a handle; false when shutdown already drained it
    fn end_lease(&self, handle: &mut ContextHandle) -> bool {
        handle.set_leased(false);
        self.in_flight.lock().remove(&handle.id()).is_some()
    }

    fn free_slot(&self) {
        let _ = self
            .poolable_live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| live.checked_sub(1));
    }

    /// A leased handle was dropped without `release`
    ///
    /// The proxy is not blamed; the operation was abandoned, not failed.
    fn abandon(&self, handle: &ContextHandle) {
        let Some(context) = self.in_flight.lock().remove(&handle.id()) else {
            return;
        };
        if handle.kind() == ContextKind::Poolable {
            self.free_slot();
        }

        let id = handle.id();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!(context = id, "Context dropped while checked out, closing");
                runtime.spawn(async move {
                    if let Err(e) = context.close().await {
                        warn!(context = id, "Failed to close abandoned context: {e:#}");
                    }
                });
            }
            Err(_) => warn!(context = id, "Context dropped outside a runtime, left open"),
        }
    }
}

// =============================================================================
// Browser Pool
// =============================================================================

pub struct BrowserPool {
    config: BrowserPoolConfig,
    driver: Arc<dyn BrowserDriver>,
    proxy_pool: Arc<ProxyPool>,
    /// Serializes engine launch so concurrent `initialize` calls launch once
    launch_lock: tokio::sync::Mutex<()>,
    engine: RwLock<Option<Arc<dyn BrowserEngine>>>,
    /// Idle poolable contexts, most recently released last
    free: Mutex<Vec<ContextHandle>>,
    ledger: Arc<LeaseLedger>,
    next_id: AtomicU64,
    contexts_created: AtomicU64,
    contexts_reused: AtomicU64,
    ephemeral_created: AtomicU64,
    /// Set by `shutdown`, cleared only by `initialize`
    shut_down: AtomicBool,
}

impl std::fmt::Debug for BrowserPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserPool")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl BrowserPool {
    /// Create a pool; no engine is launched until `initialize`
    pub fn new(
        config: BrowserPoolConfig,
        driver: Arc<dyn BrowserDriver>,
        proxy_pool: Arc<ProxyPool>,
    ) -> Self {
        Self {
            config,
            driver,
            proxy_pool,
            launch_lock: tokio::sync::Mutex::new(()),
            engine: RwLock::new(None),
            free: Mutex::new(Vec::new()),
            ledger: Arc::new(LeaseLedger::new()),
            next_id: AtomicU64::new(1),
            contexts_created: AtomicU64::new(0),
            contexts_reused: AtomicU64::new(0),
            ephemeral_created: AtomicU64::new(0),
            shut_down: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn config(&self) -> &BrowserPoolConfig {
        &self.config
    }

    #[must_use]
    pub fn proxy_pool(&self) -> &Arc<ProxyPool> {
        &self.proxy_pool
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.engine.read().is_some()
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Launch the engine process; no-op when already running
    ///
    /// Also reopens a pool that was shut down. Launch failure is returned as
    /// `ResourceUnavailable` and not retried.
    pub async fn initialize(&self) -> ScrapeResult<()> {
        self.shut_down.store(false, Ordering::Release);
        self.ensure_engine().await.map(|_| ())
    }

    async fn ensure_engine(&self) -> ScrapeResult<Arc<dyn BrowserEngine>> {
        let running = self.engine.read().clone();
        if let Some(engine) = running {
            return Ok(engine);
        }

        let _guard = self.launch_lock.lock().await;

        // Another caller may have launched while we waited
        let running = self.engine.read().clone();
        if let Some(engine) = running {
            return Ok(engine);
        }
        // Or shut the pool down
        if self.is_shut_down() {
            return Err(pool_closed());
        }

        info!(pool_size = self.config.pool_size, "Initializing browser pool");

        let options = LaunchOptions {
            headless: self.config.headless,
            executable: self.config.executable.clone(),
            user_agent: self.config.user_agent.clone(),
            viewport: self.config.viewport,
            args: self.config.launch_args.clone(),
        };

        let engine = self
            .driver
            .launch(&options)
            .await
            .map_err(|e| ScrapeError::ResourceUnavailable(format!("{e:#}")))?;

        *self.engine.write() = Some(Arc::clone(&engine));
        info!("Browser pool initialized");
        Ok(engine)
    }

    /// Check out a browsing context
    ///
    /// Initializes the engine on first use. Fails with `ResourceUnavailable`
    /// once the pool has been shut down.
    pub async fn acquire(&self, options: &AcquireOptions) -> ScrapeResult<ContextHandle> {
        if self.is_shut_down() {
            return Err(pool_closed());
        }
        let engine = self.ensure_engine().await?;

        if options.needs_ephemeral() {
            let proxy = if options.use_proxy {
                let proxy = self.proxy_pool.next();
                if proxy.is_none() {
                    debug!("Proxy requested but none configured, connecting directly");
                }
                proxy
            } else {
                None
            };
            return self
                .create_context(
                    engine.as_ref(),
                    ContextKind::Ephemeral,
                    proxy,
                    options.extra_headers.clone(),
                )
                .await;
        }

        let reused = self.free.lock().pop();
        if let Some(mut handle) = reused {
            self.contexts_reused.fetch_add(1, Ordering::Relaxed);
            self.ledger.lease(&mut handle);
            debug!(context = handle.id(), "Reusing pooled context");
            return Ok(handle);
        }

        let pool_size = self.config.pool_size;
        let reserved = self
            .ledger
            .poolable_live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                (live < pool_size).then_some(live + 1)
            })
            .is_ok();

        if !reserved {
            debug!(pool_size, "Pool exhausted, spilling to ephemeral context");
            return self
                .create_context(engine.as_ref(), ContextKind::Ephemeral, None, BTreeMap::new())
                .await;
        }

        let created = self
            .create_context(engine.as_ref(), ContextKind::Poolable, None, BTreeMap::new())
            .await;
        if created.is_err() {
            self.ledger.free_slot();
        }
        created
    }

    async fn create_context(
        &self,
        engine: &dyn BrowserEngine,
        kind: ContextKind,
        proxy: Option<ProxyEndpoint>,
        extra_headers: BTreeMap<String, String>,
    ) -> ScrapeResult<ContextHandle> {
        let options = ContextOptions {
            user_agent: self.config.user_agent.clone(),
            viewport: self.config.viewport,
            proxy: proxy.clone(),
            extra_headers,
        };

        let context = engine.new_context(options).await.map_err(|e| {
            // A proxy that cannot even host a context counts against it
            if let Some(proxy) = &proxy {
                self.proxy_pool.report_failure(&proxy.server);
            }
            ScrapeError::ResourceUnavailable(format!("Failed to create browsing context: {e:#}"))
        })?;

        self.contexts_created.fetch_add(1, Ordering::Relaxed);
        if kind == ContextKind::Ephemeral {
            self.ephemeral_created.fetch_add(1, Ordering::Relaxed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut handle = ContextHandle::new(
            id,
            kind,
            Arc::from(context),
            proxy,
            Arc::downgrade(&self.ledger),
        );
        self.ledger.lease(&mut handle);
        debug!(
            context = id,
            ?kind,
            proxy = handle.proxy().map(|p| p.server.as_str()),
            "Created browsing context"
        );
        Ok(handle)
    }

    /// Return a context after use
    ///
    /// Proxy-bound handles report `outcome` to the proxy pool first.
    /// Poolable contexts are wiped and pushed back when there is room;
    /// everything else is destroyed. A wipe that fails or overruns
    /// `clear_timeout` discards the context.
    pub async fn release(&self, mut handle: ContextHandle, outcome: ReleaseOutcome) {
        if let Some(proxy) = handle.proxy() {
            match outcome {
                ReleaseOutcome::Success => self.proxy_pool.report_success(&proxy.server),
                ReleaseOutcome::Failure => self.proxy_pool.report_failure(&proxy.server),
            }
        }

        if handle.kind() == ContextKind::Ephemeral {
            self.ledger.end_lease(&mut handle);
            destroy(&handle).await;
            return;
        }

        if self.is_shut_down() {
            self.retire(handle).await;
            return;
        }

        // Still leased while wiping, so a cancelled release frees the slot
        let cleared = tokio::time::timeout(self.config.clear_timeout, handle.context().clear_state()).await;
        match cleared {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(context = handle.id(), "Failed to clear context state, discarding: {e:#}");
                self.retire(handle).await;
                return;
            }
            Err(_) => {
                warn!(
                    context = handle.id(),
                    timeout = ?self.config.clear_timeout,
                    "Clearing context state timed out, discarding"
                );
                self.retire(handle).await;
                return;
            }
        }

        if !self.ledger.end_lease(&mut handle) {
            // Shutdown drained it while we were wiping
            destroy(&handle).await;
            return;
        }

        let rejected = {
            let mut free = self.free.lock();
            if !self.is_shut_down() && free.len() < self.config.pool_size {
                free.push(handle);
                None
            } else {
                Some(handle)
            }
        };

        match rejected {
            Some(handle) => {
                self.ledger.free_slot();
                destroy(&handle).await;
            }
            None => debug!("Context returned to pool"),
        }
    }

    /// Destroy a checked-out poolable context and give its slot back
    async fn retire(&self, mut handle: ContextHandle) {
        // Shutdown already zeroed the count for contexts it drained
        if self.ledger.end_lease(&mut handle) {
            self.ledger.free_slot();
        }
        destroy(&handle).await;
    }

    /// Close every pooled and checked-out context, then the engine
    ///
    /// Safe to call more than once and without a prior `initialize`. Later
    /// acquisitions fail until `initialize` is called again.
    pub async fn shutdown(&self) -> ScrapeResult<()> {
        info!("Shutting down browser pool");
        self.shut_down.store(true, Ordering::Release);

        let idle: Vec<ContextHandle> = std::mem::take(&mut *self.free.lock());
        let in_flight: Vec<Arc<dyn BrowsingContext>> = self
            .ledger
            .in_flight
            .lock()
            .drain()
            .map(|(_, ctx)| ctx)
            .collect();

        for handle in &idle {
            destroy(handle).await;
        }
        for context in &in_flight {
            if let Err(e) = context.close().await {
                warn!("Failed to close in-flight context {}: {e:#}", context.id());
            }
        }
        self.ledger.poolable_live.store(0, Ordering::Release);

        let engine = self.engine.write().take();
        if let Some(engine) = engine {
            engine
                .close()
                .await
                .map_err(|e| ScrapeError::ResourceUnavailable(format!("{e:#}")))?;
        }

        info!("Browser pool shutdown complete");
        Ok(())
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            pool_size: self.config.pool_size,
            idle: self.free.lock().len(),
            poolable_live: self.ledger.poolable_live.load(Ordering::Acquire),
            in_flight: self.ledger.in_flight.lock().len(),
            contexts_created: self.contexts_created.load(Ordering::Relaxed),
            contexts_reused: self.contexts_reused.load(Ordering::Relaxed),
            ephemeral_created: self.ephemeral_created.load(Ordering::Relaxed),
        }
    }

    /// Ids currently sitting in the free stack, bottom to top
    #[must_use]
    pub fn idle_context_ids(&self) -> Vec<u64> {
        self.free.lock().iter().map(ContextHandle::id).collect()
    }
}

fn pool_closed() -> ScrapeError {
    ScrapeError::ResourceUnavailable("Browser pool is shut down".to_string())
}

async fn destroy(handle: &ContextHandle) {
    if let Err(e) = handle.context().close().await {
        warn!(context = handle.id(), "Failed to close context: {e:#}");
    } else {
        debug!(context = handle.id(), "Context destroyed");
    }
}
