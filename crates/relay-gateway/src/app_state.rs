//! Shared application state for the classroom relay gateway.
//!
//! Everything here is `Arc`-backed and cloneable, the same shape the donor
//! used for its `AppState` — one cheap-to-clone handle threaded through
//! router state, WebSocket tasks, and background sweeps.

use std::sync::Arc;
use std::time::Instant;

use crate::active_count::ActiveCountCache;
use crate::config::GatewayConfig;
use crate::dispatch::Dispatcher;
use crate::directory::ClassroomDirectory;
use crate::health::HealthMonitor;
use crate::lifecycle::{LifecycleConfig, LifecycleManager};
use crate::obs::metrics::GatewayMetrics;
use crate::orchestrator::Orchestrator;
use crate::providers::{
    CachingTtsProvider, NullTranslationProvider, NullTtsProvider, RetryingTranslationProvider,
    RetryingTtsProvider, TranslationProvider, TtsProvider,
};
use crate::registry::ConnectionRegistry;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    store: Arc<Store>,
    directory: Arc<ClassroomDirectory>,
    registry: Arc<ConnectionRegistry>,
    health: Arc<HealthMonitor>,
    orchestrator: Arc<Orchestrator>,
    lifecycle: Arc<LifecycleManager>,
    active_count: Arc<ActiveCountCache>,
    metrics: Arc<GatewayMetrics>,
    dispatcher: Arc<Dispatcher>,
    tts: Arc<dyn TtsProvider>,
    started_at: Instant,
}

impl AppState {
    pub fn new(cfg: GatewayConfig, store: Store, dispatcher: Dispatcher) -> Self {
        Self::with_providers(
            cfg,
            store,
            dispatcher,
            Arc::new(RetryingTranslationProvider::new(NullTranslationProvider)),
            Arc::new(CachingTtsProvider::new(RetryingTtsProvider::new(NullTtsProvider))),
        )
    }

    pub fn with_providers(
        cfg: GatewayConfig,
        store: Store,
        dispatcher: Dispatcher,
        translation: Arc<dyn TranslationProvider>,
        tts: Arc<dyn TtsProvider>,
    ) -> Self {
        let store = Arc::new(store);
        let registry = ConnectionRegistry::new();
        let metrics = Arc::new(GatewayMetrics::default());
        let directory = ClassroomDirectory::new(cfg.classroom_code_expiration);
        let health = HealthMonitor::new();
        let orchestrator = Orchestrator::new(registry.clone(), store.clone(), translation, tts.clone(), metrics.clone());
        let lifecycle_cfg = LifecycleConfig::from_std(
            cfg.session_empty_teacher_timeout,
            cfg.session_all_students_left_timeout,
            cfg.session_stale_timeout,
        );
        let lifecycle = LifecycleManager::new(store.clone(), lifecycle_cfg);
        let active_count = ActiveCountCache::new();

        Self {
            inner: Arc::new(AppStateInner {
                cfg,
                store,
                directory,
                registry,
                health,
                orchestrator,
                lifecycle,
                active_count,
                metrics,
                dispatcher: Arc::new(dispatcher),
                tts,
                started_at: Instant::now(),
            }),
        }
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.inner.store
    }

    pub fn directory(&self) -> &Arc<ClassroomDirectory> {
        &self.inner.directory
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.inner.registry
    }

    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.inner.health
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.inner.orchestrator
    }

    pub fn lifecycle(&self) -> &Arc<LifecycleManager> {
        &self.inner.lifecycle
    }

    pub fn active_count(&self) -> &Arc<ActiveCountCache> {
        &self.inner.active_count
    }

    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.inner.metrics
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.inner.dispatcher
    }

    pub fn tts(&self) -> &Arc<dyn TtsProvider> {
        &self.inner.tts
    }

    pub fn is_draining(&self) -> bool {
        self.inner.metrics.is_draining()
    }

    pub fn set_draining(&self) {
        self.inner.metrics.set_draining();
    }

    pub fn uptime(&self) -> std::time::Duration {
        self.inner.started_at.elapsed()
    }
}
