// ── Event service facade ──
//
// Wires the store, plugin gateway, cache, reconciler, router and monitor
// from one `EventServiceConfig`, and owns the background tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use rfevents_api::{PluginGateway, TransportConfig};

use crate::cache::SubscriptionCache;
use crate::config::EventServiceConfig;
use crate::error::CoreError;
use crate::inventory::InventoryService;
use crate::monitor::PluginMonitor;
use crate::reconciler::SubscriptionReconciler;
use crate::router::{Deliverer, EventRouter};
use crate::store::SubscriptionStore;
use crate::task::TaskReporter;

pub struct EventService {
    reconciler: SubscriptionReconciler,
    router: EventRouter,
    monitor: PluginMonitor,
    config: EventServiceConfig,
    cancel: CancellationToken,
    background: Vec<JoinHandle<()>>,
}

impl EventService {
    /// Build every component with HTTP clients derived from `config`.
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        inventory: Arc<dyn InventoryService>,
        tasks: Arc<dyn TaskReporter>,
        config: EventServiceConfig,
    ) -> Result<Self, CoreError> {
        let transport = TransportConfig::new(
            (&config.plugin.tls).into(),
            Duration::from_secs(config.plugin.request_timeout_secs),
        );
        let http = transport.build_client()?;
        let gateway = Arc::new(PluginGateway::with_client(
            http,
            &config.plugin.scheme,
            config.plugin_status_polling.probe_policy(),
        ));
        let deliverer = Arc::new(Deliverer::new(&config.delivery)?);
        Ok(Self::with_parts(store, gateway, deliverer, inventory, tasks, config))
    }

    /// Build around a prepared gateway and deliverer.
    pub fn with_parts(
        store: Arc<dyn SubscriptionStore>,
        gateway: Arc<PluginGateway>,
        deliverer: Arc<Deliverer>,
        inventory: Arc<dyn InventoryService>,
        tasks: Arc<dyn TaskReporter>,
        config: EventServiceConfig,
    ) -> Self {
        let cache = Arc::new(SubscriptionCache::new(Arc::clone(&store)));
        let reconciler = SubscriptionReconciler::new(
            Arc::clone(&store),
            Arc::clone(&gateway),
            cache,
            tasks,
            &config,
        );
        let router = EventRouter::new(reconciler.clone(), inventory, deliverer, &config);
        let monitor = PluginMonitor::new(store, gateway, &config.plugin_status_polling);
        Self {
            reconciler,
            router,
            monitor,
            config,
            cancel: CancellationToken::new(),
            background: Vec::new(),
        }
    }

    pub fn reconciler(&self) -> &SubscriptionReconciler {
        &self.reconciler
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    pub fn monitor(&self) -> &PluginMonitor {
        &self.monitor
    }

    pub fn config(&self) -> &EventServiceConfig {
        &self.config
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Load the cache and start the refresh and monitor loops.
    pub async fn start(&mut self) -> Result<(), CoreError> {
        self.reconciler.cache().load().await?;

        let refresh = self.config.cache.refresh_interval_secs;
        if refresh > 0 {
            self.background.push(
                self.reconciler
                    .cache()
                    .spawn_refresh(Duration::from_secs(refresh), self.cancel.child_token()),
            );
        }
        if let Some(handle) = self.monitor.spawn(self.cancel.child_token()) {
            self.background.push(handle);
        }
        info!(tasks = self.background.len(), "event service started");
        Ok(())
    }

    /// Stop background loops and drain in-flight deliveries.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        for handle in self.background.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        self.router.wait_idle().await;
        info!("event service stopped");
    }
}
