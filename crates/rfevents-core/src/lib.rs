//! Redfish event subscription management and event routing.
//!
//! - **[`SubscriptionReconciler`]** validates client subscription requests,
//!   expands collection and aggregate origins into concrete devices,
//!   registers one southbound subscription per device with its plugin and
//!   keeps the stored subscription and device-subscription records in step.
//!   Deletes re-register the surviving union of filters.
//!
//! - **[`EventRouter`]** takes inbound device event envelopes, rewrites
//!   local resource IDs to their aggregated form, matches each event
//!   against the cached subscriptions and delivers grouped envelopes to
//!   subscriber destinations. Specific events also feed the inventory side
//!   channel ([`InventoryService`]).
//!
//! - **[`SubscriptionCache`]** answers subscription lookups from an
//!   atomically swapped index, mirrored on every reconciler write.
//!
//! - **[`PluginMonitor`]** probes plugins on a timer, registers their
//!   message-bus topics and pushes start-up inventory to plugins that come
//!   up.
//!
//! - **[`EventService`]** wires all of the above from an
//!   [`EventServiceConfig`] over any [`SubscriptionStore`].

pub mod cache;
pub mod config;
pub mod error;
pub mod inventory;
pub mod model;
pub mod monitor;
pub mod reconciler;
pub mod response;
pub mod router;
pub mod service;
pub mod store;
pub mod task;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::SubscriptionCache;
pub use config::{
    DeliveryConfig, EventServiceConfig, PluginStatusPolling, TlsVerification, UrlTranslation,
};
pub use error::{CoreError, StoreError};
pub use inventory::{InventoryService, NoopInventory};
pub use model::{
    DeviceSubscription, Event, EventDestination, MessageData, Subscription, Target,
};
pub use monitor::{PluginHealth, PluginMonitor};
pub use reconciler::{SubscriptionCollection, SubscriptionReconciler, SubscriptionView};
pub use response::{ApiResponse, StatusMessage};
pub use router::{Deliverer, EventRouter};
pub use service::EventService;
pub use store::{InMemoryStore, StoreSnapshot, SubscriptionQuery, SubscriptionStore, Table};
pub use task::{MemoryTaskReporter, NoopTaskReporter, TaskReporter, TaskState, TaskUpdate};
