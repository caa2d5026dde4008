// ── Event service domain model ──
//
// Stored records (subscriptions, device subscriptions, targets, fabrics,
// aggregates), the southbound `EventDestination` body, and the inbound
// event envelope.

pub mod collection;
pub mod event;
pub mod resource_type;
pub mod subscription;
pub mod target;

// ── Re-exports ──────────────────────────────────────────────────────

pub use collection::{CollectionKind, DEFAULT_ORIGIN_RESOURCES};
pub use event::{Event, MessageData};
pub use subscription::{
    DEFAULT_SUBSCRIPTION_ID, DeviceSubscription, EventDestination, Link, Subscription,
};
pub use target::{Aggregate, Fabric, Target};
