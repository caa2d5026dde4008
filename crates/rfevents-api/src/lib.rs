//! Southbound gateway to Redfish device-management plugins.
//!
//! - **[`PluginGateway`]** owns the HTTP client, the per-plugin session
//!   token cache and the EMB topic registry. [`PluginGateway::call`] picks
//!   basic or token auth from the plugin record and retries once after a
//!   healthy status probe when the transport fails.
//! - **Health probe**: [`PluginGateway::check_status`] races
//!   `GET /ODIM/v1/Status` against a response timer for a bounded number of
//!   rounds.

pub mod error;
pub mod gateway;
pub mod models;
pub mod status;
pub mod token;
pub mod topics;
pub mod transport;

pub use error::Error;
pub use gateway::PluginGateway;
pub use models::{AuthType, Plugin, PluginRequest, PluginResponse, StatusResponse};
pub use status::{ProbePolicy, StatusReport};
pub use token::TokenCache;
pub use topics::TopicRegistry;
pub use transport::{TlsMode, TransportConfig};

/// Plugin login endpoint.
pub const SESSIONS_PATH: &str = "/ODIM/v1/Sessions";
/// Plugin health endpoint.
pub const STATUS_PATH: &str = "/ODIM/v1/Status";
/// Southbound event subscription endpoint.
pub const SUBSCRIPTIONS_PATH: &str = "/ODIM/v1/Subscriptions";
/// Plugin start-up resync endpoint.
pub const STARTUP_PATH: &str = "/ODIM/v1/Startup";
