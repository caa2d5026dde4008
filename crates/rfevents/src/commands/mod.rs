//! Command dispatch: bridges CLI args -> event service calls -> output.

pub mod config_cmd;
pub mod events;
pub mod plugins;
pub mod subscriptions;

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use rfevents_core::{
    ApiResponse, EventService, EventServiceConfig, InMemoryStore, NoopInventory,
    NoopTaskReporter, StoreSnapshot,
};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// Dispatch a store-bound command to its handler.
pub async fn dispatch(
    cmd: Command,
    config: EventServiceConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut ctx = Context::open(global, config).await?;
    let result = match cmd {
        Command::Subscriptions(args) => subscriptions::handle(&ctx, args, global).await,
        Command::Publish(args) => events::publish(&ctx, args, global).await,
        Command::TestEvent(args) => events::test_event(&ctx, args, global).await,
        Command::Plugins(args) => plugins::handle(&ctx, args, global).await,
        // Handled before a store is opened
        Command::Config(_) => Ok(()),
    };
    ctx.close(global).await?;
    result
}

// ── Context ─────────────────────────────────────────────────────────

/// The event service over the JSON store file.
pub struct Context {
    store: Arc<InMemoryStore>,
    service: EventService,
}

impl Context {
    async fn open(global: &GlobalOpts, config: EventServiceConfig) -> Result<Self, CliError> {
        let snapshot = load_snapshot(&global.store).await?;
        let store = Arc::new(InMemoryStore::from_snapshot(snapshot));
        let service = EventService::new(
            store.clone(),
            Arc::new(NoopInventory),
            Arc::new(NoopTaskReporter),
            config,
        )?;
        service.reconciler().cache().load().await?;
        Ok(Self { store, service })
    }

    pub fn service(&self) -> &EventService {
        &self.service
    }

    /// Drain deliveries, then write the store back.
    async fn close(&mut self, global: &GlobalOpts) -> Result<(), CliError> {
        self.service.shutdown().await;
        let snapshot = self.store.snapshot()?;
        let json = serde_json::to_vec_pretty(&snapshot).map_err(|e| CliError::Output(e.to_string()))?;
        tokio::fs::write(&global.store, json).await?;
        debug!(path = %global.store.display(), "store saved");
        Ok(())
    }
}

async fn load_snapshot(path: &Path) -> Result<StoreSnapshot, CliError> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "store file absent, starting empty");
            return Ok(StoreSnapshot::default());
        }
        Err(source) => {
            return Err(CliError::Read {
                path: path.display().to_string(),
                source,
            });
        }
    };
    serde_json::from_slice(&raw).map_err(|source| CliError::StoreFile {
        path: path.display().to_string(),
        source,
    })
}

// ── Shared helpers ──────────────────────────────────────────────────

/// Read a request body from a file, or stdin for `-`.
pub fn read_body(path: &Path) -> Result<Vec<u8>, CliError> {
    let read_err = |source| CliError::Read {
        path: path.display().to_string(),
        source,
    };
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf).map_err(read_err)?;
        return Ok(buf);
    }
    std::fs::read(path).map_err(read_err)
}

/// Print a successful response body, or turn a failed one into an error.
pub fn emit(response: &ApiResponse, global: &GlobalOpts) -> Result<(), CliError> {
    if !response.is_success() {
        return Err(CliError::from_response(response));
    }
    if let Some(ref location) = response.location {
        debug!(%location, "created");
    }
    if response.body.is_null() {
        return Ok(());
    }
    let rendered = output::render(&global.output, &response.body)?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
