//! Connection registry using Actor pattern.
//!
//! The registry maps channel ids to host connections and participant ids to
//! participant connections. It receives commands via a tokio mpsc channel,
//! which serializes every register, lookup and remove.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌─────────────────┐
//! │ ConnectionHandler│────▶│  RegistryActor  │
//! │  (per client)    │     │                 │
//! └──────────────────┘     └────────┬────────┘
//!         │                         │
//!         │   RegistryCommand       │ owns
//!         │   (mpsc channel)        ▼
//!         ▼                 HashMap<ChannelId, ConnectionHandle>
//!  register / lookup /      HashMap<ParticipantId, ConnectionHandle>
//!  join / remove            HashMap<ConnectionId, keys> (reverse index)
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::mpsc;

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{RegistryCommand, RegistryError, RegistryStats, Removal};
pub use handle::RegistryHandle;

/// Command channel buffer size
const COMMAND_BUFFER: usize = 256;

/// Spawn the registry actor and return a handle for interaction.
///
/// The actor stops once every clone of the returned handle is dropped.
///
/// # Example
///
/// ```no_run
/// use beacond::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_registry();
///
///     let stats = handle.stats().await;
/// }
/// ```
pub fn spawn_registry() -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = RegistryActor::new(cmd_rx);
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx)
}
