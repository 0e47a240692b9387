//! Beacon Core - Shared types for the signaling broker
//!
//! This crate provides the identifier types shared between
//! the wire protocol (beacon-protocol) and the daemon (beacond).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod ids;
pub mod role;

// Re-exports for convenience
pub use ids::{ChannelId, ConnectionId, ParticipantId};
pub use role::ClientRole;
