//! Beacon Daemon - Connection registry and signaling relay server
//!
//! This crate provides the core infrastructure for the beacon daemon:
//! - `registry` - Connection registry actor mapping channels and participants to connections
//! - `router` - Routing of offers, answers and join requests between hosts and participants
//! - `server` - HTTP/WebSocket server and per-connection lifecycle
//! - `config` - TOML configuration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      beacond daemon                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │  BeaconServer   │     │     RegistryActor           │   │
//! │  │ (axum, /ws)     │     │  (binding state owner)      │   │
//! │  └────────┬────────┘     └──────────────▲──────────────┘   │
//! │           │                             │                   │
//! │           │ upgrades                    │ commands          │
//! │           ▼                             │                   │
//! │  ┌─────────────────┐     ┌──────────────┴──────────────┐   │
//! │  │ConnectionHandler│────▶│     MessageRouter           │   │
//! │  │  (per client)   │     │  (relays to peer queues)    │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod conn;
pub mod registry;
pub mod router;
pub mod server;
