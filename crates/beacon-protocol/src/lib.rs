//! Beacon Protocol - Wire protocol for signaling clients
//!
//! This crate provides the message types exchanged between host and
//! participant clients and the broker, and the single decode step that
//! turns a text frame into a typed message.

pub mod message;
pub mod parse;

pub use message::{InboundMessage, OutboundMessage};
pub use parse::{decode, DecodeError};
