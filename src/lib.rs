//! Starlane: an authoritative turn-resolution server for a 4X space game.
//!
//! Exposes the object graph, empires, orders, turn resolution, and the
//! server shell for use by integration tests and the binary entry point.

pub mod config;
pub mod content;
pub mod empire;
pub mod order;
pub mod protocol;
pub mod resolve;
pub mod server;
pub mod universe;
