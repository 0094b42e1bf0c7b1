//! Real-time chat relay library.
//!
//! Accepts long-lived WebSocket connections, groups them into rooms, fans
//! every message out to the whole room in acceptance order and persists the
//! room history independently of delivery.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
