//! Infrastructure layer: concrete implementations of the domain interfaces
//! and the wire DTOs.

pub mod dto;
pub mod encoder;
pub mod history;
pub mod registry;
pub mod session_gate;
