//! SessionGate: identity resolution provided by the surrounding web app.
//!
//! The relay consults the gate when a client connects and records the result
//! on the connection. It is never used to check the `sender` label of chat
//! messages.

use std::fmt;

use axum::http::HeaderMap;

/// An authenticated user name as resolved by the session layer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait SessionGate: Send + Sync {
    /// Resolve the identity behind an upgrade request, if any
    fn resolve_identity(&self, headers: &HeaderMap) -> Option<Identity>;
}
