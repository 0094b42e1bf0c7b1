//! SessionGate の実装
//!
//! Cookie セッションの発行と検証は Web アプリ本体（認証プロキシ）の責務です。
//! ここでは本体が付与したヘッダーを読むだけの実装を提供します。

use axum::http::HeaderMap;

use crate::domain::{Identity, SessionGate};

/// Header set by the fronting auth layer once the session cookie is verified
pub const AUTHENTICATED_USER_HEADER: &str = "x-authenticated-user";

/// Reads the identity from [`AUTHENTICATED_USER_HEADER`].
#[derive(Debug, Clone, Default)]
pub struct HeaderSessionGate;

impl SessionGate for HeaderSessionGate {
    fn resolve_identity(&self, headers: &HeaderMap) -> Option<Identity> {
        headers
            .get(AUTHENTICATED_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(Identity::new)
    }
}

/// Resolves nobody; every connection is anonymous.
#[derive(Debug, Clone, Default)]
pub struct AnonymousSessionGate;

impl SessionGate for AnonymousSessionGate {
    fn resolve_identity(&self, _headers: &HeaderMap) -> Option<Identity> {
        None
    }
}
