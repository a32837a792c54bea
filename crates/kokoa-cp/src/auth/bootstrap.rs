//! Bootstrap secret that gates edge node enrollment.

use axum::http::HeaderMap;
use kokoa_core::wire::BOOTSTRAP_HEADER;

use super::node_token::bearer_token;

/// Result of checking a request against the bootstrap secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapCheck {
    /// No secret configured; enrollment is refused outright.
    Disabled,
    Rejected,
    Accepted,
}

/// The shared enrollment secret, configured out-of-band at startup.
#[derive(Clone, Default)]
pub struct BootstrapSecret(Option<String>);

impl std::fmt::Debug for BootstrapSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BootstrapSecret")
            .field(&self.0.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl BootstrapSecret {
    /// An empty or blank secret leaves enrollment disabled.
    pub fn new(secret: &str) -> Self {
        let secret = secret.trim();
        if secret.is_empty() {
            Self(None)
        } else {
            Self(Some(secret.to_string()))
        }
    }

    pub const fn is_configured(&self) -> bool {
        self.0.is_some()
    }

    /// Accepts `Authorization: Bearer <secret>` or `X-Bootstrap-Token: <secret>`.
    pub fn check(&self, headers: &HeaderMap) -> BootstrapCheck {
        let Some(secret) = self.0.as_deref() else {
            return BootstrapCheck::Disabled;
        };

        if bearer_token(headers) == Some(secret) {
            return BootstrapCheck::Accepted;
        }

        let alternate = headers
            .get(BOOTSTRAP_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim);
        if alternate == Some(secret) {
            return BootstrapCheck::Accepted;
        }

        BootstrapCheck::Rejected
    }
}
