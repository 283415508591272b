use async_trait::async_trait;
use blastline_core::types::MediaRef;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result of the gateway's phone validation endpoint. Locally-entered
/// numbers may include or omit a regional digit; `normalized` is the
/// canonical number the gateway actually delivers to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneValidation {
    pub normalized: String,
    pub is_valid: bool,
}

/// Receipt for an accepted send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReceipt {
    pub message_id: String,
}

#[derive(Error, Debug, Clone)]
#[error("{kind:?} (http {http_status:?}): {message}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub http_status: Option<u16>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    Timeout,
    RateLimited,
    ServerError,
    Network,
    InvalidNumber,
    BlockedContact,
    RejectedPayload,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, http_status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            http_status,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Timeout, None, message)
    }

    /// Transient failures may succeed on retry; permanent ones cannot.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            GatewayErrorKind::Timeout
                | GatewayErrorKind::RateLimited
                | GatewayErrorKind::ServerError
                | GatewayErrorKind::Network
        )
    }
}

/// Client for the external messaging gateway. Implementations route to the
/// real service; tests script outcomes.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Resolve a raw, locally-entered number to the canonical form.
    async fn validate_phone(&self, raw_number: &str) -> Result<PhoneValidation, GatewayError>;

    /// Deliver one message. Errors carry enough structure for the
    /// transient/permanent classification in the dispatch loop.
    async fn send_message(
        &self,
        normalized_number: &str,
        content: &str,
        media: Option<&MediaRef>,
    ) -> Result<SendReceipt, GatewayError>;

    /// Lightweight connectivity check used by the scheduler before starting
    /// a due campaign.
    async fn health_check(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        for kind in [
            GatewayErrorKind::Timeout,
            GatewayErrorKind::RateLimited,
            GatewayErrorKind::ServerError,
            GatewayErrorKind::Network,
        ] {
            assert!(GatewayError::new(kind, Some(503), "x").is_transient());
        }
        for kind in [
            GatewayErrorKind::InvalidNumber,
            GatewayErrorKind::BlockedContact,
            GatewayErrorKind::RejectedPayload,
        ] {
            assert!(!GatewayError::new(kind, Some(400), "x").is_transient());
        }
    }
}
