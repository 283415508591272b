//! Outbound messaging gateway interface.
//!
//! The gateway is the external service that actually delivers messages to
//! end recipients. The dispatch engine only sees this narrow surface:
//! phone validation, message send, and a connectivity check.

pub mod client;
pub mod provider;

pub use client::{GatewayClient, GatewayError, GatewayErrorKind, PhoneValidation, SendReceipt};
pub use provider::HttpGateway;
