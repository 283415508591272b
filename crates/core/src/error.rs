use thiserror::Error;
use uuid::Uuid;

use crate::types::CampaignStatus;

pub type BlastResult<T> = Result<T, BlastError>;

#[derive(Error, Debug)]
pub enum BlastError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Campaign {0} not found")]
    CampaignNotFound(Uuid),

    #[error("Campaign {0} is already running")]
    AlreadyRunning(Uuid),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: CampaignStatus,
        to: CampaignStatus,
    },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
