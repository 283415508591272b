use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

/// One bulk-send job: a template, a captured contact list, and
/// humanization/schedule configuration.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Campaign {
    pub id: Uuid,
    pub account_id: Uuid,
    /// The gateway connection (inbox/session) this campaign sends through.
    pub connection_id: Uuid,
    pub name: String,
    /// Message template with `{{variable}}` placeholders.
    pub template: String,
    pub media: Option<MediaRef>,
    /// Captured at creation time; immutable once execution starts. Order is
    /// the send order (re-persisted once if the campaign shuffles).
    pub targets: Vec<ContactTarget>,
    pub humanization: HumanizationConfig,
    /// When set, the scheduler starts the campaign once this time passes.
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: CampaignStatus,
    pub counters: ProgressCounters,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Campaign {
    pub fn new(account_id: Uuid, connection_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            connection_id,
            name: name.into(),
            template: String::new(),
            media: None,
            targets: Vec::new(),
            humanization: HumanizationConfig::default(),
            scheduled_at: None,
            status: CampaignStatus::Draft,
            counters: ProgressCounters::default(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// True once the campaign can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            CampaignStatus::Completed | CampaignStatus::Cancelled | CampaignStatus::Failed
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MediaRef {
    pub url: String,
    pub media_type: MediaType,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
    Document,
    Audio,
}

/// Pacing configuration: inter-message delays are drawn from a Gaussian
/// clipped to `[delay_min_ms, delay_max_ms]`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HumanizationConfig {
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    pub randomize_order: bool,
}

impl Default for HumanizationConfig {
    fn default() -> Self {
        Self {
            delay_min_ms: 3_000,
            delay_max_ms: 10_000,
            randomize_order: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Running,
    Paused,
    Completed,
    Cancelled,
    Failed,
}

/// Aggregate progress. Invariant: `sent + failed + pending == total`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema)]
pub struct ProgressCounters {
    pub total: u64,
    pub sent: u64,
    pub failed: u64,
    pub pending: u64,
}

impl ProgressCounters {
    pub fn for_total(total: u64) -> Self {
        Self {
            total,
            sent: 0,
            failed: 0,
            pending: total,
        }
    }

    pub fn record_sent(&mut self) {
        self.sent += 1;
        self.pending = self.pending.saturating_sub(1);
    }

    pub fn record_failed(&mut self) {
        self.failed += 1;
        self.pending = self.pending.saturating_sub(1);
    }

    pub fn is_consistent(&self) -> bool {
        self.sent + self.failed + self.pending == self.total
    }
}

/// One contact within a campaign, tracked through its own send outcome.
/// Owned exclusively by its campaign; updated in place, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContactTarget {
    pub id: Uuid,
    /// Phone number as imported.
    pub raw_phone: String,
    /// Canonical number resolved by the gateway's validation call at send time.
    pub resolved_phone: Option<String>,
    pub display_name: String,
    /// Variable bag for template substitution.
    #[serde(default)]
    pub variables: HashMap<String, String>,
    pub status: TargetStatus,
    pub failure_reason: Option<FailureReason>,
    /// Send attempts consumed (initial send plus retries).
    pub attempts: u32,
    pub outcome_at: Option<DateTime<Utc>>,
}

impl ContactTarget {
    pub fn new(raw_phone: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            raw_phone: raw_phone.into(),
            resolved_phone: None,
            display_name: display_name.into(),
            variables: HashMap::new(),
            status: TargetStatus::Pending,
            failure_reason: None,
            attempts: 0,
            outcome_at: None,
        }
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Pending,
    Sent,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Transient failures retried up to the attempt cap, then recorded here.
    TransientExhausted,
    InvalidNumber,
    BlockedContact,
    RejectedPayload,
    GatewayError,
}

impl FailureReason {
    /// Stable label used in report rows and CSV exports.
    pub fn label(&self) -> &'static str {
        match self {
            FailureReason::TransientExhausted => "transient_exhausted",
            FailureReason::InvalidNumber => "invalid_number",
            FailureReason::BlockedContact => "blocked_contact",
            FailureReason::RejectedPayload => "rejected_payload",
            FailureReason::GatewayError => "gateway_error",
        }
    }
}

/// Outcome written back to the store after a target is attempted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetOutcome {
    pub status: TargetStatus,
    pub failure_reason: Option<FailureReason>,
    pub resolved_phone: Option<String>,
    pub attempts: u32,
    pub outcome_at: DateTime<Utc>,
}

impl TargetOutcome {
    pub fn sent(resolved_phone: Option<String>, attempts: u32) -> Self {
        Self {
            status: TargetStatus::Sent,
            failure_reason: None,
            resolved_phone,
            attempts,
            outcome_at: Utc::now(),
        }
    }

    pub fn failed(reason: FailureReason, resolved_phone: Option<String>, attempts: u32) -> Self {
        Self {
            status: TargetStatus::Failed,
            failure_reason: Some(reason),
            resolved_phone,
            attempts,
            outcome_at: Utc::now(),
        }
    }
}

/// Snapshot returned by progress queries for UI display.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProgressSnapshot {
    pub campaign_id: Uuid,
    pub status: CampaignStatus,
    pub total: u64,
    pub sent: u64,
    pub failed: u64,
    pub pending: u64,
    /// Display name of the contact currently being processed, if any.
    pub current_contact: Option<String>,
}
