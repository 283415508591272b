use async_trait::async_trait;
use blastline_core::types::{
    Campaign, CampaignStatus, ContactTarget, ProgressCounters, TargetOutcome,
};
use blastline_core::BlastResult;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Durable record store for campaigns and their targets.
///
/// All writes are assumed durable: a crash mid-campaign loses at most the
/// in-flight send, never previously-recorded outcomes. `transition` is the
/// single atomic compare-and-swap every state change funnels through, so a
/// scheduler poll and a manual start racing from different processes effect
/// exactly one start.
#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn create_campaign(&self, campaign: Campaign) -> BlastResult<Uuid>;

    async fn load_campaign(&self, id: Uuid) -> BlastResult<Campaign>;

    async fn list_campaigns(&self) -> BlastResult<Vec<Campaign>>;

    /// Campaigns in state `Scheduled` whose scheduled-start time is before
    /// the given instant.
    async fn list_scheduled_campaigns(&self, before: DateTime<Utc>) -> BlastResult<Vec<Campaign>>;

    /// Atomically move a campaign from one of `allowed_from` to `to`.
    /// Returns the previous status, or `InvalidTransition` naming the actual
    /// current status when the precondition fails. Sets `started_at` on the
    /// first move into `Running` and `completed_at` on terminal states.
    async fn transition(
        &self,
        id: Uuid,
        allowed_from: &[CampaignStatus],
        to: CampaignStatus,
    ) -> BlastResult<CampaignStatus>;

    /// Persist status and aggregate counters.
    async fn save_campaign_state(
        &self,
        id: Uuid,
        status: CampaignStatus,
        counters: ProgressCounters,
    ) -> BlastResult<()>;

    /// Still-pending targets, in stored (send) order.
    async fn load_pending_targets(&self, id: Uuid) -> BlastResult<Vec<ContactTarget>>;

    /// Persist the send order established at start time (after a shuffle).
    async fn save_target_order(&self, id: Uuid, order: &[Uuid]) -> BlastResult<()>;

    /// Persist one target's outcome and the campaign's updated counters in a
    /// single durable write.
    async fn save_target_outcome(
        &self,
        id: Uuid,
        target_id: Uuid,
        outcome: TargetOutcome,
    ) -> BlastResult<ProgressCounters>;
}
