//! In-memory `CampaignStore` backed by `DashMap`.
//!
//! The exclusive entry guard gives per-campaign atomicity, which is what
//! makes `transition` a true compare-and-swap. A SQL/Redis implementation
//! would replace this behind the same trait.

use async_trait::async_trait;
use blastline_core::types::{
    Campaign, CampaignStatus, ContactTarget, ProgressCounters, TargetOutcome, TargetStatus,
};
use blastline_core::{BlastError, BlastResult};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use crate::store::CampaignStore;

#[derive(Default)]
pub struct MemoryStore {
    campaigns: DashMap<Uuid, Campaign>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            campaigns: DashMap::new(),
        }
    }

    fn recompute_counters(campaign: &mut Campaign) {
        let mut counters = ProgressCounters {
            total: campaign.targets.len() as u64,
            ..Default::default()
        };
        for target in &campaign.targets {
            match target.status {
                TargetStatus::Pending => counters.pending += 1,
                TargetStatus::Sent => counters.sent += 1,
                TargetStatus::Failed => counters.failed += 1,
            }
        }
        campaign.counters = counters;
    }
}

#[async_trait]
impl CampaignStore for MemoryStore {
    async fn create_campaign(&self, mut campaign: Campaign) -> BlastResult<Uuid> {
        let id = campaign.id;
        Self::recompute_counters(&mut campaign);
        info!(campaign_id = %id, targets = campaign.targets.len(), "Storing campaign");
        self.campaigns.insert(id, campaign);
        Ok(id)
    }

    async fn load_campaign(&self, id: Uuid) -> BlastResult<Campaign> {
        self.campaigns
            .get(&id)
            .map(|c| c.clone())
            .ok_or(BlastError::CampaignNotFound(id))
    }

    async fn list_campaigns(&self) -> BlastResult<Vec<Campaign>> {
        Ok(self.campaigns.iter().map(|c| c.clone()).collect())
    }

    async fn list_scheduled_campaigns(&self, before: DateTime<Utc>) -> BlastResult<Vec<Campaign>> {
        Ok(self
            .campaigns
            .iter()
            .filter(|c| {
                c.status == CampaignStatus::Scheduled
                    && c.scheduled_at.is_some_and(|at| at <= before)
            })
            .map(|c| c.clone())
            .collect())
    }

    async fn transition(
        &self,
        id: Uuid,
        allowed_from: &[CampaignStatus],
        to: CampaignStatus,
    ) -> BlastResult<CampaignStatus> {
        let mut entry = self
            .campaigns
            .get_mut(&id)
            .ok_or(BlastError::CampaignNotFound(id))?;

        let from = entry.status;
        if !allowed_from.contains(&from) {
            return Err(BlastError::InvalidTransition { from, to });
        }

        entry.status = to;
        if to == CampaignStatus::Running && entry.started_at.is_none() {
            entry.started_at = Some(Utc::now());
        }
        if entry.is_terminal() && entry.completed_at.is_none() {
            entry.completed_at = Some(Utc::now());
        }
        info!(campaign_id = %id, ?from, ?to, "Campaign state transition");
        Ok(from)
    }

    async fn save_campaign_state(
        &self,
        id: Uuid,
        status: CampaignStatus,
        counters: ProgressCounters,
    ) -> BlastResult<()> {
        let mut entry = self
            .campaigns
            .get_mut(&id)
            .ok_or(BlastError::CampaignNotFound(id))?;
        entry.status = status;
        entry.counters = counters;
        if entry.is_terminal() && entry.completed_at.is_none() {
            entry.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn load_pending_targets(&self, id: Uuid) -> BlastResult<Vec<ContactTarget>> {
        let entry = self
            .campaigns
            .get(&id)
            .ok_or(BlastError::CampaignNotFound(id))?;
        Ok(entry
            .targets
            .iter()
            .filter(|t| t.status == TargetStatus::Pending)
            .cloned()
            .collect())
    }

    async fn save_target_order(&self, id: Uuid, order: &[Uuid]) -> BlastResult<()> {
        let mut entry = self
            .campaigns
            .get_mut(&id)
            .ok_or(BlastError::CampaignNotFound(id))?;

        let mut reordered = Vec::with_capacity(entry.targets.len());
        for target_id in order {
            if let Some(pos) = entry.targets.iter().position(|t| t.id == *target_id) {
                reordered.push(entry.targets.remove(pos));
            }
        }
        // Targets not named in the order (already attempted) keep their place
        // ahead of the reordered pending tail.
        let mut targets = std::mem::take(&mut entry.targets);
        targets.append(&mut reordered);
        entry.targets = targets;
        Ok(())
    }

    async fn save_target_outcome(
        &self,
        id: Uuid,
        target_id: Uuid,
        outcome: TargetOutcome,
    ) -> BlastResult<ProgressCounters> {
        let mut entry = self
            .campaigns
            .get_mut(&id)
            .ok_or(BlastError::CampaignNotFound(id))?;

        let target = entry
            .targets
            .iter_mut()
            .find(|t| t.id == target_id)
            .ok_or_else(|| BlastError::Store(format!("target {target_id} not found")))?;

        target.status = outcome.status;
        target.failure_reason = outcome.failure_reason;
        target.attempts = outcome.attempts;
        target.outcome_at = Some(outcome.outcome_at);
        if outcome.resolved_phone.is_some() {
            target.resolved_phone = outcome.resolved_phone;
        }

        Self::recompute_counters(&mut entry);
        Ok(entry.counters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campaign_with_targets(n: usize) -> Campaign {
        let mut campaign = Campaign::new(Uuid::new_v4(), Uuid::new_v4(), "test");
        campaign.template = "hello {{name}}".into();
        for i in 0..n {
            campaign
                .targets
                .push(ContactTarget::new(format!("+551198765432{i}"), format!("c{i}")));
        }
        campaign
    }

    #[tokio::test]
    async fn test_transition_cas_single_winner() {
        let store = MemoryStore::new();
        let id = store
            .create_campaign(campaign_with_targets(1))
            .await
            .unwrap();

        let allowed = [CampaignStatus::Draft, CampaignStatus::Scheduled];
        let first = store
            .transition(id, &allowed, CampaignStatus::Running)
            .await;
        let second = store
            .transition(id, &allowed, CampaignStatus::Running)
            .await;

        assert!(first.is_ok());
        assert!(matches!(
            second,
            Err(BlastError::InvalidTransition {
                from: CampaignStatus::Running,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_transition_stamps_timestamps() {
        let store = MemoryStore::new();
        let id = store
            .create_campaign(campaign_with_targets(1))
            .await
            .unwrap();

        store
            .transition(id, &[CampaignStatus::Draft], CampaignStatus::Running)
            .await
            .unwrap();
        let running = store.load_campaign(id).await.unwrap();
        assert!(running.started_at.is_some());
        assert!(running.completed_at.is_none());

        store
            .transition(id, &[CampaignStatus::Running], CampaignStatus::Completed)
            .await
            .unwrap();
        let done = store.load_campaign(id).await.unwrap();
        assert!(done.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_outcome_updates_counters() {
        let store = MemoryStore::new();
        let campaign = campaign_with_targets(3);
        let target_id = campaign.targets[0].id;
        let id = store.create_campaign(campaign).await.unwrap();

        let counters = store
            .save_target_outcome(id, target_id, TargetOutcome::sent(None, 1))
            .await
            .unwrap();
        assert_eq!(counters.sent, 1);
        assert_eq!(counters.pending, 2);
        assert!(counters.is_consistent());

        let pending = store.load_pending_targets(id).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|t| t.id != target_id));
    }

    #[tokio::test]
    async fn test_target_order_persisted() {
        let store = MemoryStore::new();
        let campaign = campaign_with_targets(3);
        let ids: Vec<Uuid> = campaign.targets.iter().map(|t| t.id).collect();
        let id = store.create_campaign(campaign).await.unwrap();

        let order = vec![ids[2], ids[0], ids[1]];
        store.save_target_order(id, &order).await.unwrap();

        let pending = store.load_pending_targets(id).await.unwrap();
        let got: Vec<Uuid> = pending.iter().map(|t| t.id).collect();
        assert_eq!(got, order);
    }

    #[tokio::test]
    async fn test_list_scheduled_filters_by_time() {
        let store = MemoryStore::new();
        let mut due = campaign_with_targets(1);
        due.status = CampaignStatus::Scheduled;
        due.scheduled_at = Some(Utc::now() - chrono::Duration::minutes(5));
        let mut future = campaign_with_targets(1);
        future.status = CampaignStatus::Scheduled;
        future.scheduled_at = Some(Utc::now() + chrono::Duration::hours(1));
        let due_id = due.id;
        store.create_campaign(due).await.unwrap();
        store.create_campaign(future).await.unwrap();

        let listed = store.list_scheduled_campaigns(Utc::now()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, due_id);
    }
}
