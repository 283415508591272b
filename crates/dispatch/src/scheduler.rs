//! Campaign scheduler — periodic poller that starts campaigns whose
//! scheduled time has passed.
//!
//! Dispatch is idempotent: every start funnels through the store's atomic
//! state transition, so overlapping poll cycles (or a poll racing a manual
//! start, even from another process) effect exactly one start per campaign.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use blastline_core::BlastError;
use blastline_gateway::GatewayClient;
use blastline_store::CampaignStore;

use crate::queue::QueueManager;

pub struct CampaignScheduler {
    store: Arc<dyn CampaignStore>,
    gateway: Arc<dyn GatewayClient>,
    queue: QueueManager,
    poll_interval: Duration,
}

impl CampaignScheduler {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        gateway: Arc<dyn GatewayClient>,
        queue: QueueManager,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            queue,
            poll_interval,
        }
    }

    /// Poll loop. Runs until the shutdown signal flips to `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.poll_interval.as_secs(), "Scheduler started");
        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Scheduler shutting down");
                        return;
                    }
                }
            }
        }
    }

    /// One poll cycle. Returns how many campaigns were actually started.
    pub async fn tick(&self) -> usize {
        let due = match self.store.list_scheduled_campaigns(Utc::now()).await {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "Scheduler failed to list due campaigns");
                return 0;
            }
        };
        if due.is_empty() {
            return 0;
        }

        let mut started = 0;
        for campaign in due {
            // Defer rather than fail when the gateway is unreachable; the
            // campaign stays `Scheduled` for the next cycle.
            if !self.gateway.health_check().await {
                warn!(campaign_id = %campaign.id, "Gateway unreachable, deferring campaign");
                metrics::counter!("scheduler.deferred").increment(1);
                continue;
            }

            match self.queue.start(campaign.id).await {
                Ok(()) => {
                    info!(campaign_id = %campaign.id, name = %campaign.name, "Scheduled campaign started");
                    metrics::counter!("scheduler.started").increment(1);
                    started += 1;
                }
                // Another cycle or a manual start won the race; skip.
                Err(BlastError::AlreadyRunning(_)) | Err(BlastError::InvalidTransition { .. }) => {
                    debug!(campaign_id = %campaign.id, "Campaign already started elsewhere, skipping");
                }
                Err(e) => {
                    error!(campaign_id = %campaign.id, error = %e, "Failed to start scheduled campaign");
                }
            }
        }
        started
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use blastline_core::config::{DispatchConfig, RetryBackoff};
    use blastline_core::types::{
        Campaign, CampaignStatus, ContactTarget, HumanizationConfig, MediaRef,
    };
    use blastline_gateway::{GatewayError, PhoneValidation, SendReceipt};
    use blastline_store::MemoryStore;
    use std::sync::atomic::{AtomicBool, Ordering};
    use uuid::Uuid;

    struct FlakyGateway {
        healthy: AtomicBool,
    }

    impl FlakyGateway {
        fn new(healthy: bool) -> Self {
            Self {
                healthy: AtomicBool::new(healthy),
            }
        }
    }

    #[async_trait]
    impl GatewayClient for FlakyGateway {
        async fn validate_phone(&self, raw: &str) -> Result<PhoneValidation, GatewayError> {
            Ok(PhoneValidation {
                normalized: raw.to_string(),
                is_valid: true,
            })
        }

        async fn send_message(
            &self,
            _to: &str,
            _content: &str,
            _media: Option<&MediaRef>,
        ) -> Result<SendReceipt, GatewayError> {
            Ok(SendReceipt {
                message_id: Uuid::new_v4().to_string(),
            })
        }

        async fn health_check(&self) -> bool {
            self.healthy.load(Ordering::Relaxed)
        }
    }

    fn due_campaign() -> Campaign {
        let mut campaign = Campaign::new(Uuid::new_v4(), Uuid::new_v4(), "scheduled");
        campaign.template = "hello {{name}}".into();
        campaign.humanization = HumanizationConfig {
            delay_min_ms: 0,
            delay_max_ms: 1,
            randomize_order: false,
        };
        campaign.targets.push(ContactTarget::new("+5511990000001", "c0"));
        campaign.status = CampaignStatus::Scheduled;
        campaign.scheduled_at = Some(Utc::now() - chrono::Duration::minutes(1));
        campaign
    }

    fn make_scheduler(
        store: Arc<MemoryStore>,
        gateway: Arc<FlakyGateway>,
    ) -> (CampaignScheduler, QueueManager) {
        let queue = QueueManager::new(
            store.clone(),
            gateway.clone(),
            DispatchConfig {
                max_attempts: 3,
                retry_backoff: RetryBackoff::Fixed { delay_ms: 1 },
            },
            Duration::from_millis(1_000),
        );
        (
            CampaignScheduler::new(store, gateway, queue.clone(), Duration::from_secs(60)),
            queue,
        )
    }

    #[tokio::test]
    async fn test_tick_starts_due_campaigns() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FlakyGateway::new(true));
        let (scheduler, _) = make_scheduler(store.clone(), gateway);

        let id = store.create_campaign(due_campaign()).await.unwrap();
        assert_eq!(scheduler.tick().await, 1);

        let campaign = store.load_campaign(id).await.unwrap();
        assert_ne!(campaign.status, CampaignStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_tick_defers_when_gateway_unreachable() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FlakyGateway::new(false));
        let (scheduler, _) = make_scheduler(store.clone(), gateway.clone());

        let id = store.create_campaign(due_campaign()).await.unwrap();
        assert_eq!(scheduler.tick().await, 0);
        let campaign = store.load_campaign(id).await.unwrap();
        assert_eq!(campaign.status, CampaignStatus::Scheduled);

        // Gateway recovers: next cycle picks the campaign up.
        gateway.healthy.store(true, Ordering::Relaxed);
        assert_eq!(scheduler.tick().await, 1);
    }

    #[tokio::test]
    async fn test_overlapping_ticks_start_exactly_once() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FlakyGateway::new(true));
        let (scheduler, _) = make_scheduler(store.clone(), gateway);

        store.create_campaign(due_campaign()).await.unwrap();
        let (a, b) = tokio::join!(scheduler.tick(), scheduler.tick());
        assert_eq!(a + b, 1);
    }

    #[tokio::test]
    async fn test_poll_racing_manual_start_effects_one_start() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FlakyGateway::new(true));
        let (scheduler, queue) = make_scheduler(store.clone(), gateway);

        let id = store.create_campaign(due_campaign()).await.unwrap();
        let (ticked, manual) = tokio::join!(scheduler.tick(), queue.start(id));

        let manual_won = manual.is_ok() as usize;
        assert_eq!(ticked + manual_won, 1);
    }

    #[tokio::test]
    async fn test_future_campaigns_left_alone() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FlakyGateway::new(true));
        let (scheduler, _) = make_scheduler(store.clone(), gateway);

        let mut campaign = due_campaign();
        campaign.scheduled_at = Some(Utc::now() + chrono::Duration::hours(2));
        let id = store.create_campaign(campaign).await.unwrap();

        assert_eq!(scheduler.tick().await, 0);
        let unchanged = store.load_campaign(id).await.unwrap();
        assert_eq!(unchanged.status, CampaignStatus::Scheduled);
    }
}
