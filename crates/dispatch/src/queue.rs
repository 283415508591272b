//! Queue manager — owns the execution lifecycle of running campaigns.
//!
//! Each running campaign gets one cooperative send loop (a spawned task)
//! that walks the pending targets in stored order: render, resolve the
//! phone, send with a bounded timeout, classify failures, persist the
//! outcome durably, then wait out a humanized delay. Pause/cancel are
//! advisory signals checked before each send and before each delay — never
//! mid-send — so no message is sent twice and no outcome is lost mid-write.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use blastline_core::config::{DispatchConfig, RetryBackoff};
use blastline_core::templates;
use blastline_core::types::{
    Campaign, CampaignStatus, ContactTarget, FailureReason, ProgressSnapshot, TargetOutcome,
    TargetStatus,
};
use blastline_core::{BlastError, BlastResult};
use blastline_gateway::{GatewayClient, GatewayError, GatewayErrorKind};
use blastline_store::CampaignStore;

use crate::humanization;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlSignal {
    Run,
    Pause,
    Cancel,
}

struct CampaignHandle {
    control: watch::Sender<ControlSignal>,
    current_contact: Arc<Mutex<Option<String>>>,
    /// Which spawn of the send loop owns this registration. A resume can
    /// replace the handle before the superseded loop finishes its cleanup.
    generation: u64,
}

/// What happened to one target: a recorded outcome, or a control signal
/// that interrupted the attempt sequence before it resolved.
enum TargetAttempt {
    Completed(TargetOutcome),
    Interrupted(ControlSignal),
}

/// Drives campaign send loops. Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct QueueManager {
    store: Arc<dyn CampaignStore>,
    gateway: Arc<dyn GatewayClient>,
    config: DispatchConfig,
    send_timeout: Duration,
    active: Arc<DashMap<Uuid, CampaignHandle>>,
    epoch: Arc<AtomicU64>,
}

impl std::fmt::Debug for QueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager")
            .field("active", &self.active.len())
            .finish()
    }
}

impl QueueManager {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        gateway: Arc<dyn GatewayClient>,
        config: DispatchConfig,
        send_timeout: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            config,
            send_timeout,
            active: Arc::new(DashMap::new()),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start a campaign. Validates configuration synchronously, wins (or
    /// loses) the atomic `Draft|Scheduled -> Running` transition at the
    /// store, establishes the send order, and spawns the send loop.
    pub async fn start(&self, id: Uuid) -> BlastResult<()> {
        let campaign = self.store.load_campaign(id).await?;
        validate_campaign(&campaign)?;

        let first_start = campaign.started_at.is_none();
        match self
            .store
            .transition(
                id,
                &[CampaignStatus::Draft, CampaignStatus::Scheduled],
                CampaignStatus::Running,
            )
            .await
        {
            Ok(_) => {}
            Err(BlastError::InvalidTransition {
                from: CampaignStatus::Running,
                ..
            }) => return Err(BlastError::AlreadyRunning(id)),
            Err(e) => return Err(e),
        }

        // Shuffle once, on the first start only; the persisted order is the
        // send order for the whole campaign lifetime, resumes included.
        if first_start && campaign.humanization.randomize_order {
            let mut pending = self.store.load_pending_targets(id).await?;
            humanization::shuffle_targets(&mut pending);
            let order: Vec<Uuid> = pending.iter().map(|t| t.id).collect();
            self.store.save_target_order(id, &order).await?;
        }

        info!(campaign_id = %id, targets = campaign.targets.len(), "Starting campaign");
        self.spawn_loop(id);
        Ok(())
    }

    /// Signal the send loop to suspend after the in-flight send completes.
    /// Idempotent when already paused.
    pub async fn pause(&self, id: Uuid) -> BlastResult<()> {
        let campaign = self.store.load_campaign(id).await?;
        match campaign.status {
            CampaignStatus::Paused => Ok(()),
            CampaignStatus::Running => {
                if let Some(handle) = self.active.get(&id) {
                    let _ = handle.control.send(ControlSignal::Pause);
                } else {
                    // No loop in this process (recovered state): persist directly.
                    self.store
                        .transition(id, &[CampaignStatus::Running], CampaignStatus::Paused)
                        .await?;
                }
                info!(campaign_id = %id, "Pause requested");
                Ok(())
            }
            from => Err(BlastError::InvalidTransition {
                from,
                to: CampaignStatus::Paused,
            }),
        }
    }

    /// Continue a paused campaign from the persisted pending set. Targets
    /// already `Sent` or `Failed` are never re-sent.
    pub async fn resume(&self, id: Uuid) -> BlastResult<()> {
        match self
            .store
            .transition(id, &[CampaignStatus::Paused], CampaignStatus::Running)
            .await
        {
            Ok(_) => {}
            Err(BlastError::InvalidTransition {
                from: CampaignStatus::Running,
                ..
            }) => return Err(BlastError::AlreadyRunning(id)),
            Err(e) => return Err(e),
        }
        info!(campaign_id = %id, "Resuming campaign");
        self.spawn_loop(id);
        Ok(())
    }

    /// Stop processing. Targets not yet attempted remain `Pending` in the
    /// record for audit; they are never sent.
    pub async fn cancel(&self, id: Uuid) -> BlastResult<()> {
        self.store
            .transition(
                id,
                &[CampaignStatus::Running, CampaignStatus::Paused],
                CampaignStatus::Cancelled,
            )
            .await?;
        if let Some(handle) = self.active.get(&id) {
            let _ = handle.control.send(ControlSignal::Cancel);
        }
        info!(campaign_id = %id, "Campaign cancelled");
        Ok(())
    }

    /// Read-only progress snapshot for UI display.
    pub async fn progress(&self, id: Uuid) -> BlastResult<ProgressSnapshot> {
        let campaign = self.store.load_campaign(id).await?;
        let current_contact = self
            .active
            .get(&id)
            .and_then(|h| h.current_contact.lock().ok().and_then(|g| g.clone()));
        Ok(ProgressSnapshot {
            campaign_id: id,
            status: campaign.status,
            total: campaign.counters.total,
            sent: campaign.counters.sent,
            failed: campaign.counters.failed,
            pending: campaign.counters.pending,
            current_contact,
        })
    }

    fn spawn_loop(&self, id: Uuid) {
        let (tx, rx) = watch::channel(ControlSignal::Run);
        let current_contact = Arc::new(Mutex::new(None));
        let generation = self.epoch.fetch_add(1, Ordering::Relaxed);
        self.active.insert(
            id,
            CampaignHandle {
                control: tx,
                current_contact: current_contact.clone(),
                generation,
            },
        );
        let mgr = self.clone();
        tokio::spawn(async move {
            mgr.run_loop(id, generation, rx, current_contact).await;
        });
    }

    /// Drop this loop's own registration only. A resume may already have
    /// installed a newer handle under the same id; that one must survive, or
    /// pause/cancel would lose their signal path to the live loop.
    fn unregister(&self, id: Uuid, generation: u64) {
        self.active
            .remove_if(&id, |_, handle| handle.generation == generation);
    }

    async fn run_loop(
        &self,
        id: Uuid,
        generation: u64,
        mut rx: watch::Receiver<ControlSignal>,
        current_contact: Arc<Mutex<Option<String>>>,
    ) {
        if let Err(e) = self.drive(id, &mut rx, &current_contact).await {
            // Infrastructure failure: pause defensively rather than losing
            // progress; the campaign is resumable once the store recovers.
            error!(campaign_id = %id, error = %e, "Campaign loop failed; pausing defensively");
            if let Err(e) = self
                .store
                .transition(id, &[CampaignStatus::Running], CampaignStatus::Paused)
                .await
            {
                error!(campaign_id = %id, error = %e, "Defensive pause failed");
            }
        }
        self.unregister(id, generation);
    }

    async fn drive(
        &self,
        id: Uuid,
        rx: &mut watch::Receiver<ControlSignal>,
        current_contact: &Arc<Mutex<Option<String>>>,
    ) -> BlastResult<()> {
        let campaign = self.store.load_campaign(id).await?;
        let pending = self.store.load_pending_targets(id).await?;
        info!(campaign_id = %id, pending = pending.len(), "Send loop running");

        let last = pending.len().saturating_sub(1);
        for (i, target) in pending.iter().enumerate() {
            // Copy the signal out: holding the watch guard across an await
            // would pin a non-Send borrow inside the spawned future.
            let signal = *rx.borrow();
            match signal {
                ControlSignal::Cancel => return Ok(()),
                ControlSignal::Pause => return self.persist_pause(id).await,
                ControlSignal::Run => {}
            }

            if let Ok(mut guard) = current_contact.lock() {
                *guard = Some(target.display_name.clone());
            }

            let started = Instant::now();
            let outcome = match self.process_target(&campaign, target, rx).await {
                TargetAttempt::Completed(outcome) => outcome,
                TargetAttempt::Interrupted(ControlSignal::Pause) => {
                    return self.persist_pause(id).await
                }
                TargetAttempt::Interrupted(_) => return Ok(()),
            };
            metrics::histogram!("dispatch.target_latency_ms")
                .record(started.elapsed().as_millis() as f64);
            match outcome.status {
                TargetStatus::Sent => metrics::counter!("dispatch.sent").increment(1),
                _ => {
                    let reason = outcome
                        .failure_reason
                        .map(|r| r.label())
                        .unwrap_or("unknown");
                    metrics::counter!("dispatch.failed", "reason" => reason).increment(1);
                }
            }

            // Outcome persistence for target N happens-before target N+1.
            let counters = self.store.save_target_outcome(id, target.id, outcome).await?;
            debug!(
                campaign_id = %id,
                sent = counters.sent,
                failed = counters.failed,
                pending = counters.pending,
                "Target outcome recorded"
            );

            if i < last {
                let signal = *rx.borrow();
                match signal {
                    ControlSignal::Cancel => return Ok(()),
                    ControlSignal::Pause => return self.persist_pause(id).await,
                    ControlSignal::Run => {}
                }
                let delay_ms = humanization::calculate_delay(
                    campaign.humanization.delay_min_ms,
                    campaign.humanization.delay_max_ms,
                );
                match self
                    .cancellable_sleep(Duration::from_millis(delay_ms), rx)
                    .await
                {
                    ControlSignal::Cancel => return Ok(()),
                    ControlSignal::Pause => return self.persist_pause(id).await,
                    ControlSignal::Run => {}
                }
            }
        }

        if let Ok(mut guard) = current_contact.lock() {
            *guard = None;
        }
        match self
            .store
            .transition(id, &[CampaignStatus::Running], CampaignStatus::Completed)
            .await
        {
            Ok(_) => info!(campaign_id = %id, "Campaign completed"),
            // A cancel can land between the last outcome and this point.
            Err(BlastError::InvalidTransition { .. }) => {}
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Process one target through the full pipeline. Per-target failures are
    /// always recovered locally into an outcome; only infrastructure errors
    /// escape (via the store calls in the caller). The retry backoff is a
    /// suspension point like the inter-message delay: a pause/cancel signal
    /// interrupts it instead of waiting it out and spending more attempts.
    async fn process_target(
        &self,
        campaign: &Campaign,
        target: &ContactTarget,
        rx: &mut watch::Receiver<ControlSignal>,
    ) -> TargetAttempt {
        let body = templates::render(&campaign.template, &target.variables);

        let resolved = match &target.resolved_phone {
            Some(phone) => phone.clone(),
            None => match self.gateway.validate_phone(&target.raw_phone).await {
                Ok(v) if v.is_valid => v.normalized,
                Ok(_) => {
                    warn!(target_id = %target.id, raw = %target.raw_phone, "Invalid phone number");
                    return TargetAttempt::Completed(TargetOutcome::failed(
                        FailureReason::InvalidNumber,
                        None,
                        0,
                    ));
                }
                Err(e) => {
                    warn!(target_id = %target.id, error = %e, "Phone validation failed");
                    return TargetAttempt::Completed(TargetOutcome::failed(
                        FailureReason::GatewayError,
                        None,
                        0,
                    ));
                }
            },
        };

        let max_attempts = self.config.max_attempts.max(1);
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let send = self
                .gateway
                .send_message(&resolved, &body, campaign.media.as_ref());
            let err = match tokio::time::timeout(self.send_timeout, send).await {
                Ok(Ok(receipt)) => {
                    debug!(
                        target_id = %target.id,
                        message_id = %receipt.message_id,
                        attempts,
                        "Message accepted by gateway"
                    );
                    return TargetAttempt::Completed(TargetOutcome::sent(Some(resolved), attempts));
                }
                Ok(Err(e)) => e,
                Err(_) => GatewayError::timeout(format!(
                    "send exceeded {} ms",
                    self.send_timeout.as_millis()
                )),
            };

            if !err.is_transient() {
                let reason = match err.kind {
                    GatewayErrorKind::InvalidNumber => FailureReason::InvalidNumber,
                    GatewayErrorKind::BlockedContact => FailureReason::BlockedContact,
                    GatewayErrorKind::RejectedPayload => FailureReason::RejectedPayload,
                    _ => FailureReason::GatewayError,
                };
                warn!(target_id = %target.id, error = %err, "Permanent send failure");
                return TargetAttempt::Completed(TargetOutcome::failed(
                    reason,
                    Some(resolved),
                    attempts,
                ));
            }

            if attempts >= max_attempts {
                warn!(target_id = %target.id, attempts, "Transient failures exhausted retry cap");
                return TargetAttempt::Completed(TargetOutcome::failed(
                    FailureReason::TransientExhausted,
                    Some(resolved),
                    attempts,
                ));
            }

            metrics::counter!("dispatch.retries").increment(1);
            let backoff_ms = match self.config.retry_backoff {
                RetryBackoff::Humanized => humanization::calculate_delay(
                    campaign.humanization.delay_min_ms,
                    campaign.humanization.delay_max_ms,
                ),
                RetryBackoff::Fixed { delay_ms } => delay_ms,
            };
            debug!(
                target_id = %target.id,
                attempt = attempts,
                backoff_ms,
                error = %err,
                "Retrying after transient failure"
            );
            match self
                .cancellable_sleep(Duration::from_millis(backoff_ms), rx)
                .await
            {
                ControlSignal::Run => {}
                signal => {
                    debug!(target_id = %target.id, attempts, "Retry backoff interrupted");
                    return TargetAttempt::Interrupted(signal);
                }
            }
        }
    }

    async fn persist_pause(&self, id: Uuid) -> BlastResult<()> {
        match self
            .store
            .transition(id, &[CampaignStatus::Running], CampaignStatus::Paused)
            .await
        {
            Ok(_) => {
                let campaign = self.store.load_campaign(id).await?;
                self.store
                    .save_campaign_state(id, CampaignStatus::Paused, campaign.counters)
                    .await?;
                info!(campaign_id = %id, pending = campaign.counters.pending, "Campaign paused");
            }
            // A cancel won the race; nothing left to persist.
            Err(BlastError::InvalidTransition { .. }) => {}
            Err(e) => return Err(e),
        }
        Ok(())
    }

    async fn cancellable_sleep(
        &self,
        duration: Duration,
        rx: &mut watch::Receiver<ControlSignal>,
    ) -> ControlSignal {
        tokio::select! {
            _ = tokio::time::sleep(duration) => *rx.borrow(),
            result = rx.changed() => {
                let _ = result;
                *rx.borrow()
            }
        }
    }
}

/// Configuration errors are rejected synchronously at start; the campaign
/// never leaves `Draft`.
fn validate_campaign(campaign: &Campaign) -> BlastResult<()> {
    if campaign.template.trim().is_empty() {
        return Err(BlastError::Config("message template is empty".into()));
    }
    if campaign.targets.is_empty() {
        return Err(BlastError::Config("contact list is empty".into()));
    }
    let h = &campaign.humanization;
    if h.delay_min_ms > h.delay_max_ms {
        return Err(BlastError::Config(format!(
            "delay bounds inverted: min {} > max {}",
            h.delay_min_ms, h.delay_max_ms
        )));
    }
    Ok(())
}
