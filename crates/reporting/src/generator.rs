use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use blastline_core::types::{CampaignStatus, TargetStatus};
use blastline_core::BlastResult;
use blastline_store::CampaignStore;

/// Aggregated view of one campaign's outcomes at generation time.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CampaignReport {
    pub campaign_id: Uuid,
    pub campaign_name: String,
    pub status: CampaignStatus,
    pub generated_at: DateTime<Utc>,
    pub total: u64,
    pub sent: u64,
    pub failed: u64,
    pub pending: u64,
    /// `sent / total`.
    pub delivery_rate: f64,
    /// `started -> completed`, or `started -> now` while still running.
    pub duration_secs: Option<i64>,
    /// Failure counts bucketed by reason label.
    pub error_breakdown: HashMap<String, u64>,
    pub rows: Vec<ReportRow>,
}

/// One per-contact detail row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReportRow {
    pub phone: String,
    pub name: String,
    pub status: TargetStatus,
    pub reason: Option<String>,
    pub outcome_at: Option<DateTime<Utc>>,
    pub attempts: u32,
}

/// Deltas between two independently generated reports (`b` minus `a`).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComparisonReport {
    pub campaign_a: Uuid,
    pub campaign_b: Uuid,
    pub sent_rate_delta: f64,
    pub failure_rate_delta: f64,
    pub duration_delta_secs: Option<i64>,
}

/// Read-only aggregation over a campaign's targets.
#[derive(Clone)]
pub struct ReportGenerator {
    store: Arc<dyn CampaignStore>,
}

impl ReportGenerator {
    pub fn new(store: Arc<dyn CampaignStore>) -> Self {
        Self { store }
    }

    pub async fn generate(&self, campaign_id: Uuid) -> BlastResult<CampaignReport> {
        let campaign = self.store.load_campaign(campaign_id).await?;

        let mut error_breakdown: HashMap<String, u64> = HashMap::new();
        let mut rows = Vec::with_capacity(campaign.targets.len());
        for target in &campaign.targets {
            if let Some(reason) = target.failure_reason {
                *error_breakdown.entry(reason.label().to_string()).or_insert(0) += 1;
            }
            rows.push(ReportRow {
                phone: target
                    .resolved_phone
                    .clone()
                    .unwrap_or_else(|| target.raw_phone.clone()),
                name: target.display_name.clone(),
                status: target.status,
                reason: target.failure_reason.map(|r| r.label().to_string()),
                outcome_at: target.outcome_at,
                attempts: target.attempts,
            });
        }

        let counters = campaign.counters;
        let delivery_rate = if counters.total > 0 {
            counters.sent as f64 / counters.total as f64
        } else {
            0.0
        };
        let duration_secs = campaign.started_at.map(|started| {
            let end = campaign.completed_at.unwrap_or_else(Utc::now);
            end.signed_duration_since(started).num_seconds()
        });

        info!(campaign_id = %campaign_id, total = counters.total, "Report generated");

        Ok(CampaignReport {
            campaign_id,
            campaign_name: campaign.name.clone(),
            status: campaign.status,
            generated_at: Utc::now(),
            total: counters.total,
            sent: counters.sent,
            failed: counters.failed,
            pending: counters.pending,
            delivery_rate,
            duration_secs,
            error_breakdown,
            rows,
        })
    }

    /// Compute deltas between two campaigns' reports. Mutates neither.
    pub async fn compare(&self, a: Uuid, b: Uuid) -> BlastResult<ComparisonReport> {
        let report_a = self.generate(a).await?;
        let report_b = self.generate(b).await?;
        Ok(ComparisonReport {
            campaign_a: a,
            campaign_b: b,
            sent_rate_delta: rate(report_b.sent, report_b.total) - rate(report_a.sent, report_a.total),
            failure_rate_delta: rate(report_b.failed, report_b.total)
                - rate(report_a.failed, report_a.total),
            duration_delta_secs: match (report_a.duration_secs, report_b.duration_secs) {
                (Some(da), Some(db)) => Some(db - da),
                _ => None,
            },
        })
    }
}

fn rate(part: u64, total: u64) -> f64 {
    if total > 0 {
        part as f64 / total as f64
    } else {
        0.0
    }
}

/// Flatten per-contact rows into CSV bytes. Stable column order, UTF-8,
/// RFC-4180 quoting for embedded delimiters, quotes, and newlines.
pub fn export_csv(report: &CampaignReport) -> Vec<u8> {
    let mut csv = String::from("phone,name,status,reason,timestamp,attempts\n");
    for row in &report.rows {
        let status = match row.status {
            TargetStatus::Pending => "pending",
            TargetStatus::Sent => "sent",
            TargetStatus::Failed => "failed",
        };
        let timestamp = row
            .outcome_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        let fields = [
            csv_escape(&row.phone),
            csv_escape(&row.name),
            status.to_string(),
            csv_escape(row.reason.as_deref().unwrap_or("")),
            timestamp,
            row.attempts.to_string(),
        ];
        csv.push_str(&fields.join(","));
        csv.push('\n');
    }
    csv.into_bytes()
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
