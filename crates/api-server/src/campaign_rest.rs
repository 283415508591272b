//! Campaign control and reporting REST endpoints.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use blastline_core::types::{
    Campaign, CampaignStatus, ContactTarget, HumanizationConfig, MediaRef, ProgressCounters,
    ProgressSnapshot,
};
use blastline_core::BlastError;
use blastline_reporting::{export_csv, CampaignReport, ComparisonReport};

use crate::rest::{AppState, ErrorResponse};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn map_error(e: BlastError) -> ApiError {
    let (status, code) = match &e {
        BlastError::CampaignNotFound(_) => (StatusCode::NOT_FOUND, "campaign_not_found"),
        BlastError::Config(_) => (StatusCode::BAD_REQUEST, "invalid_configuration"),
        BlastError::AlreadyRunning(_) => (StatusCode::CONFLICT, "already_running"),
        BlastError::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_state_transition"),
        _ => {
            error!(error = %e, "Campaign API internal error");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: code.to_string(),
            message: e.to_string(),
        }),
    )
}

#[derive(Deserialize, ToSchema)]
pub struct CreateCampaignRequest {
    pub account_id: Uuid,
    pub connection_id: Uuid,
    pub name: String,
    pub template: String,
    #[serde(default)]
    pub media: Option<MediaRef>,
    pub targets: Vec<CreateTargetRequest>,
    #[serde(default)]
    pub humanization: Option<HumanizationConfig>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateTargetRequest {
    pub phone: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

#[derive(Serialize, ToSchema)]
pub struct CampaignSummary {
    pub id: Uuid,
    pub name: String,
    pub status: CampaignStatus,
    pub counters: ProgressCounters,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&Campaign> for CampaignSummary {
    fn from(c: &Campaign) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            status: c.status,
            counters: c.counters,
            scheduled_at: c.scheduled_at,
            created_at: c.created_at,
        }
    }
}

/// POST /v1/campaigns — Create a campaign (draft, or scheduled when a
/// start time is given).
#[utoipa::path(
    post,
    path = "/v1/campaigns",
    tag = "Campaigns",
    request_body = CreateCampaignRequest,
    responses(
        (status = 201, description = "Campaign created", body = CampaignSummary),
        (status = 500, description = "Store failure", body = ErrorResponse),
    )
)]
pub async fn create_campaign(
    State(state): State<AppState>,
    Json(request): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<CampaignSummary>), ApiError> {
    let mut campaign = Campaign::new(request.account_id, request.connection_id, request.name);
    campaign.template = request.template;
    campaign.media = request.media;
    if let Some(humanization) = request.humanization {
        campaign.humanization = humanization;
    }
    for target in request.targets {
        let mut contact = ContactTarget::new(target.phone, target.name);
        contact.variables = target.variables;
        campaign.targets.push(contact);
    }
    if request.scheduled_at.is_some() {
        campaign.scheduled_at = request.scheduled_at;
        campaign.status = CampaignStatus::Scheduled;
    }
    campaign.counters = ProgressCounters::for_total(campaign.targets.len() as u64);

    let summary = CampaignSummary::from(&campaign);
    state
        .store
        .create_campaign(campaign)
        .await
        .map_err(map_error)?;
    metrics::counter!("api.campaigns_created").increment(1);
    Ok((StatusCode::CREATED, Json(summary)))
}

/// GET /v1/campaigns — List campaigns.
#[utoipa::path(
    get,
    path = "/v1/campaigns",
    tag = "Campaigns",
    responses(
        (status = 200, description = "All campaigns", body = Vec<CampaignSummary>),
    )
)]
pub async fn list_campaigns(
    State(state): State<AppState>,
) -> Result<Json<Vec<CampaignSummary>>, ApiError> {
    let campaigns = state.store.list_campaigns().await.map_err(map_error)?;
    Ok(Json(campaigns.iter().map(CampaignSummary::from).collect()))
}

/// POST /v1/campaigns/{id}/start — Start a draft or scheduled campaign now.
#[utoipa::path(
    post,
    path = "/v1/campaigns/{id}/start",
    tag = "Campaigns",
    params(("id" = Uuid, Path, description = "Campaign identifier")),
    responses(
        (status = 202, description = "Campaign started"),
        (status = 400, description = "Invalid configuration", body = ErrorResponse),
        (status = 404, description = "Campaign not found", body = ErrorResponse),
        (status = 409, description = "Already running or invalid state", body = ErrorResponse),
    )
)]
pub async fn start_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.queue.start(id).await.map_err(map_error)?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /v1/campaigns/{id}/pause — Pause after the in-flight send completes.
#[utoipa::path(
    post,
    path = "/v1/campaigns/{id}/pause",
    tag = "Campaigns",
    params(("id" = Uuid, Path, description = "Campaign identifier")),
    responses(
        (status = 202, description = "Pause requested"),
        (status = 404, description = "Campaign not found", body = ErrorResponse),
        (status = 409, description = "Invalid state", body = ErrorResponse),
    )
)]
pub async fn pause_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.queue.pause(id).await.map_err(map_error)?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /v1/campaigns/{id}/resume — Continue from the pending set.
#[utoipa::path(
    post,
    path = "/v1/campaigns/{id}/resume",
    tag = "Campaigns",
    params(("id" = Uuid, Path, description = "Campaign identifier")),
    responses(
        (status = 202, description = "Campaign resumed"),
        (status = 404, description = "Campaign not found", body = ErrorResponse),
        (status = 409, description = "Invalid state", body = ErrorResponse),
    )
)]
pub async fn resume_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.queue.resume(id).await.map_err(map_error)?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /v1/campaigns/{id}/cancel — Stop processing; unattempted targets
/// stay pending for audit.
#[utoipa::path(
    post,
    path = "/v1/campaigns/{id}/cancel",
    tag = "Campaigns",
    params(("id" = Uuid, Path, description = "Campaign identifier")),
    responses(
        (status = 202, description = "Campaign cancelled"),
        (status = 404, description = "Campaign not found", body = ErrorResponse),
        (status = 409, description = "Invalid state", body = ErrorResponse),
    )
)]
pub async fn cancel_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.queue.cancel(id).await.map_err(map_error)?;
    Ok(StatusCode::ACCEPTED)
}

/// GET /v1/campaigns/{id}/progress — Live progress counters.
#[utoipa::path(
    get,
    path = "/v1/campaigns/{id}/progress",
    tag = "Campaigns",
    params(("id" = Uuid, Path, description = "Campaign identifier")),
    responses(
        (status = 200, description = "Progress snapshot", body = ProgressSnapshot),
        (status = 404, description = "Campaign not found", body = ErrorResponse),
    )
)]
pub async fn campaign_progress(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProgressSnapshot>, ApiError> {
    let snapshot = state.queue.progress(id).await.map_err(map_error)?;
    Ok(Json(snapshot))
}

/// GET /v1/campaigns/{id}/report — Aggregated outcome report.
#[utoipa::path(
    get,
    path = "/v1/campaigns/{id}/report",
    tag = "Reports",
    params(("id" = Uuid, Path, description = "Campaign identifier")),
    responses(
        (status = 200, description = "Campaign report", body = CampaignReport),
        (status = 404, description = "Campaign not found", body = ErrorResponse),
    )
)]
pub async fn campaign_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CampaignReport>, ApiError> {
    let report = state.reports.generate(id).await.map_err(map_error)?;
    Ok(Json(report))
}

/// GET /v1/campaigns/{id}/report/export — Report rows as CSV bytes.
#[utoipa::path(
    get,
    path = "/v1/campaigns/{id}/report/export",
    tag = "Reports",
    params(("id" = Uuid, Path, description = "Campaign identifier")),
    responses(
        (status = 200, description = "CSV export", content_type = "text/csv"),
        (status = 404, description = "Campaign not found", body = ErrorResponse),
    )
)]
pub async fn export_campaign_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.reports.generate(id).await.map_err(map_error)?;
    let csv = export_csv(&report);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"campaign-{id}.csv\""),
            ),
        ],
        csv,
    ))
}

#[derive(Deserialize, ToSchema)]
pub struct CompareRequest {
    pub campaign_a: Uuid,
    pub campaign_b: Uuid,
}

/// POST /v1/campaigns/compare — Deltas between two campaigns' reports.
#[utoipa::path(
    post,
    path = "/v1/campaigns/compare",
    tag = "Reports",
    request_body = CompareRequest,
    responses(
        (status = 200, description = "Comparison deltas", body = ComparisonReport),
        (status = 404, description = "Campaign not found", body = ErrorResponse),
    )
)]
pub async fn compare_campaigns(
    State(state): State<AppState>,
    Json(request): Json<CompareRequest>,
) -> Result<Json<ComparisonReport>, ApiError> {
    let comparison = state
        .reports
        .compare(request.campaign_a, request.campaign_b)
        .await
        .map_err(map_error)?;
    Ok(Json(comparison))
}
