//! OpenAPI specification and Swagger UI configuration.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Blastline API",
        version = "0.1.0",
        description = "Bulk campaign dispatch engine for WhatsApp messaging.\n\nSupports humanized pacing, scheduled starts, pause/resume/cancel control, and outcome reporting.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Campaigns", description = "Campaign creation and lifecycle control"),
        (name = "Reports", description = "Outcome aggregation, CSV export, and comparison"),
        (name = "Operations", description = "Health, readiness, and liveness probes"),
    ),
    paths(
        // Campaigns
        crate::campaign_rest::create_campaign,
        crate::campaign_rest::list_campaigns,
        crate::campaign_rest::start_campaign,
        crate::campaign_rest::pause_campaign,
        crate::campaign_rest::resume_campaign,
        crate::campaign_rest::cancel_campaign,
        crate::campaign_rest::campaign_progress,
        // Reports
        crate::campaign_rest::campaign_report,
        crate::campaign_rest::export_campaign_report,
        crate::campaign_rest::compare_campaigns,
        // Operations
        crate::rest::health_check,
        crate::rest::readiness,
        crate::rest::liveness,
    ),
    components(schemas(
        // Core campaign types
        blastline_core::types::CampaignStatus,
        blastline_core::types::TargetStatus,
        blastline_core::types::FailureReason,
        blastline_core::types::MediaRef,
        blastline_core::types::MediaType,
        blastline_core::types::HumanizationConfig,
        blastline_core::types::ProgressCounters,
        blastline_core::types::ProgressSnapshot,
        // Request/response types
        crate::campaign_rest::CreateCampaignRequest,
        crate::campaign_rest::CreateTargetRequest,
        crate::campaign_rest::CampaignSummary,
        crate::campaign_rest::CompareRequest,
        // Reporting types
        blastline_reporting::CampaignReport,
        blastline_reporting::ReportRow,
        blastline_reporting::ComparisonReport,
        // REST error/health types
        crate::rest::ErrorResponse,
        crate::rest::HealthResponse,
    ))
)]
pub struct ApiDoc;
