//! API server — HTTP REST surface plus the Prometheus exporter.

use crate::campaign_rest;
use crate::rest::{self, AppState};
use crate::swagger::ApiDoc;
use axum::routing::{get, post};
use axum::Router;
use blastline_core::config::AppConfig;
use blastline_dispatch::QueueManager;
use blastline_reporting::ReportGenerator;
use blastline_store::CampaignStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Main API server for campaign control, progress, and reporting.
pub struct ApiServer {
    config: AppConfig,
    store: Arc<dyn CampaignStore>,
    queue: QueueManager,
    reports: ReportGenerator,
}

impl ApiServer {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn CampaignStore>,
        queue: QueueManager,
        reports: ReportGenerator,
    ) -> Self {
        Self {
            config,
            store,
            queue,
            reports,
        }
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let state = AppState {
            store: self.store.clone(),
            queue: self.queue.clone(),
            reports: self.reports.clone(),
            node_id: self.config.node_id.clone(),
            start_time: Instant::now(),
        };

        let app = Router::new()
            // Campaign lifecycle
            .route(
                "/v1/campaigns",
                post(campaign_rest::create_campaign).get(campaign_rest::list_campaigns),
            )
            .route("/v1/campaigns/:id/start", post(campaign_rest::start_campaign))
            .route("/v1/campaigns/:id/pause", post(campaign_rest::pause_campaign))
            .route(
                "/v1/campaigns/:id/resume",
                post(campaign_rest::resume_campaign),
            )
            .route(
                "/v1/campaigns/:id/cancel",
                post(campaign_rest::cancel_campaign),
            )
            .route(
                "/v1/campaigns/:id/progress",
                get(campaign_rest::campaign_progress),
            )
            // Reporting
            .route(
                "/v1/campaigns/:id/report",
                get(campaign_rest::campaign_report),
            )
            .route(
                "/v1/campaigns/:id/report/export",
                get(campaign_rest::export_campaign_report),
            )
            .route("/v1/campaigns/compare", post(campaign_rest::compare_campaigns))
            // Operational endpoints
            .route("/health", get(rest::health_check))
            .route("/ready", get(rest::readiness))
            .route("/live", get(rest::liveness))
            .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
            // Middleware
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the metrics server on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        let handle = builder
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install_recorder()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");

        // Keep the handle alive
        std::mem::forget(handle);
        Ok(())
    }
}
