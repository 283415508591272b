//! Blastline — bulk campaign dispatch engine for WhatsApp messaging.
//!
//! Main entry point that initializes all subsystems and starts the server.

use blastline_api::ApiServer;
use blastline_core::config::AppConfig;
use blastline_core::types::{Campaign, CampaignStatus, ContactTarget, HumanizationConfig};
use blastline_dispatch::{CampaignScheduler, QueueManager};
use blastline_gateway::HttpGateway;
use blastline_reporting::ReportGenerator;
use blastline_store::{CampaignStore, MemoryStore};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "blastline-server")]
#[command(about = "Bulk campaign dispatch engine for WhatsApp messaging")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "BLASTLINE__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "BLASTLINE__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Gateway base URL (overrides config)
    #[arg(long, env = "BLASTLINE__GATEWAY__BASE_URL")]
    gateway_url: Option<String>,

    /// Scheduler poll interval in seconds (overrides config)
    #[arg(long, env = "BLASTLINE__SCHEDULER__POLL_INTERVAL_SECS")]
    poll_interval: Option<u64>,

    /// Seed a demo campaign on startup for local exploration
    #[arg(long, default_value_t = false)]
    seed_demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blastline=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Blastline starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(url) = cli.gateway_url {
        config.gateway.base_url = url;
    }
    if let Some(secs) = cli.poll_interval {
        config.scheduler.poll_interval_secs = secs;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        gateway_url = %config.gateway.base_url,
        poll_interval_secs = config.scheduler.poll_interval_secs,
        "Configuration loaded"
    );

    let store: Arc<dyn CampaignStore> = Arc::new(MemoryStore::new());
    let gateway = Arc::new(HttpGateway::new(
        config.gateway.base_url.clone(),
        config.gateway.access_token.clone(),
        config.node_id.clone(),
    ));

    let queue = QueueManager::new(
        store.clone(),
        gateway.clone(),
        config.dispatch.clone(),
        Duration::from_millis(config.gateway.send_timeout_ms),
    );
    let reports = ReportGenerator::new(store.clone());

    if cli.seed_demo {
        seed_demo_campaign(store.as_ref()).await?;
    }

    // Spawn the scheduler poll loop
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = CampaignScheduler::new(
        store.clone(),
        gateway.clone(),
        queue.clone(),
        Duration::from_secs(config.scheduler.poll_interval_secs),
    );
    tokio::spawn(async move {
        scheduler.run(shutdown_rx).await;
    });

    // Stop polling when the process is asked to terminate
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
            std::process::exit(0);
        }
    });

    // Start API server
    let api_server = ApiServer::new(config.clone(), store, queue, reports);

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Blastline is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}

/// Seed one scheduled demo campaign so a fresh node has something to poll.
async fn seed_demo_campaign(store: &dyn CampaignStore) -> anyhow::Result<()> {
    let mut campaign = Campaign::new(Uuid::new_v4(), Uuid::new_v4(), "Demo launch blast");
    campaign.template = "Hi {{name}}, our new store opens this Friday!".to_string();
    campaign.humanization = HumanizationConfig {
        delay_min_ms: 3_000,
        delay_max_ms: 10_000,
        randomize_order: true,
    };
    campaign.targets = vec![
        ContactTarget::new("+5511990000001", "Ana").with_variable("name", "Ana"),
        ContactTarget::new("+5511990000002", "Bruno").with_variable("name", "Bruno"),
        ContactTarget::new("+5511990000003", "Carla").with_variable("name", "Carla"),
    ];
    campaign.scheduled_at = Some(chrono::Utc::now() + chrono::Duration::minutes(1));
    campaign.status = CampaignStatus::Scheduled;

    let id = store.create_campaign(campaign).await?;
    info!(campaign_id = %id, "Demo campaign seeded, starts in one minute");
    Ok(())
}
