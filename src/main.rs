use moka::future::Cache;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parkline_leads::api::handlers::{self, AppState};
use parkline_leads::config::Config;
use parkline_leads::core::pipeline::LeadPipeline;
use parkline_leads::db::Database;
use parkline_leads::integrations::bitrix_client::BitrixClient;
use parkline_leads::integrations::lead_store::PgLeadStore;
use parkline_leads::settings::{SettingsStore, BITRIX_WEBHOOK_KEY};

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration and persisted settings.
/// - Database connection (when configured).
/// - The Bitrix client and the lead pipeline.
/// - HTTP routes and middleware (CORS, Rate Limiting).
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parkline_leads=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let settings = Arc::new(SettingsStore::load(&config.settings_path)?);

    // Initialize lead store; without a database every submission is rejected
    let store = match config.database_url {
        Some(ref url) => {
            let db = Database::new(url, config.store_timeout).await?;
            tracing::info!("Database connection pool established");
            PgLeadStore::new(db.pool)
        }
        None => PgLeadStore::unconfigured(),
    };
    let store = Arc::new(store);

    // A webhook saved from the admin panel wins over the environment
    let webhook_url = match settings.get(BITRIX_WEBHOOK_KEY).await {
        Some(saved) => {
            tracing::info!("Using Bitrix webhook saved in {}", settings.path().display());
            Some(saved)
        }
        None => config.bitrix_webhook_url.clone(),
    };

    let bitrix = match BitrixClient::new(webhook_url) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Ignoring invalid Bitrix webhook URL: {}", e);
            BitrixClient::new(None)?
        }
    };
    let bitrix = Arc::new(bitrix);

    let pipeline = Arc::new(
        LeadPipeline::new(bitrix.clone(), store.clone(), store.clone())
            .with_store_timeout(config.store_timeout),
    );

    // One controller per open form; abandoned forms expire after 30 minutes
    let forms = Cache::builder()
        .time_to_live(Duration::from_secs(1800))
        .max_capacity(10_000)
        .build();
    tracing::info!("Form cache initialized (30m TTL, 10k capacity)");

    // Build application state
    let app_state = Arc::new(AppState {
        config: config.clone(),
        pipeline,
        bitrix,
        store,
        settings,
        forms,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let app = handlers::router(app_state)
        .layer(
            ServiceBuilder::new()
                // Request size limit: 64KB is plenty for a contact form
                .layer(RequestBodyLimitLayer::new(64 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
