//! laundry-rs: Campus laundry quota tracking service
//!
//! Students submit laundry requests against a monthly garment quota;
//! admins move requests through their lifecycle. A transactional
//! ledger keeps every quota balanced against the requests on file.

use laundry_rs::api::auth::JwtConfig;
use laundry_rs::api::ApiServer;
use laundry_rs::config::Config;
use laundry_rs::db;
use laundry_rs::ledger::{LedgerManager, QuotaLimits};
use laundry_rs::security::Authenticator;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = if let Some(config_path) = std::env::args().nth(1) {
        Config::from_file(&config_path)?
    } else {
        Config::default()
    };
    config.validate()?;

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.as_str().into());
    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting laundry-rs v{}", env!("CARGO_PKG_VERSION"));

    if config.auth.jwt_secret == "change-me-in-production" {
        warn!("Using the default JWT secret; set auth.jwt_secret before going live");
    }

    // Connect to the database and make sure the schema exists
    let pool = db::connect(&config.database).await?;
    db::init_db(&pool).await?;

    let authenticator = Authenticator::new(pool.clone());
    let ledger = LedgerManager::with_limits(
        pool,
        QuotaLimits {
            min_clothes: config.quota.min_clothes_per_request,
            max_clothes: config.quota.max_clothes_per_request,
            ..QuotaLimits::default()
        },
    );
    let jwt_config = JwtConfig::new(
        config.auth.jwt_secret.clone(),
        config.auth.token_expiry_hours,
    );

    // Run the API server
    let server = ApiServer::new(
        ledger,
        authenticator,
        jwt_config,
        config.server.listen_addr.clone(),
    );
    server.run().await?;

    Ok(())
}
