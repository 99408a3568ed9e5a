use brokerbook::{
    api::{self, AppState},
    config::{self, database},
    core::settlement,
    errors::Result,
};
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = config::ledger::load_app_configuration()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Connect, create tables, and upgrade legacy single-link rows
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;
    settlement::migrate_legacy_links(&db)
        .await
        .inspect_err(|e| error!("Failed to migrate legacy settlement links: {}", e))?;

    // 5. Serve the REST API
    let router = api::create_router(AppState::new(db, app_config.ledger));
    let listener = tokio::net::TcpListener::bind(&app_config.server.bind_address)
        .await
        .inspect_err(|e| error!("Failed to bind {}: {}", app_config.server.bind_address, e))?;
    info!("Listening on {}", app_config.server.bind_address);

    axum::serve(listener, router).await?;

    Ok(())
}
