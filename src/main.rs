use booking_engine::config::Settings;
use booking_engine::observability::{init_logging, LogConfig, LogFormat};
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;

    init_logging(&LogConfig {
        level: settings.application.log_level.clone(),
        format: LogFormat::from(settings.application.log_format.as_str()),
        ..LogConfig::default()
    });
    info!("Configuration loaded");

    // Connect to PostgreSQL
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(settings.database.pool_size)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&settings.database.url)
        .await?;

    info!("Database connection established");

    // Run migrations
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations applied successfully");

    info!("Booking core startup verification complete.");

    Ok(())
}
