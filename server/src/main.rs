//! propsync server: reads settings from the environment (or `.env`), opens the
//! PostgreSQL pool and serves the record, change-feed and sync routes.
//!
//! Run from repo root: `cargo run -p propsync-server`

use propsync::{app, resolve, AirtableClient, AppState, HostedTable, Settings};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("propsync=info,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    tracing::info!(?settings, "loaded settings");

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&settings.database_url)
        .await?;

    let model = resolve()?;
    let hosted: Option<Arc<dyn HostedTable>> = match &settings.airtable {
        Some(airtable) => Some(Arc::new(AirtableClient::new(airtable.clone())?)),
        None => {
            tracing::warn!("AIRTABLE_API_KEY / AIRTABLE_BASE_ID not set; sync endpoints disabled");
            None
        }
    };

    let bind_addr = settings.bind_addr.clone();
    let state = AppState {
        pool,
        model: Arc::new(model),
        hosted,
        settings: Arc::new(settings),
    };

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("propsync listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app(state)).await?;
    Ok(())
}
