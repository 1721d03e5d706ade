use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use marketplace_api::{
    config::AppConfig, connectivity::spawn_probe, db, media::MediaClient,
    services::payment_service::spawn_session_sweeper, startup::build_router, state::AppState,
};

const PROBE_INTERVAL: Duration = Duration::from_secs(15);
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,marketplace_api=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;

    let db::Databases { pool, orm } = db::connect(&config.database_url).await?;
    let applied = db::migrate(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    let media = MediaClient::new(&config.media)?;
    let connectivity = spawn_probe(pool.clone(), PROBE_INTERVAL);
    let state = AppState::new(pool, orm, config, media, connectivity);
    let _sweeper = spawn_session_sweeper(state.clone(), SWEEP_INTERVAL);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "marketplace api listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
