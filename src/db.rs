use std::time::Duration;

use anyhow::Context;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sqlx::{migrate::Migrator, postgres::PgPoolOptions};

pub type DbPool = sqlx::PgPool;
pub type OrmConn = DatabaseConnection;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Raw sqlx pool for hand-written queries plus the SeaORM handle used by the
/// entity-based services. Both talk to the same database.
#[derive(Clone)]
pub struct Databases {
    pub pool: DbPool,
    pub orm: OrmConn,
}

pub async fn connect(database_url: &str) -> anyhow::Result<Databases> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .context("connecting to postgres")?;

    let mut options = ConnectOptions::new(database_url);
    options
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .sqlx_logging(false);
    let orm = Database::connect(options)
        .await
        .context("opening the orm connection")?;

    Ok(Databases { pool, orm })
}

/// Applies pending files from `migrations/`. Returns how many were new.
pub async fn migrate(pool: &DbPool) -> anyhow::Result<usize> {
    let before = applied_count(pool).await;
    MIGRATOR.run(pool).await.context("running migrations")?;
    let after = applied_count(pool).await;
    Ok(after.saturating_sub(before))
}

async fn applied_count(pool: &DbPool) -> usize {
    // the bookkeeping table does not exist before the first run
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success")
        .fetch_one(pool)
        .await
        .map(|n| usize::try_from(n).unwrap_or(0))
        .unwrap_or(0)
}

pub async fn ping(pool: &DbPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}
