use marketplace_api::{config::AppConfig, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    let databases = db::connect(&config.database_url).await?;
    let applied = db::migrate(&databases.pool).await?;
    println!("{applied} new migration(s) applied");
    Ok(())
}
