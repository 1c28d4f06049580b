use anyhow::{Context, Result};
use sentencing_repository::PostgresRepository;
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let repo = PostgresRepository::connect(&database_url, 5).await?;
    repo.run_migrations().await?;
    Ok(())
}
