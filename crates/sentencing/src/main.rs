use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sentencing::{build_router, AppState};
use sentencing_bucket::S3BucketStore;
use sentencing_core::config::bucket_config_from_env;
use sentencing_core::{ImportConfig, ImportHandler, TracingReporter};
use sentencing_repository::{ImportRepository, InMemoryRepository, PostgresRepository};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Sentencing bulk-data import service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the import HTTP server
    Serve,
    /// Run database migrations
    Migrate,
    /// Import one object directly, bypassing auth and the task queue
    Import(ImportArgs),
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// Bucket holding the export
    #[arg(long)]
    bucket: String,
    /// Object key, e.g. US_ID/sentencing_case_record.json
    #[arg(long)]
    object: String,
    /// Load into memory and print the summary without touching Postgres
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Migrate => {
            let repository = connect_repository(1).await?;
            repository.run_migrations().await?;
            info!("Database migrations applied");
            Ok(())
        }
        Command::Import(args) => import(args).await,
    }
}

async fn serve() -> Result<()> {
    let config = ImportConfig::from_env()?;
    let state = AppState::from_config(&config).await?;
    let router = build_router(Arc::new(state));

    let listener = TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address))?;
    info!(address = %listener.local_addr()?, "listening");
    axum::serve(listener, router).await?;
    Ok(())
}

async fn import(args: ImportArgs) -> Result<()> {
    let bucket = S3BucketStore::new(bucket_config_from_env())
        .await
        .context("failed to configure bucket client")?;

    let repository: Arc<dyn ImportRepository> = if args.dry_run {
        Arc::new(InMemoryRepository::new())
    } else {
        let repository = connect_repository(2).await?;
        repository.run_migrations().await?;
        Arc::new(repository)
    };

    // The CLI trusts whichever bucket it is pointed at.
    let handler = ImportHandler::new(
        Arc::new(bucket),
        repository,
        Arc::new(TracingReporter),
        args.bucket.clone(),
    );
    let outcome = handler.handle(&args.bucket, &args.object).await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn connect_repository(max_connections: u32) -> Result<PostgresRepository> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    PostgresRepository::connect(&database_url, max_connections)
        .await
        .context("failed to connect to Postgres")
}
