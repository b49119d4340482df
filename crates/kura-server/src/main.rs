use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use kura_auth::{AccessKeyAuthorizer, Authorizer};
use kura_s3_api::{maintenance_router, s3_router};
use kura_storage::{FsStore, ObjectStore};
use kura_sweep::Sweeper;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "kura", about = "S3-compatible object storage gateway")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "kura.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        #[arg(long, default_value = "9000")]
        port: u16,
    },
    /// Delete expired files from temporary buckets and print a report
    Sweep,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Command::Serve { host, port } => serve(config, &host, port).await,
        Command::Sweep => sweep(config).await,
    }
}

async fn serve(config: Config, host: &str, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{host}:{port}");

    let app = if config.maintenance_mode {
        warn!("maintenance mode is on, serving the unavailable page only");
        maintenance_router()
    } else {
        let store: Arc<dyn ObjectStore> = Arc::new(FsStore::new(config.base_dir.clone()).await?);
        let auth: Arc<dyn Authorizer> = Arc::new(AccessKeyAuthorizer::new(config.access_key));
        s3_router(store, auth)
    };

    // The legacy surface answered every origin and preflight; CORS stays
    // wide open at the edge.
    let app = app
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("kura listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn sweep(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let sweeper = Sweeper::new(config.base_dir, config.temp_buckets);
    let report = sweeper.run().await?;

    println!("Sweep completed.");
    println!("Scanned: {}", report.scanned);
    println!("Deleted: {}", report.deleted);
    for file in &report.removed {
        let age_hours = file.age_secs as f64 / 3600.0;
        println!("Deleted: {} (age: {age_hours:.1}h)", file.path.display());
    }

    Ok(())
}
