use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kernel_mirror::command::ShellRunner;
use kernel_mirror::load_config::load_config;
use kernel_mirror::server::{create_router, AppState};
use kernel_mirror::{credentials, mirror};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// CLI for kernel-mirror: copy notebook kernels between platform accounts.
#[derive(Parser)]
#[clap(
    name = "kernel-mirror",
    version,
    about = "Mirror notebook kernels from a source account to a destination account via the platform CLI"
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server exposing the trigger endpoint
    Serve {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Port to listen on
        #[clap(long, env = "PORT", default_value = "10000")]
        port: u16,
    },
    /// Run one batch from the command line and print the report
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, port } => {
            let config = load_config(config)?;
            let runner = Arc::new(ShellRunner::new(config.command_timeout));

            // Seed the credential file so the CLI is usable before the
            // first trigger switches identities.
            credentials::apply_best_effort(&config.source_account, &config.credentials_path);

            let state = AppState::new(config, runner);
            let app = create_router(state);

            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind {addr}"))?;
            info!(%addr, "Starting server");
            axum::serve(listener, app)
                .await
                .context("Server terminated unexpectedly")?;
            Ok(())
        }
        Commands::Sync { config } => {
            let config = load_config(config)?;
            let runner = ShellRunner::new(config.command_timeout);
            println!("Mirror batch starting...");
            let report = mirror::mirror_all(&config, &runner).await;
            println!("Mirror batch complete.\nReport:");
            println!("{:#?}", report);
            Ok(())
        }
    }
}
