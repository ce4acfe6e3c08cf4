use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use interview_proctor::{create_router, AppState, Config, InterviewServices};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "interview-proctor", version, about = "Proctored interview session service")]
struct Cli {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/interview-proctor")]
    config: String,

    /// Override the bind address from the config file
    #[arg(long)]
    bind: Option<String>,

    /// Override the port from the config file
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut cfg = Config::load(&cli.config)?;
    if let Some(bind) = cli.bind {
        cfg.service.http.bind = bind;
    }
    if let Some(port) = cli.port {
        cfg.service.http.port = port;
    }

    info!("Interview Proctor v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);
    info!("Scoring backend: {}", cfg.backend.base_url);
    info!("Sandbox: {}", cfg.sandbox.submissions_url);
    info!("Sessions stored in {}", cfg.storage.sessions_path);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let grace = cfg.finished_session_grace();
    let services = InterviewServices::from_config(cfg)?;
    let state = AppState::new(services);
    let app = create_router(state.clone());
    let reaper = state.spawn_reaper(grace, Duration::from_secs(60));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await
        .context("HTTP server failed")?;

    reaper.abort();
    state.shutdown_all().await;
    info!("All sessions released");

    Ok(())
}
