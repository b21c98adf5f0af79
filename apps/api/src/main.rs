mod config;
mod errors;
mod llm_client;
mod render;
mod resume;
mod routes;
mod state;
mod tailoring;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::render::{check_toolchain, PdflatexCompiler, S3ArtifactStore};
use crate::routes::build_router;
use crate::state::AppState;
use crate::tailoring::{LlmSectionRewriter, PipelineOptions};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tailor API v{}", env!("CARGO_PKG_VERSION"));

    let state = build_state(&config).await?;

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Wires the production collaborators: S3 artifact store, Claude rewriter, pdflatex.
async fn build_state(config: &Config) -> Result<AppState> {
    let artifacts = Arc::new(S3ArtifactStore::connect(config).await);
    info!("S3 artifact store initialized (bucket: {})", config.s3_bucket);

    let llm = LlmClient::new(config.anthropic_api_key.clone())
        .context("Failed to build LLM client")?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // A missing TeX installation only disables rendering
    let compiler = Arc::new(PdflatexCompiler::new(
        config.pdflatex_bin.clone(),
        Duration::from_secs(config.compile_timeout_secs),
    ));
    check_toolchain(compiler.as_ref()).await;

    let pipeline = PipelineOptions::from_config(config);
    info!(
        "Tailoring sections: {:?}, preserved: {:?}",
        pipeline.tailor_sections.iter().map(|s| s.label()).collect::<Vec<_>>(),
        pipeline.preserved_sections.iter().map(|s| s.label()).collect::<Vec<_>>()
    );

    Ok(AppState {
        config: config.clone(),
        rewriter: Arc::new(LlmSectionRewriter::new(llm, config.jd_max_chars)),
        compiler,
        artifacts,
        http: reqwest::Client::new(),
        pipeline,
    })
}
