// PDF rendering: compile a LaTeX document and publish the result as a
// short-lived artifact.

pub mod compiler;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
pub use compiler::{check_toolchain, CompileError, DocumentCompiler, PdflatexCompiler};
pub use store::{schedule_expiry, ArtifactStore, S3ArtifactStore, StoreError};

#[derive(Debug, Clone, Serialize)]
pub struct RenderedArtifact {
    pub artifact_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Compiles `latex`, stores the PDF and schedules its deletion after `ttl`.
pub async fn render_and_store(
    compiler: &dyn DocumentCompiler,
    store: Arc<dyn ArtifactStore>,
    latex: &str,
    ttl: Duration,
) -> Result<RenderedArtifact, AppError> {
    if latex.trim().is_empty() {
        return Err(AppError::Validation("No LaTeX content provided".to_string()));
    }

    let pdf = compiler.compile(latex).await?;

    let artifact_id = Uuid::new_v4();
    store.put(artifact_id, pdf).await?;
    schedule_expiry(store, artifact_id, ttl);

    let expires_at = Utc::now()
        + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());
    info!("Rendered artifact {artifact_id}, expires at {expires_at}");

    Ok(RenderedArtifact {
        artifact_id,
        expires_at,
    })
}
