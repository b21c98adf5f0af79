use std::sync::Arc;

use crate::config::Config;
use crate::render::{ArtifactStore, DocumentCompiler};
use crate::tailoring::{PipelineOptions, SectionRewriter};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Pluggable section rewriter. Default: `LlmSectionRewriter`.
    pub rewriter: Arc<dyn SectionRewriter>,
    pub compiler: Arc<dyn DocumentCompiler>,
    /// Short-lived storage for compiled PDFs.
    pub artifacts: Arc<dyn ArtifactStore>,
    /// Client used to fetch job postings by URL.
    pub http: reqwest::Client,
    pub pipeline: PipelineOptions,
}
