use std::time::Duration;

use axum::{
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::render::{render_and_store, RenderedArtifact};
use crate::resume::RawDocument;
use crate::state::AppState;
use crate::tailoring::jd_fetch::fetch_job_description;
use crate::tailoring::{run_parse, tailor_resume, ParseOutcome, TailorOutcome};

/// Fields accepted by the resume endpoints.
#[derive(Debug, Default)]
pub struct ResumeForm {
    pub file_name: Option<String>,
    pub resume: Option<Vec<u8>>,
    pub job_description: Option<String>,
    pub job_url: Option<String>,
}

impl ResumeForm {
    /// The uploaded resume, typed by name and magic bytes.
    fn document(&mut self) -> Result<RawDocument, AppError> {
        let bytes = self
            .resume
            .take()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| AppError::Validation("No resume file uploaded".to_string()))?;
        Ok(RawDocument::from_upload(self.file_name.as_deref(), bytes)?)
    }
}

/// Reads the multipart body into a [`ResumeForm`]. Unknown fields are drained and ignored.
pub async fn read_resume_form(
    mut multipart: Multipart,
    max_bytes: usize,
) -> Result<ResumeForm, AppError> {
    let mut form = ResumeForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read form field: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "resume" => {
                form.file_name = field.file_name().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read file data: {e}")))?;
                if data.len() > max_bytes {
                    return Err(AppError::Validation(format!(
                        "Resume file exceeds the {max_bytes} byte limit"
                    )));
                }
                form.resume = Some(data.to_vec());
            }
            "job_description" | "job_url" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read {name}: {e}")))?;
                let value = value.trim().to_string();
                if value.is_empty() {
                    continue;
                }
                if name == "job_url" {
                    form.job_url = Some(value);
                } else {
                    form.job_description = Some(value);
                }
            }
            _ => {
                field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read field '{name}': {e}")))?;
            }
        }
    }

    Ok(form)
}

/// POST /api/v1/resumes/parse
pub async fn handle_parse(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ParseOutcome>, AppError> {
    let mut form = read_resume_form(multipart, state.config.max_upload_bytes).await?;
    let raw = form.document()?;
    info!("Parsing {} resume", raw.kind());

    let outcome = run_parse(raw, state.pipeline.clone()).await?;
    Ok(Json(outcome))
}

/// POST /api/v1/resumes/tailor
///
/// A pasted `job_description` takes precedence over `job_url`.
pub async fn handle_tailor(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<TailorOutcome>, AppError> {
    let mut form = read_resume_form(multipart, state.config.max_upload_bytes).await?;

    let job_description = match (form.job_description.take(), form.job_url.take()) {
        (Some(text), _) => text,
        (None, Some(url)) => fetch_job_description(&state.http, &url).await?,
        (None, None) => {
            return Err(AppError::Validation(
                "A job description or job posting URL is required".to_string(),
            ))
        }
    };

    let raw = form.document()?;
    info!("Tailoring {} resume", raw.kind());

    let outcome = tailor_resume(
        raw,
        &job_description,
        state.rewriter.as_ref(),
        &state.pipeline,
    )
    .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    #[serde(default)]
    pub latex: String,
}

#[derive(Debug, Serialize)]
pub struct RenderResponse {
    #[serde(flatten)]
    pub artifact: RenderedArtifact,
    pub download_url: String,
}

/// POST /api/v1/render
pub async fn handle_render(
    State(state): State<AppState>,
    Json(req): Json<RenderRequest>,
) -> Result<Json<RenderResponse>, AppError> {
    let artifact = render_and_store(
        state.compiler.as_ref(),
        state.artifacts.clone(),
        &req.latex,
        Duration::from_secs(state.config.artifact_ttl_secs),
    )
    .await?;

    let download_url = format!("/api/v1/render/{}", artifact.artifact_id);
    Ok(Json(RenderResponse {
        artifact,
        download_url,
    }))
}

/// GET /api/v1/render/:id
pub async fn handle_download(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let pdf = state
        .artifacts
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Rendered PDF {id} not found or expired")))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"resume-{id}.pdf\""),
            ),
        ],
        pdf,
    )
        .into_response())
}
