//! Extract → Segment → Reconstruct → (Rewrite) → Substitute.
//!
//! `parse_resume` is synchronous and CPU-bound; async callers go through
//! [`run_parse`], which moves it onto the blocking pool. Rewrites run one
//! section at a time in the configured order so substitution is deterministic.

use anyhow::Context;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::AppError;
use crate::resume::reconstruct::ContactBlock;
use crate::resume::{
    extract, reconstruct, segment, substitute_all, RawDocument, ReconstructOptions, ResumeError,
    SectionMap, SectionName, Vocabulary,
};
use crate::tailoring::rewriter::{format_preserved, SectionRewriter};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub reconstruct: ReconstructOptions,
    /// Sections sent to the rewriter, in substitution order.
    pub tailor_sections: Vec<SectionName>,
    /// Sections formatted locally and never sent to the rewriter.
    pub preserved_sections: Vec<SectionName>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            reconstruct: ReconstructOptions::default(),
            tailor_sections: vec![
                SectionName::Summary,
                SectionName::Skills,
                SectionName::Experience,
                SectionName::Projects,
            ],
            preserved_sections: vec![SectionName::KeySkills],
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            reconstruct: ReconstructOptions {
                list_max_avg_line_chars: config.list_max_avg_line_chars,
            },
            tailor_sections: config.tailor_sections.clone(),
            preserved_sections: config.preserved_sections.clone(),
        }
    }

    /// Every section the tailoring pass touches: tailored ones first, then
    /// preserved ones not already listed.
    fn targets(&self) -> Vec<SectionName> {
        let mut targets = self.tailor_sections.clone();
        for name in &self.preserved_sections {
            if !targets.contains(name) {
                targets.push(name.clone());
            }
        }
        targets
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ParseOutcome {
    pub sections: SectionMap,
    pub latex: String,
    pub contact: ContactBlock,
    pub low_confidence: bool,
    pub advisory: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSection {
    pub section: SectionName,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TailorOutcome {
    pub latex: String,
    pub sections: SectionMap,
    pub tailored_sections: Vec<SectionName>,
    pub skipped_sections: Vec<SkippedSection>,
    pub low_confidence: bool,
    pub advisory: Option<String>,
}

pub fn parse_resume(
    raw: &RawDocument,
    options: &PipelineOptions,
) -> Result<ParseOutcome, ResumeError> {
    let text = extract(raw)?;
    let sections = segment(text.as_str(), Vocabulary::standard())?;
    info!(
        "Found {} sections in {} upload",
        sections.len(),
        raw.kind()
    );

    let reconstruction = reconstruct(&sections, &options.reconstruct)?;
    let advisory = build_advisory(reconstruction.low_confidence, &[]);

    Ok(ParseOutcome {
        sections,
        latex: reconstruction.document,
        contact: reconstruction.contact,
        low_confidence: reconstruction.low_confidence,
        advisory,
    })
}

/// Runs [`parse_resume`] on the blocking pool.
pub async fn run_parse(
    raw: RawDocument,
    options: PipelineOptions,
) -> Result<ParseOutcome, AppError> {
    Ok(tokio::task::spawn_blocking(move || parse_resume(&raw, &options))
        .await
        .context("Resume parsing task failed")??)
}

/// Parses `raw` and rewrites its configured sections for `job_description`.
///
/// A section whose rewrite fails keeps its original content and is reported
/// as skipped; only an unreadable resume fails the whole request.
pub async fn tailor_resume(
    raw: RawDocument,
    job_description: &str,
    rewriter: &dyn SectionRewriter,
    options: &PipelineOptions,
) -> Result<TailorOutcome, AppError> {
    if job_description.trim().is_empty() {
        return Err(AppError::Validation(
            "A job description or job posting URL is required".to_string(),
        ));
    }

    let parsed = run_parse(raw, options.clone()).await?;
    Ok(tailor_parsed(parsed, job_description, rewriter, options).await)
}

async fn tailor_parsed(
    parsed: ParseOutcome,
    job_description: &str,
    rewriter: &dyn SectionRewriter,
    options: &PipelineOptions,
) -> TailorOutcome {
    let mut replacements: Vec<(SectionName, String)> = Vec::new();
    let mut skipped: Vec<SkippedSection> = Vec::new();

    for name in options.targets() {
        let Some(content) = parsed.sections.get(&name) else {
            continue;
        };

        if options.preserved_sections.contains(&name) {
            replacements.push((name.clone(), format_preserved(&name, content)));
            continue;
        }

        match rewriter.rewrite(&name, content, job_description).await {
            Ok(rewritten) => replacements.push((name, rewritten)),
            Err(e) => {
                warn!("Skipping section {name}: {e}");
                skipped.push(SkippedSection {
                    section: name,
                    reason: e.to_string(),
                });
            }
        }
    }

    let (latex, applied) = substitute_all(&parsed.latex, &replacements);
    for (name, _) in &replacements {
        if !applied.contains(name) {
            skipped.push(SkippedSection {
                section: name.clone(),
                reason: "Section heading not found in the generated document".to_string(),
            });
        }
    }

    info!(
        "Tailoring complete: {} updated, {} skipped",
        applied.len(),
        skipped.len()
    );

    let advisory = build_advisory(parsed.low_confidence, &skipped);
    TailorOutcome {
        latex,
        sections: parsed.sections,
        tailored_sections: applied,
        skipped_sections: skipped,
        low_confidence: parsed.low_confidence,
        advisory,
    }
}

/// Human-readable note for the caller, or `None` when there is nothing to report.
pub fn build_advisory(low_confidence: bool, skipped: &[SkippedSection]) -> Option<String> {
    let mut notes = Vec::new();
    if low_confidence {
        notes.push(
            "No section headings were recognised, so the resume was converted as a single \
             block of text. Review the layout before using it."
                .to_string(),
        );
    }
    if !skipped.is_empty() {
        let names = skipped
            .iter()
            .map(|s| s.section.label())
            .collect::<Vec<_>>()
            .join(", ");
        notes.push(format!("These sections were left unchanged: {names}."));
    }

    if notes.is_empty() {
        None
    } else {
        Some(notes.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resume::extract::docx_fixture;
    use crate::tailoring::rewriter::RewriteError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const RESUME: &[&str] = &[
        "Jane Doe",
        "jane@example.com",
        "SUMMARY",
        "Backend engineer with five years of experience.",
        "EXPERIENCE",
        "Acme Corp - Engineer",
        "2019 - 2024",
        "Built APIs",
        "SKILLS",
        "Rust",
        "Go",
    ];

    /// Prefixes content with the section label and records every call.
    #[derive(Default)]
    struct EchoRewriter {
        calls: Mutex<Vec<SectionName>>,
        fail_on: Option<SectionName>,
    }

    #[async_trait]
    impl SectionRewriter for EchoRewriter {
        async fn rewrite(
            &self,
            section: &SectionName,
            _content: &str,
            _job_description: &str,
        ) -> Result<String, RewriteError> {
            self.calls.lock().unwrap().push(section.clone());
            if self.fail_on.as_ref() == Some(section) {
                return Err(RewriteError::SafetyBlocked);
            }
            Ok(format!("Tailored {}", section.label()))
        }
    }

    fn docx(paragraphs: &[&str]) -> RawDocument {
        RawDocument::Docx(docx_fixture(paragraphs))
    }

    #[test]
    fn test_parse_resume_builds_document() {
        let outcome = parse_resume(&docx(RESUME), &PipelineOptions::default()).unwrap();

        let names: Vec<&SectionName> = outcome.sections.names().collect();
        assert_eq!(
            names,
            vec![
                &SectionName::Header,
                &SectionName::Summary,
                &SectionName::Experience,
                &SectionName::Skills,
            ]
        );
        assert!(outcome.latex.contains("\\section{Summary}"));
        assert!(outcome.latex.contains("\\section{Experience}"));
        assert!(outcome.latex.contains("\\section{Skills}"));
        assert_eq!(outcome.contact.name, "Jane Doe");
        assert!(!outcome.low_confidence);
        assert!(outcome.advisory.is_none());
    }

    #[test]
    fn test_parse_resume_without_headings_is_low_confidence() {
        let raw = docx(&["Some free-form text about my career", "and a bit more"]);
        let outcome = parse_resume(&raw, &PipelineOptions::default()).unwrap();
        assert!(outcome.low_confidence);
        assert!(outcome.sections.contains(&SectionName::FullText));
        assert!(outcome.advisory.unwrap().contains("No section headings"));
    }

    #[tokio::test]
    async fn test_run_parse_surfaces_core_errors() {
        let err = run_parse(
            RawDocument::Docx(b"PK\x03\x04 not a zip".to_vec()),
            PipelineOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Resume(ResumeError::CorruptInput(_))));
    }

    #[tokio::test]
    async fn test_tailor_rewrites_in_configured_order() {
        let rewriter = EchoRewriter::default();
        let outcome = tailor_resume(
            docx(RESUME),
            "Senior Rust engineer",
            &rewriter,
            &PipelineOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(
            *rewriter.calls.lock().unwrap(),
            vec![
                SectionName::Summary,
                SectionName::Skills,
                SectionName::Experience,
            ]
        );
        assert_eq!(
            outcome.tailored_sections,
            vec![
                SectionName::Summary,
                SectionName::Skills,
                SectionName::Experience,
            ]
        );
        assert!(outcome
            .latex
            .contains("\\section{Summary}\nTailored SUMMARY\n"));
        assert!(outcome.latex.contains("Tailored EXPERIENCE"));
        assert!(!outcome.latex.contains("Built APIs"));
        assert!(outcome.skipped_sections.is_empty());
        assert!(outcome.advisory.is_none());
    }

    #[tokio::test]
    async fn test_tailor_skips_failed_section() {
        let rewriter = EchoRewriter {
            fail_on: Some(SectionName::Experience),
            ..Default::default()
        };
        let outcome = tailor_resume(
            docx(RESUME),
            "Senior Rust engineer",
            &rewriter,
            &PipelineOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.skipped_sections.len(), 1);
        assert_eq!(outcome.skipped_sections[0].section, SectionName::Experience);
        assert!(outcome.latex.contains("Built APIs"));
        assert!(outcome.latex.contains("Tailored SUMMARY"));
        assert!(outcome
            .advisory
            .unwrap()
            .contains("left unchanged: EXPERIENCE"));
    }

    #[tokio::test]
    async fn test_preserved_section_is_not_sent_to_rewriter() {
        let raw = docx(&[
            "Jane Doe",
            "SUMMARY",
            "Backend engineer.",
            "KEY SKILLS",
            "Rust & Go",
            "Team leadership",
        ]);
        let rewriter = EchoRewriter::default();
        let outcome = tailor_resume(raw, "Rust role", &rewriter, &PipelineOptions::default())
            .await
            .unwrap();

        assert_eq!(*rewriter.calls.lock().unwrap(), vec![SectionName::Summary]);
        assert!(outcome.tailored_sections.contains(&SectionName::KeySkills));
        assert!(outcome.latex.contains("\\item Rust \\& Go"));
        assert!(outcome.latex.contains("\\item Team leadership"));
    }

    #[tokio::test]
    async fn test_tailor_requires_job_description() {
        let rewriter = EchoRewriter::default();
        let err = tailor_resume(docx(RESUME), "  ", &rewriter, &PipelineOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(rewriter.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_build_advisory_combines_notes() {
        assert_eq!(build_advisory(false, &[]), None);

        let skipped = vec![SkippedSection {
            section: SectionName::Projects,
            reason: "blocked".to_string(),
        }];
        let advisory = build_advisory(true, &skipped).unwrap();
        assert!(advisory.starts_with("No section headings"));
        assert!(advisory.ends_with("left unchanged: PROJECTS."));
    }

    #[test]
    fn test_targets_append_unlisted_preserved_sections() {
        let options = PipelineOptions {
            tailor_sections: vec![SectionName::Summary, SectionName::KeySkills],
            preserved_sections: vec![SectionName::KeySkills, SectionName::Education],
            ..Default::default()
        };
        assert_eq!(
            options.targets(),
            vec![
                SectionName::Summary,
                SectionName::KeySkills,
                SectionName::Education,
            ]
        );
    }
}
