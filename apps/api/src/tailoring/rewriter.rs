//! Section rewriting: the contract between the pipeline and the generative model.
//!
//! The pipeline depends on [`SectionRewriter`] only. `AppState` carries an
//! `Arc<dyn SectionRewriter>` so tests can swap in a deterministic fake.
//!
//! Model output is never trusted as-is: [`clean_tailored_content`] strips
//! suggestion markers and placeholders, removes stray headings, wraps bare
//! `\item` runs in a list environment and collapses double escapes.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tracing::{info, warn};

use crate::llm_client::prompts::{LATEX_BODY_ONLY_SYSTEM, NO_FABRICATION_INSTRUCTION};
use crate::llm_client::{strip_code_fences, LlmClient, LlmError};
use crate::resume::escape::{collapse_double_escapes, escape};
use crate::resume::SectionName;
use crate::tailoring::prompts::REWRITE_PROMPT_TEMPLATE;

pub const DEFAULT_JD_MAX_CHARS: usize = 3000;

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("Section content or job description is empty")]
    EmptyInput,

    #[error("Content generation blocked by the model's safety filter")]
    SafetyBlocked,

    #[error("AI model returned unusable content: {0}")]
    MalformedResponse(String),

    #[error("AI model call failed: {0}")]
    Llm(#[from] LlmError),
}

/// Rewrites one section's content for a job description.
///
/// Implementations return LaTeX body content ready for substitution.
#[async_trait]
pub trait SectionRewriter: Send + Sync {
    async fn rewrite(
        &self,
        section: &SectionName,
        content: &str,
        job_description: &str,
    ) -> Result<String, RewriteError>;
}

/// Rewriter backed by the Anthropic Messages API.
pub struct LlmSectionRewriter {
    llm: LlmClient,
    jd_max_chars: usize,
}

impl LlmSectionRewriter {
    pub fn new(llm: LlmClient, jd_max_chars: usize) -> Self {
        Self { llm, jd_max_chars }
    }

    fn build_prompt(&self, section: &SectionName, content: &str, job_description: &str) -> String {
        render_prompt(
            REWRITE_PROMPT_TEMPLATE,
            &[
                ("section_name", section.label()),
                ("section_content", content.trim()),
                (
                    "job_description",
                    truncate_chars(job_description.trim(), self.jd_max_chars),
                ),
                ("no_fabrication", NO_FABRICATION_INSTRUCTION),
            ],
        )
    }
}

#[async_trait]
impl SectionRewriter for LlmSectionRewriter {
    async fn rewrite(
        &self,
        section: &SectionName,
        content: &str,
        job_description: &str,
    ) -> Result<String, RewriteError> {
        if content.trim().is_empty() || job_description.trim().is_empty() {
            return Err(RewriteError::EmptyInput);
        }

        info!("Tailoring section '{section}' with the LLM...");

        let prompt = self.build_prompt(section, content, job_description);
        let response = self.llm.call(&prompt, LATEX_BODY_ONLY_SYSTEM).await?;

        if response.is_refusal() {
            warn!("LLM refused to rewrite section '{section}'");
            return Err(RewriteError::SafetyBlocked);
        }

        let text = response
            .text()
            .ok_or_else(|| RewriteError::MalformedResponse("no text block".to_string()))?;

        let tailored = clean_tailored_content(text)?;
        info!(
            "Tailoring successful for section '{section}' ({} in / {} out tokens)",
            response.usage.input_tokens, response.usage.output_tokens
        );
        Ok(tailored)
    }
}

/// Fills `{key}` placeholders in one pass, so substituted values are never re-scanned.
fn render_prompt(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + 4096);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// The first `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Output cleanup
// ────────────────────────────────────────────────────────────────────────────

struct Cleanup {
    bracketed: Regex,
    example: Regex,
    add_hint: Regex,
    angle: Regex,
    placeholder_phrase: Regex,
    note_line: Regex,
    ellipsis_line: Regex,
    blank_fill_line: Regex,
    section_line: Regex,
    trailing_space: Regex,
    blank_runs: Regex,
}

fn cleanup() -> &'static Cleanup {
    static CLEANUP: OnceLock<Cleanup> = OnceLock::new();
    CLEANUP.get_or_init(|| {
        let re = |pattern: &str| Regex::new(pattern).expect("cleanup pattern is valid");
        Cleanup {
            // Prose brackets only; `\item[..]` and `\\[..]` are LaTeX and stay.
            bracketed: re(r"(?m)(^|[ \t])\[[^\]\n]*\]"),
            example: re(r"\(e\.g\.,[^)\n]*\)"),
            add_hint: re(r"(?i)\(add\b[^)\n]*\)"),
            angle: re(r"<[^<>\n]*>"),
            placeholder_phrase: re(
                r"(?i)\b(?:insert|add|include|write|describe|specify|enter|input|your|paste|put)\b[^\n]*?\b(?:here|below|above)\b",
            ),
            note_line: re(r"(?im)^[ \t]*%?[ \t]*(?:todo|note|fixme|xxx|placeholder)\b.*$"),
            ellipsis_line: re(r"(?m)^.*\.\.\.[ \t]*$"),
            blank_fill_line: re(r"(?m)^.*_{3,}.*$"),
            section_line: re(r"(?m)^[ \t]*\\section\*?\{.*$"),
            trailing_space: re(r"(?m)[ \t]+$"),
            blank_runs: re(r"\n[ \t]*(?:\n[ \t]*)+"),
        }
    })
}

/// Turns raw model output into section content, or fails when nothing usable is left.
pub fn clean_tailored_content(raw: &str) -> Result<String, RewriteError> {
    let c = cleanup();
    let text = strip_code_fences(raw);
    if text.is_empty() {
        return Err(RewriteError::MalformedResponse("empty response".to_string()));
    }

    let text = c.bracketed.replace_all(text, "$1");
    let text = c.example.replace_all(&text, "");
    let text = c.add_hint.replace_all(&text, "");
    let text = c.angle.replace_all(&text, "");
    let text = c.placeholder_phrase.replace_all(&text, "");
    let text = c.note_line.replace_all(&text, "");
    let text = c.ellipsis_line.replace_all(&text, "");
    let text = c.blank_fill_line.replace_all(&text, "");
    let text = c.section_line.replace_all(&text, "");
    let text = c.trailing_space.replace_all(&text, "");
    let text = c.blank_runs.replace_all(&text, "\n\n");
    let mut text = text.trim().to_string();

    if text.contains(r"\item")
        && !(text.contains(r"\begin{itemize}") && text.contains(r"\end{itemize}"))
    {
        text = format!("\\begin{{itemize}}\n{text}\n\\end{{itemize}}");
    }

    let text = collapse_double_escapes(&text).into_owned();
    if text.trim().is_empty() {
        return Err(RewriteError::MalformedResponse(
            "content was empty or contained only placeholders".to_string(),
        ));
    }
    Ok(text)
}

/// Renders a section that is never sent to the model.
///
/// KEY SKILLS, and any section whose lines carry bullet markers, become an
/// `itemize` list of escaped lines; anything else is an escaped paragraph.
pub fn format_preserved(section: &SectionName, content: &str) -> String {
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let bulleted = lines.iter().any(|l| l.starts_with(['•', '*', '-']));

    if *section == SectionName::KeySkills || bulleted {
        let mut out = String::from("\\begin{itemize}\n");
        for line in lines {
            out.push_str(&format!("  \\item {}\n", escape(line)));
        }
        out.push_str("\\end{itemize}");
        out
    } else {
        escape(content.trim())
    }
}
