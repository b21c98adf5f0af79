//! Markup Reconstructor: renders a [`SectionMap`] as a LaTeX resume.
//!
//! Layout:
//! 1. fixed preamble (geometry, hyperref, `\section` restyled as bold label + rule,
//!    `customitemize` list environment)
//! 2. centered name / contact block parsed from the HEADER bucket
//! 3. sections in [`PREFERRED_ORDER`], then any other section in map order
//!
//! FULL_TEXT is never given a heading. When segmentation found nothing, its
//! text is emitted as a plain body and the result is flagged low-confidence.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::info;

use crate::resume::escape::{escape, strip_line_markers};
use crate::resume::sections::{SectionMap, SectionName};
use crate::resume::ResumeError;

/// Rendering order for well-known sections. Sections not listed follow in map order.
pub const PREFERRED_ORDER: &[SectionName] = &[
    SectionName::Summary,
    SectionName::KeySkills,
    SectionName::Experience,
    SectionName::Projects,
    SectionName::Education,
    SectionName::Certifications,
    SectionName::Awards,
    SectionName::Publications,
];

const DEFAULT_NAME: &str = "Your Name Here";
const LINE_BREAK: &str = r" \\ ";
const LIST_BEGIN: &str = r"\begin{customitemize}";
const LIST_END: &str = r"\end{customitemize}";

pub const PREAMBLE: &str = r"\documentclass[11pt]{article}
\usepackage[margin=0.5in]{geometry}
\usepackage{enumitem}
\usepackage{hyperref}

\pagenumbering{gobble}

\setlength{\parindent}{0pt}
\setlength{\parskip}{0.2em}
\raggedright

\renewcommand{\section}[1]{
  \vspace{0.2em}
  {\large\bfseries #1}
  \vspace{0.1em}
  \hrule
  \vspace{0.2em}
}

\renewcommand{\labelitemi}{$\bullet$}
\setlength{\itemsep}{0.1em}
\setlength{\topsep}{0.1em}
\setlength{\partopsep}{0.1em}
\setlength{\parsep}{0.1em}

\newenvironment{customitemize}
  {\begin{itemize}[label=$\bullet$]}
  {\end{itemize}}

\begin{document}
";

pub const DOCUMENT_END: &str = r"\end{document}";

/// Tunable heuristics for reconstruction.
#[derive(Debug, Clone)]
pub struct ReconstructOptions {
    /// A multi-line section whose average characters per line is below this is rendered as a list.
    pub list_max_avg_line_chars: f64,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self {
            list_max_avg_line_chars: 150.0,
        }
    }
}

/// A classified line from the header bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContactLine {
    Email { text: String },
    Phone { text: String },
    LinkedIn { url: String, handle: String },
    GitHub { url: String, handle: String },
    Website { url: String },
    Plain { text: String },
}

impl ContactLine {
    fn render(&self) -> String {
        match self {
            ContactLine::Email { text } => format!("Email: {}", escape(text)),
            ContactLine::Phone { text } => format!("Phone: {}", escape(text)),
            ContactLine::LinkedIn { url, handle } => {
                format!("LinkedIn: {}", href(url, &escape(handle)))
            }
            ContactLine::GitHub { url, handle } => {
                format!("GitHub: {}", href(url, &escape(handle)))
            }
            ContactLine::Website { url } => format!("Website: {}", href(url, &escape(url))),
            ContactLine::Plain { text } => escape(text),
        }
    }
}

/// Display name and contact lines parsed from the HEADER bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactBlock {
    pub name: String,
    pub lines: Vec<ContactLine>,
}

/// Output of [`reconstruct`]. The input map is left untouched.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub document: String,
    /// The input sections minus HEADER.
    pub residual: SectionMap,
    pub contact: ContactBlock,
    /// True when the document was built from the FULL_TEXT fallback.
    pub low_confidence: bool,
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{3}[-.\s]??){2}\d{4}").expect("phone pattern is valid"))
}

fn blank_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[ \t]*\n").expect("blank line pattern is valid"))
}

/// Renders `sections` as a complete LaTeX document.
///
/// Fails with [`ResumeError::EmptyInput`] when nothing but HEADER (or nothing at all) is present.
pub fn reconstruct(
    sections: &SectionMap,
    options: &ReconstructOptions,
) -> Result<Reconstruction, ResumeError> {
    let mut residual = sections.clone();
    let header = residual.remove(&SectionName::Header).unwrap_or_default();

    if residual.is_empty() {
        return Err(ResumeError::EmptyInput);
    }

    let contact = parse_contact_block(&header);

    let mut doc = String::from(PREAMBLE);
    doc.push_str(&render_contact_block(&contact));

    for name in PREFERRED_ORDER {
        if let Some(content) = residual.get(name) {
            push_section(&mut doc, name, content, options);
        }
    }

    for (name, content) in residual.iter() {
        if PREFERRED_ORDER.contains(name) || *name == SectionName::FullText {
            continue;
        }
        push_section(&mut doc, name, content, options);
    }

    let low_confidence = match residual.get(&SectionName::FullText) {
        Some(text) => {
            doc.push('\n');
            doc.push_str(&escape(text));
            doc.push('\n');
            true
        }
        None => false,
    };

    doc.push('\n');
    doc.push_str(DOCUMENT_END);
    doc.push('\n');

    info!("LaTeX conversion complete ({} sections)", residual.len());

    Ok(Reconstruction {
        document: doc,
        residual,
        low_confidence,
        contact,
    })
}

/// Renders one section's body with the policy for its name (no heading).
pub fn render_section_body(name: &SectionName, content: &str, options: &ReconstructOptions) -> String {
    match name {
        SectionName::Experience => render_experience(content),
        SectionName::KeySkills | SectionName::Skills => render_bullets(content),
        SectionName::Education => render_education(content),
        _ => render_generic(content, options),
    }
}

/// The `\section{..}` heading emitted for `name`.
pub fn section_heading(name: &SectionName) -> String {
    format!(r"\section{{{}}}", escape(&name.title()))
}

fn push_section(doc: &mut String, name: &SectionName, content: &str, options: &ReconstructOptions) {
    doc.push('\n');
    doc.push_str(&section_heading(name));
    doc.push('\n');
    doc.push_str(&render_section_body(name, content, options));
}

pub fn parse_contact_block(header: &str) -> ContactBlock {
    let mut lines = header.lines().map(str::trim).filter(|l| !l.is_empty());
    let name = lines.next().unwrap_or(DEFAULT_NAME).to_string();
    ContactBlock {
        name,
        lines: lines.map(classify_contact_line).collect(),
    }
}

pub fn classify_contact_line(line: &str) -> ContactLine {
    let text = line.to_string();
    if line.contains('@') || line.contains("mailto:") {
        ContactLine::Email { text }
    } else if phone_regex().is_match(line) {
        ContactLine::Phone { text }
    } else if line.contains("linkedin.com") {
        let url = link_target(line, "linkedin.com");
        let handle = last_path_segment(&url);
        ContactLine::LinkedIn { url, handle }
    } else if line.contains("github.com") {
        let url = link_target(line, "github.com");
        let handle = last_path_segment(&url);
        ContactLine::GitHub { url, handle }
    } else if line.contains("http") {
        ContactLine::Website {
            url: link_target(line, "http"),
        }
    } else {
        ContactLine::Plain { text }
    }
}

fn render_contact_block(contact: &ContactBlock) -> String {
    let contact_line = contact
        .lines
        .iter()
        .map(ContactLine::render)
        .collect::<Vec<_>>()
        .join(LINE_BREAK);

    let mut block = String::from("\n\\begin{center}\n");
    block.push_str(&format!("    {{\\Large {}}}\n", escape(&contact.name)));
    if !contact_line.is_empty() {
        block.push_str("    \\vspace{0.2em} \\\\\n");
        block.push_str(&format!("    {contact_line}\n"));
    }
    block.push_str("\\end{center}\n\\vspace{0.3em}\n");
    block
}

/// First whitespace-separated token containing `needle`, with a scheme added if missing.
fn link_target(line: &str, needle: &str) -> String {
    let token = line
        .split_whitespace()
        .find(|t| t.contains(needle))
        .unwrap_or(line.trim())
        .trim_end_matches([',', ';', ')']);
    if token.starts_with("http://") || token.starts_with("https://") {
        token.to_string()
    } else {
        format!("https://{token}")
    }
}

fn last_path_segment(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn href(url: &str, label: &str) -> String {
    format!(r"\href{{{}}}{{{}}}", url.replace('%', r"\%"), label)
}

fn render_list<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::from(LIST_BEGIN);
    out.push('\n');
    for item in items {
        out.push_str(&format!("  \\item {}\n", escape(item)));
    }
    out.push_str(LIST_END);
    out.push('\n');
    out
}

fn non_blank_lines(content: &str) -> impl Iterator<Item = &str> {
    content.lines().map(str::trim).filter(|l| !l.is_empty())
}

/// Blank-line separated entries. An entry of two or more lines is
/// `title / date / bullets...`; shorter entries are emitted as text.
fn render_experience(content: &str) -> String {
    let mut out = String::new();
    for entry in blank_line_regex().split(content) {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let lines: Vec<&str> = entry.lines().collect();
        if lines.len() < 2 {
            out.push_str(&escape(entry));
            out.push('\n');
            continue;
        }

        let title = strip_line_markers(lines[0].trim()).trim().to_string();
        let date = lines[1].trim();
        out.push_str(&format!(
            "\\textbf{{{}}} \\hfill \\textit{{{}}}\n",
            escape(&title),
            escape(date)
        ));
        if lines.len() > 2 {
            out.push_str(&render_list(
                lines[2..].iter().map(|l| l.trim()).filter(|l| !l.is_empty()),
            ));
        }
    }
    out
}

/// One bullet per non-blank line.
fn render_bullets(content: &str) -> String {
    render_list(non_blank_lines(content))
}

/// `Degree - Date` lines become bold/italic pairs; anything else is a plain paragraph.
fn render_education(content: &str) -> String {
    let mut out = String::new();
    for line in non_blank_lines(content) {
        let parts: Vec<&str> = line.split(" - ").collect();
        if let [degree, date] = parts.as_slice() {
            out.push_str(&format!(
                "\\textbf{{{}}} \\hfill \\textit{{{}}}\n\n",
                escape(degree.trim()),
                escape(date.trim())
            ));
        } else {
            out.push_str(&escape(line));
            out.push_str("\n\n");
        }
    }
    out
}

fn render_generic(content: &str, options: &ReconstructOptions) -> String {
    let lines: Vec<&str> = non_blank_lines(content).collect();
    let avg_line_chars = content.chars().count() as f64 / lines.len().max(1) as f64;
    if lines.len() > 1 && avg_line_chars < options.list_max_avg_line_chars {
        render_list(lines.into_iter())
    } else {
        format!("{}\n", escape(content))
    }
}
