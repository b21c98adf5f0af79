//! Section Substitution Engine: swaps the body of named sections in a generated document.
//!
//! One forward scan finds every `\section{..}` / `\section*{..}` heading and the
//! `\end{document}` terminator. A section's body runs from the end of its heading
//! to the next heading or the terminator. Headings are never rewritten.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{info, warn};

use crate::resume::escape::escape;
use crate::resume::sections::SectionName;

/// Location of one section inside a document.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionSpan {
    pub title: String,
    pub heading: Range<usize>,
    /// Everything between the heading and the next boundary, whitespace included.
    pub body: Range<usize>,
}

impl SectionSpan {
    /// The section's content without surrounding whitespace.
    pub fn content<'a>(&self, doc: &'a str) -> &'a str {
        doc[self.body.clone()].trim()
    }
}

fn boundary_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\\section\*?\{([^}]*)\}|\\end\{document\}")
            .expect("section boundary pattern is valid")
    })
}

/// Scans `doc` once and returns every section that is followed by another
/// heading or by `\end{document}`.
pub fn scan_sections(doc: &str) -> Vec<SectionSpan> {
    let mut spans = Vec::new();
    let mut open: Option<(String, Range<usize>)> = None;

    for caps in boundary_regex().captures_iter(doc) {
        let Some(whole) = caps.get(0) else { continue };

        if let Some((title, heading)) = open.take() {
            spans.push(SectionSpan {
                body: heading.end..whole.start(),
                title,
                heading,
            });
        }

        match caps.get(1) {
            Some(title) => open = Some((title.as_str().trim().to_string(), whole.range())),
            // \end{document}: nothing after it belongs to a section.
            None => break,
        }
    }

    spans
}

fn heading_title(name: &SectionName) -> String {
    escape(&name.title())
}

fn find_span<'a>(spans: &'a [SectionSpan], name: &SectionName) -> Option<&'a SectionSpan> {
    let title = heading_title(name);
    spans.iter().find(|s| s.title.eq_ignore_ascii_case(&title))
}

fn formatted(content: &str) -> String {
    format!("\n{}\n", content.trim())
}

/// Replaces the content of the first section titled after `name`.
///
/// Returns the updated document and whether a section was found. When no
/// section matches, the document is returned unchanged.
pub fn substitute(doc: &str, name: &SectionName, content: &str) -> (String, bool) {
    let spans = scan_sections(doc);
    let Some(span) = find_span(&spans, name) else {
        warn!("Could not find section marker for '{name}' in LaTeX. Skipping update.");
        return (doc.to_string(), false);
    };

    let mut out = String::with_capacity(doc.len() + content.len());
    out.push_str(&doc[..span.body.start]);
    out.push_str(&formatted(content));
    out.push_str(&doc[span.body.end..]);

    info!("Successfully updated section: {name}");
    (out, true)
}

/// Applies a batch of substitutions from a single scan.
///
/// Equivalent to calling [`substitute`] for each pair in order: a later pair
/// for the same section wins. Returns the document and the names that were
/// actually replaced, in request order.
pub fn substitute_all(
    doc: &str,
    replacements: &[(SectionName, String)],
) -> (String, Vec<SectionName>) {
    let spans = scan_sections(doc);

    // Last request per section wins; keep the position of its first request.
    let mut wanted: Vec<(&SectionName, &str)> = Vec::new();
    for (name, content) in replacements {
        match wanted.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = content.as_str(),
            None => wanted.push((name, content.as_str())),
        }
    }

    let mut edits: Vec<(Range<usize>, String)> = Vec::new();
    let mut applied = Vec::new();
    for (name, content) in wanted {
        match find_span(&spans, name) {
            Some(span) if !edits.iter().any(|(r, _)| *r == span.body) => {
                edits.push((span.body.clone(), formatted(content)));
                applied.push(name.clone());
                info!("Successfully updated section: {name}");
            }
            Some(span) => warn!(
                "Section '{}' was already updated by an earlier name; skipping '{name}'.",
                span.title
            ),
            None => warn!("Could not find section marker for '{name}' in LaTeX. Skipping update."),
        }
    }

    // Splice back to front so earlier offsets stay valid.
    edits.sort_by_key(|(range, _)| std::cmp::Reverse(range.start));
    let mut out = doc.to_string();
    for (range, text) in edits {
        out.replace_range(range, &text);
    }

    (out, applied)
}
