//! Section Segmenter: splits unstructured resume text into canonical sections.
//!
//! A header is a line consisting solely of a vocabulary label, optionally
//! followed by a colon or whitespace. Only the first occurrence of each label
//! counts. Text before the first header lands in the synthetic HEADER bucket.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::resume::sections::{canonicalize, SectionMap, SectionName};
use crate::resume::ResumeError;

/// Section labels in the order they are searched for.
pub const STANDARD_LABELS: &[&str] = &[
    "SUMMARY",
    "PROFILE",
    "OBJECTIVE",
    "EXPERIENCE",
    "EMPLOYMENT HISTORY",
    "WORK HISTORY",
    "EDUCATION",
    "KEY SKILLS",
    "SKILLS",
    "TECHNICAL SKILLS",
    "COMPETENCIES",
    "PROJECTS",
    "CERTIFICATIONS",
    "LICENSES",
    "AWARDS",
    "HONORS",
    "PUBLICATIONS",
    "REFERENCES",
];

struct LabelPattern {
    label: String,
    regex: Regex,
}

/// Ordered set of header labels, compiled to line-matching patterns.
pub struct Vocabulary {
    patterns: Vec<LabelPattern>,
}

impl Vocabulary {
    pub fn new<I, S>(labels: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = labels
            .into_iter()
            .map(|label| {
                let label = label.as_ref().to_string();
                let regex = Regex::new(&format!(
                    r"(?i)\n\s*({}[:\s]*)\n",
                    regex::escape(&label)
                ))?;
                Ok(LabelPattern { label, regex })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { patterns })
    }

    /// The built-in vocabulary, compiled once.
    pub fn standard() -> &'static Vocabulary {
        static STANDARD: OnceLock<Vocabulary> = OnceLock::new();
        STANDARD.get_or_init(|| {
            Vocabulary::new(STANDARD_LABELS).expect("standard labels are escaped literals")
        })
    }
}

/// Splits `text` into a [`SectionMap`].
///
/// - Content between two headers belongs to the earlier header's canonical name.
/// - A canonical name seen twice keeps the later content (last write wins).
/// - Blank sections are dropped.
/// - No header at all yields a single FULL_TEXT entry with the trimmed text.
/// - Blank input fails with [`ResumeError::NoSectionsFound`].
pub fn segment(text: &str, vocabulary: &Vocabulary) -> Result<SectionMap, ResumeError> {
    let trimmed = text.trim();
    let padded = format!("\n{trimmed}\n");

    // Keyed by byte offset of the header; a later label at the same offset replaces the earlier.
    let mut headers: BTreeMap<usize, &str> = BTreeMap::new();
    for pattern in &vocabulary.patterns {
        if let Some(m) = pattern.regex.captures(&padded).and_then(|c| c.get(1)) {
            headers.insert(m.start(), m.as_str().trim());
        }
    }

    if headers.is_empty() {
        return full_text_fallback(trimmed);
    }

    let mut sections = SectionMap::new();
    let mut current = SectionName::Header.label().to_string();
    let mut last_end = 0;

    for (&start, &header) in &headers {
        let content = padded.get(last_end..start).unwrap_or("").trim();
        if !content.is_empty() {
            sections.insert(canonicalize(&current), content.to_string());
        }
        current = header.to_string();
        last_end = start + header.len();
    }

    let tail = padded.get(last_end..).unwrap_or("").trim();
    if !tail.is_empty() {
        sections.insert(canonicalize(&current), tail.to_string());
    }

    sections.retain_non_empty();
    if sections.is_empty() {
        return full_text_fallback(trimmed);
    }

    debug!(
        "Parsed sections: {:?}",
        sections.names().map(|n| n.label()).collect::<Vec<_>>()
    );
    Ok(sections)
}

fn full_text_fallback(trimmed: &str) -> Result<SectionMap, ResumeError> {
    if trimmed.is_empty() {
        return Err(ResumeError::NoSectionsFound);
    }
    let mut sections = SectionMap::new();
    sections.insert(SectionName::FullText, trimmed.to_string());
    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str) -> SectionMap {
        segment(text, Vocabulary::standard()).unwrap()
    }

    #[test]
    fn test_segment_basic_resume() {
        let map = seg("John Doe\njohn@x.com\nSUMMARY\nBuilt things.\nSKILLS\nGo, C++\n");
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(&SectionName::Header), Some("John Doe\njohn@x.com"));
        assert_eq!(map.get(&SectionName::Summary), Some("Built things."));
        assert_eq!(map.get(&SectionName::Skills), Some("Go, C++"));
        let names: Vec<_> = map.names().cloned().collect();
        assert_eq!(
            names,
            vec![SectionName::Header, SectionName::Summary, SectionName::Skills]
        );
    }

    #[test]
    fn test_segment_no_headers_yields_full_text() {
        let map = seg("  Jane Smith\nI write software and enjoy hiking.\n  ");
        assert_eq!(map.len(), 1);
        assert_eq!(
            map.get(&SectionName::FullText),
            Some("Jane Smith\nI write software and enjoy hiking.")
        );
    }

    #[test]
    fn test_segment_blank_input_fails() {
        let err = segment(" \n\t ", Vocabulary::standard()).unwrap_err();
        assert!(matches!(err, ResumeError::NoSectionsFound));
    }

    #[test]
    fn test_segment_education_not_merged_into_summary() {
        let map = seg("Jane\nEDUCATION\nBSc Computing - 2020\n\nSUMMARY\nBackend engineer.");
        assert_eq!(map.get(&SectionName::Education), Some("BSc Computing - 2020"));
        assert_eq!(map.get(&SectionName::Summary), Some("Backend engineer."));
    }

    #[test]
    fn test_segment_empty_education_is_dropped() {
        let map = seg("Jane\nEDUCATION\n\nSUMMARY\nBackend engineer.");
        assert!(!map.contains(&SectionName::Education));
        assert_eq!(map.get(&SectionName::Summary), Some("Backend engineer."));
    }

    #[test]
    fn test_segment_case_insensitive_with_colon() {
        let map = seg("Jane\nProfessional summary\nignored\nExperience:\nAcme Corp\n2019 - 2021");
        // "Professional summary" is not a bare label line, so it stays in the header.
        assert_eq!(
            map.get(&SectionName::Header),
            Some("Jane\nProfessional summary\nignored")
        );
        assert_eq!(map.get(&SectionName::Experience), Some("Acme Corp\n2019 - 2021"));
    }

    #[test]
    fn test_segment_key_skills_and_technical_skills_distinct() {
        let map = seg("Jane\nKEY SKILLS\nLeadership\nTECHNICAL SKILLS\nRust\nGo");
        assert_eq!(map.get(&SectionName::KeySkills), Some("Leadership"));
        assert_eq!(map.get(&SectionName::Skills), Some("Rust\nGo"));
    }

    #[test]
    fn test_segment_duplicate_canonical_last_write_wins() {
        let map = seg("Jane\nEXPERIENCE\nAcme\nWORK HISTORY\nGlobex");
        assert_eq!(map.get(&SectionName::Experience), Some("Globex"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_segment_unknown_label_passes_through() {
        let map = seg("Jane\nLICENSES\nPE, State of Ohio");
        assert_eq!(
            map.get(&SectionName::Other("LICENSES".to_string())),
            Some("PE, State of Ohio")
        );
    }

    #[test]
    fn test_segment_only_first_occurrence_of_label_counts() {
        let map = seg("Jane\nPROJECTS\nCompiler\nPROJECTS\nDatabase");
        assert_eq!(map.get(&SectionName::Projects), Some("Compiler\nPROJECTS\nDatabase"));
    }

    #[test]
    fn test_segment_resume_starting_with_header_has_no_header_bucket() {
        let map = seg("SUMMARY\nBuilt things.");
        assert!(!map.contains(&SectionName::Header));
        assert_eq!(map.get(&SectionName::Summary), Some("Built things."));
    }

    #[test]
    fn test_custom_vocabulary() {
        let vocab = Vocabulary::new(["HOBBIES"]).unwrap();
        let map = segment("Jane\nHobbies\nChess", &vocab).unwrap();
        assert_eq!(
            map.get(&SectionName::Other("HOBBIES".to_string())),
            Some("Chess")
        );
    }
}
