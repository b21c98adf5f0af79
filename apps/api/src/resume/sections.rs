//! Canonical section vocabulary and the ordered section map built by the segmenter.

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// A canonical section label.
///
/// Labels that no canonicalization rule recognises pass through as
/// `Other(UPPERCASED)`, so every detected section keeps a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SectionName {
    Header,
    Summary,
    Skills,
    KeySkills,
    Experience,
    Education,
    Projects,
    Certifications,
    Awards,
    Publications,
    FullText,
    Other(String),
}

impl SectionName {
    /// Maps an already-uppercased label to its variant. Unknown labels become `Other`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "HEADER" => SectionName::Header,
            "SUMMARY" => SectionName::Summary,
            "SKILLS" => SectionName::Skills,
            "KEY SKILLS" => SectionName::KeySkills,
            "EXPERIENCE" => SectionName::Experience,
            "EDUCATION" => SectionName::Education,
            "PROJECTS" => SectionName::Projects,
            "CERTIFICATIONS" => SectionName::Certifications,
            "AWARDS" => SectionName::Awards,
            "PUBLICATIONS" => SectionName::Publications,
            "FULL_TEXT" => SectionName::FullText,
            other => SectionName::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            SectionName::Header => "HEADER",
            SectionName::Summary => "SUMMARY",
            SectionName::Skills => "SKILLS",
            SectionName::KeySkills => "KEY SKILLS",
            SectionName::Experience => "EXPERIENCE",
            SectionName::Education => "EDUCATION",
            SectionName::Projects => "PROJECTS",
            SectionName::Certifications => "CERTIFICATIONS",
            SectionName::Awards => "AWARDS",
            SectionName::Publications => "PUBLICATIONS",
            SectionName::FullText => "FULL_TEXT",
            SectionName::Other(label) => label,
        }
    }

    /// Heading text used in the rendered document: `KEY SKILLS` → `Key Skills`.
    pub fn title(&self) -> String {
        title_case(&self.label().replace('_', " "))
    }
}

impl fmt::Display for SectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for SectionName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Maps an observed header spelling to its canonical label.
///
/// Rules are substring tests on the uppercased header, first match wins:
///
/// | Canonical    | Matches                                   |
/// |--------------|-------------------------------------------|
/// | EXPERIENCE   | EXPERIENCE, EMPLOYMENT, WORK HISTORY      |
/// | EDUCATION    | EDUCATION                                 |
/// | KEY SKILLS   | exactly `KEY SKILLS`                      |
/// | SKILLS       | SKILLS, TECHNICAL, COMPETENCIES           |
/// | SUMMARY      | SUMMARY, OBJECTIVE, PROFILE               |
/// | PROJECTS     | PROJECTS                                  |
///
/// Anything else passes through uppercased.
pub fn canonicalize(raw_header: &str) -> SectionName {
    let upper = raw_header.trim().to_uppercase();
    let contains_any = |needles: &[&str]| needles.iter().any(|n| upper.contains(n));

    if contains_any(&["EXPERIENCE", "EMPLOYMENT", "WORK HISTORY"]) {
        SectionName::Experience
    } else if contains_any(&["EDUCATION"]) {
        SectionName::Education
    } else if upper == "KEY SKILLS" {
        SectionName::KeySkills
    } else if contains_any(&["SKILLS", "TECHNICAL", "COMPETENCIES"]) {
        SectionName::Skills
    } else if contains_any(&["SUMMARY", "OBJECTIVE", "PROFILE"]) {
        SectionName::Summary
    } else if contains_any(&["PROJECTS"]) {
        SectionName::Projects
    } else {
        SectionName::from_label(&upper)
    }
}

/// Capitalises the first letter of every alphabetic run and lowercases the rest.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// Insertion-ordered mapping from section name to content.
///
/// Keys are unique. Re-inserting an existing key overwrites its content in
/// place, so the section keeps the position where it was first seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionMap {
    entries: Vec<(SectionName, String)>,
}

impl SectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `content` under `name`, overwriting any previous content (last write wins).
    pub fn insert(&mut self, name: SectionName, content: String) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = content,
            None => self.entries.push((name, content)),
        }
    }

    pub fn get(&self, name: &SectionName) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.as_str())
    }

    pub fn contains(&self, name: &SectionName) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &SectionName) -> Option<String> {
        let idx = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(idx).1)
    }

    /// Drops every entry whose content is blank.
    pub fn retain_non_empty(&mut self) {
        self.entries.retain(|(_, c)| !c.trim().is_empty());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &SectionName> {
        self.entries.iter().map(|(n, _)| n)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SectionName, &str)> {
        self.entries.iter().map(|(n, c)| (n, c.as_str()))
    }
}

impl Serialize for SectionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, content) in &self.entries {
            map.serialize_entry(name.label(), content)?;
        }
        map.end()
    }
}
