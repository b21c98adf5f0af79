//! LaTeX escaping for resume text.
//!
//! Reserved characters are escaped in a single left-to-right scan. Sequences
//! that are already escaped are copied through, so escaping twice is the same
//! as escaping once.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

/// Reserved character → escaped form.
const RESERVED: &[(char, &str)] = &[
    ('\\', r"\textbackslash{}"),
    ('&', r"\&"),
    ('%', r"\%"),
    ('$', r"\$"),
    ('#', r"\#"),
    ('_', r"\_"),
    ('{', r"\{"),
    ('}', r"\}"),
    ('~', r"\textasciitilde{}"),
    ('^', r"\textasciicircum{}"),
];

/// Characters that form a complete escape when preceded by a backslash.
const ESCAPABLE_AFTER_BACKSLASH: &[char] = &['&', '%', '$', '#', '_', '{', '}'];

/// Escape words produced by this module (without the leading backslash).
const ESCAPE_WORDS: &[&str] = &["textbackslash{}", "textasciitilde{}", "textasciicircum{}"];

/// Double-escaped sequence → single-escaped form.
const DOUBLE_ESCAPES: &[(&str, &str)] = &[
    (r"\\textbackslash{}", r"\textbackslash{}"),
    (r"\\&", r"\&"),
    (r"\\%", r"\%"),
    (r"\\$", r"\$"),
    (r"\\#", r"\#"),
    (r"\\_", r"\_"),
    (r"\\{", r"\{"),
    (r"\\}", r"\}"),
];

fn line_marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*(?:(?:[•●*–-][ \t]*(?:\d+\.[ \t])?|\d+\.[ \t])[ \t]*)+")
            .expect("line marker pattern is valid")
    })
}

/// Escapes `text` for the LaTeX body and strips leading list markers from every line.
pub fn escape(text: &str) -> String {
    let collapsed = collapse_double_escapes(text);
    let stripped = strip_line_markers(&collapsed);
    escape_reserved(&stripped)
}

/// Removes leading bullet, dash, asterisk and `N.` markers from every line.
/// Stacked markers such as `- - ` are removed together.
pub fn strip_line_markers(text: &str) -> Cow<'_, str> {
    line_marker_regex().replace_all(text, "")
}

/// Collapses `\\&`-style double escapes (common in model output) to single escapes.
pub fn collapse_double_escapes(text: &str) -> Cow<'_, str> {
    if !text.contains(r"\\") {
        return Cow::Borrowed(text);
    }
    let mut out = text.to_string();
    for (double, single) in DOUBLE_ESCAPES {
        out = out.replace(double, single);
    }
    Cow::Owned(out)
}

fn escape_reserved(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        let after = &rest[c.len_utf8()..];

        if c == '\\' {
            if let Some(next) = after.chars().next().filter(|n| ESCAPABLE_AFTER_BACKSLASH.contains(n)) {
                out.push('\\');
                out.push(next);
                rest = &after[next.len_utf8()..];
                continue;
            }
            if let Some(word) = ESCAPE_WORDS.iter().find(|w| after.starts_with(*w)) {
                out.push('\\');
                out.push_str(word);
                rest = &after[word.len()..];
                continue;
            }
        }

        match RESERVED.iter().find(|(r, _)| *r == c) {
            Some((_, escaped)) => out.push_str(escaped),
            None => out.push(c),
        }
        rest = after;
    }

    out
}
