//! Tool documentation parser.
//!
//! Pulls the tool description and per-parameter descriptions out of free-form
//! doc text. Three conventions are understood:
//!
//! ```text
//! Google:             reST:                        Rust:
//!   Args:               :param location: City.       # Arguments
//!       location: City.                              * `location` - City.
//! ```
//!
//! Everything before the first section is the description: the first
//! paragraph is the short description, later paragraphs the long one.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

/// `location (str): The city.` / `location: The city.`
static GOOGLE_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\*{0,2}\w+)\s*(?:\([^)]*\))?\s*:\s*(.*)$").expect("valid google param pattern")
});

/// `:param location: The city.` / `:param str location: The city.`
static REST_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^:param\s+(?:[^:\s]+\s+)?(\w+)\s*:\s*(.*)$").expect("valid reST param pattern")
});

/// ``* `location` - The city.`` / ``- `location`: The city.``
static RUST_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[*-]\s+`?(\w+)`?\s*(?:-|:|–)\s*(.*)$").expect("valid rustdoc param pattern")
});

const GOOGLE_ARG_HEADERS: &[&str] = &["args", "arguments", "parameters", "params"];
const GOOGLE_OTHER_HEADERS: &[&str] = &[
    "returns", "return", "yields", "raises", "errors", "examples", "example", "note", "notes",
    "see also", "attributes", "warning", "warnings",
];

/// Parsed doc text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedDoc {
    pub short_description: String,
    pub long_description: Option<String>,
    /// Parameter name → description, in documentation order.
    pub params: IndexMap<String, String>,
}

impl ParsedDoc {
    /// Short description, plus the long description after a blank line.
    pub fn description(&self) -> String {
        match &self.long_description {
            Some(long) => format!("{}\n\n{}", self.short_description, long),
            None => self.short_description.clone(),
        }
    }

    /// Description of `name`, empty if undocumented.
    pub fn param(&self, name: &str) -> &str {
        self.params.get(name).map(String::as_str).unwrap_or("")
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Description,
    Params,
    Other,
}

fn section_header(trimmed: &str) -> Option<Section> {
    if let Some(heading) = trimmed.strip_prefix('#') {
        let heading = heading.trim_start_matches('#').trim().to_ascii_lowercase();
        return Some(if GOOGLE_ARG_HEADERS.contains(&heading.as_str()) {
            Section::Params
        } else {
            Section::Other
        });
    }
    let name = trimmed.strip_suffix(':')?.trim().to_ascii_lowercase();
    if GOOGLE_ARG_HEADERS.contains(&name.as_str()) {
        Some(Section::Params)
    } else if GOOGLE_OTHER_HEADERS.contains(&name.as_str()) {
        Some(Section::Other)
    } else {
        None
    }
}

/// Parse doc text. Never fails: unrecognized text is ignored.
pub fn parse_doc(doc: &str) -> ParsedDoc {
    let mut description_lines: Vec<&str> = Vec::new();
    let mut params: IndexMap<String, String> = IndexMap::new();
    let mut section = Section::Description;
    let mut current: Option<String> = None;
    let mut entry_indent = 0;

    for line in doc.lines() {
        let trimmed = line.trim();
        let indent = indent_of(line);
        let continues = current.is_some() && !trimmed.is_empty() && indent > entry_indent;

        if let Some(next) = section_header(trimmed) {
            section = next;
            current = None;
            continue;
        }

        // reST fields may appear anywhere after the description.
        if trimmed.starts_with(':') {
            current = None;
            section = Section::Other;
            if let Some(caps) = REST_PARAM.captures(trimmed) {
                params.insert(caps[1].to_string(), caps[2].trim().to_string());
                current = Some(caps[1].to_string());
                entry_indent = indent;
            }
            continue;
        }

        if trimmed.is_empty() {
            current = None;
            if section == Section::Description {
                description_lines.push(trimmed);
            }
            continue;
        }

        match section {
            Section::Description => description_lines.push(trimmed),
            _ if continues => append_continuation(&mut params, current.as_deref(), trimmed),
            Section::Params => {
                let caps = RUST_PARAM
                    .captures(trimmed)
                    .or_else(|| GOOGLE_PARAM.captures(trimmed));
                if let Some(caps) = caps {
                    let name = caps[1].trim_start_matches('*').to_string();
                    params.insert(name.clone(), caps[2].trim().to_string());
                    current = Some(name);
                    entry_indent = indent;
                }
            }
            Section::Other => {}
        }
    }

    let (short_description, long_description) = split_paragraphs(&description_lines);
    ParsedDoc {
        short_description,
        long_description,
        params,
    }
}

/// Width of leading whitespace, counting a tab as four columns.
fn indent_of(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

fn append_continuation(params: &mut IndexMap<String, String>, current: Option<&str>, text: &str) {
    if let Some(desc) = current.and_then(|name| params.get_mut(name)) {
        if !desc.is_empty() {
            desc.push(' ');
        }
        desc.push_str(text);
    }
}

fn split_paragraphs(lines: &[&str]) -> (String, Option<String>) {
    let mut paragraphs: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for &line in lines {
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    let mut iter = paragraphs.into_iter();
    let short = iter.next().map(|p| p.join(" ")).unwrap_or_default();
    let long: Vec<String> = iter.map(|p| p.join("\n")).collect();
    let long = (!long.is_empty()).then(|| long.join("\n\n"));
    (short, long)
}
