//! Fallback parser for model replies that ignore the JSON instruction.
//!
//! Recognized layout:
//!
//! ```text
//! Hypotheses:
//! - first
//! 2. second
//! Knowledge gaps:
//! * a gap
//! ```
//!
//! A heading is a line ending in `:` (Markdown `#`/`**` decoration is
//! ignored); its key is lower-cased with spaces replaced by `_`. Bullets
//! (`- `, `* `, `• `) and numbering (`1.`, `1)`) are stripped from items.
//! Lines before the first heading belong to an implicit `body` section.

/// One heading and the items listed beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub key: String,
    pub items: Vec<String>,
}

/// Parser output; `Empty` when no line carried any content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedSections {
    Empty,
    Sections(Vec<Section>),
}

impl ParsedSections {
    pub fn is_empty(&self) -> bool {
        matches!(self, ParsedSections::Empty)
    }

    pub fn sections(&self) -> &[Section] {
        match self {
            ParsedSections::Empty => &[],
            ParsedSections::Sections(sections) => sections,
        }
    }

    /// Items of every section whose key contains `needle`, in document order.
    pub fn items_matching(&self, needle: &str) -> Vec<String> {
        self.sections()
            .iter()
            .filter(|s| s.key.contains(needle))
            .flat_map(|s| s.items.iter().cloned())
            .collect()
    }

    /// Like `items_matching` but accepts any of several needles.
    pub fn items_matching_any(&self, needles: &[&str]) -> Vec<String> {
        self.sections()
            .iter()
            .filter(|s| needles.iter().any(|n| s.key.contains(n)))
            .flat_map(|s| s.items.iter().cloned())
            .collect()
    }
}

/// Split free text into headed sections.
pub fn parse_sections(text: &str) -> ParsedSections {
    let mut sections: Vec<Section> = Vec::new();
    let mut current: Option<Section> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(key) = heading_key(trimmed) {
            if let Some(done) = current.take() {
                sections.push(done);
            }
            current = Some(Section {
                key,
                items: Vec::new(),
            });
            continue;
        }

        let item = strip_list_marker(trimmed);
        if item.is_empty() {
            continue;
        }
        current
            .get_or_insert_with(|| Section {
                key: "body".to_string(),
                items: Vec::new(),
            })
            .items
            .push(item.to_string());
    }

    if let Some(done) = current.take() {
        sections.push(done);
    }
    sections.retain(|s| !s.items.is_empty());

    if sections.is_empty() {
        ParsedSections::Empty
    } else {
        ParsedSections::Sections(sections)
    }
}

fn heading_key(line: &str) -> Option<String> {
    if has_list_marker(line) {
        return None;
    }
    let bare = line.trim_start_matches('#').trim().trim_matches('*').trim();
    let name = bare.strip_suffix(':')?.trim().trim_matches('*').trim();
    if name.is_empty() {
        return None;
    }
    Some(name.to_lowercase().replace(' ', "_"))
}

fn has_list_marker(line: &str) -> bool {
    strip_list_marker(line).len() != line.len()
}

fn strip_list_marker(line: &str) -> &str {
    for bullet in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return rest.trim();
        }
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(after) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')'))
            && (after.is_empty() || after.starts_with(char::is_whitespace))
        {
            return after.trim();
        }
    }
    line
}
