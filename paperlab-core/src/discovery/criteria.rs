//! Free-text inclusion criteria applied after search.
//!
//! Understood phrases: "after YYYY" (published in or after that year) and the
//! study types "controlled trial", "randomized", "double-blind" (abstract must
//! mention each one named). Anything else in the criteria is ignored.

use crate::paper::Paper;

const STUDY_TYPES: &[&str] = &["controlled trial", "randomized", "double-blind"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    pub published_after: Option<i32>,
    pub study_types: Vec<String>,
}

impl Criteria {
    pub fn parse(text: &str) -> Self {
        let lower = text.to_lowercase();
        Self {
            published_after: parse_after_year(&lower),
            study_types: STUDY_TYPES
                .iter()
                .filter(|t| lower.contains(**t))
                .map(|t| t.to_string())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.published_after.is_none() && self.study_types.is_empty()
    }

    pub fn matches(&self, paper: &Paper) -> bool {
        if let Some(year) = self.published_after {
            match paper.published_year() {
                Some(published) if published >= year => {}
                _ => return false,
            }
        }
        let abstract_text = paper.abstract_text.to_lowercase();
        self.study_types.iter().all(|t| abstract_text.contains(t.as_str()))
    }

    pub fn apply(&self, papers: Vec<Paper>) -> Vec<Paper> {
        if self.is_empty() {
            return papers;
        }
        let before = papers.len();
        let kept: Vec<Paper> = papers.into_iter().filter(|p| self.matches(p)).collect();
        tracing::debug!(before, after = kept.len(), criteria = ?self, "Applied criteria");
        kept
    }
}

/// The first four-digit number after the word "after".
fn parse_after_year(lower: &str) -> Option<i32> {
    let rest = &lower[lower.find("after")? + "after".len()..];
    let digits: String = rest
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.len() == 4 { digits.parse().ok() } else { None }
}
