//! The paper record shared by discovery, the pipeline and the report.

use serde::{Deserialize, Serialize};

/// One candidate paper. Read-only once it enters the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    /// Stable key, e.g. the arXiv identifier `2401.01234v1`.
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
    /// Publication date as `YYYY-MM-DD`.
    pub published: String,
    pub url: String,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl Paper {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        abstract_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            authors: Vec::new(),
            abstract_text: abstract_text.into(),
            full_text: None,
            published: String::new(),
            url: String::new(),
            categories: Vec::new(),
        }
    }

    pub fn with_authors(mut self, authors: Vec<String>) -> Self {
        self.authors = authors;
        self
    }

    pub fn with_published(mut self, published: impl Into<String>) -> Self {
        self.published = published.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_full_text(mut self, text: impl Into<String>) -> Self {
        self.full_text = Some(text.into());
        self
    }

    /// Full text when it carries any content.
    pub fn usable_full_text(&self) -> Option<&str> {
        self.full_text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }

    /// The text the analysis stages read: full text, else the abstract.
    pub fn text_for_analysis(&self) -> &str {
        self.usable_full_text().unwrap_or(&self.abstract_text)
    }

    /// Four-digit publication year, if the date is well formed.
    pub fn published_year(&self) -> Option<i32> {
        use chrono::Datelike;
        match chrono::NaiveDate::parse_from_str(&self.published, "%Y-%m-%d") {
            Ok(date) => Some(date.year()),
            Err(_) => self.published.get(..4).and_then(|y| y.parse().ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_prefers_full_text() {
        let paper = Paper::new("p1", "Title", "short abstract").with_full_text("the whole paper");
        assert_eq!(paper.text_for_analysis(), "the whole paper");
    }

    #[test]
    fn test_blank_full_text_falls_back_to_abstract() {
        let paper = Paper::new("p1", "Title", "short abstract").with_full_text("  \n\t ");
        assert_eq!(paper.text_for_analysis(), "short abstract");
        assert!(paper.usable_full_text().is_none());
    }

    #[test]
    fn test_published_year() {
        let paper = Paper::new("p1", "T", "A").with_published("2021-06-30");
        assert_eq!(paper.published_year(), Some(2021));
        assert_eq!(Paper::new("p2", "T", "A").published_year(), None);
    }

    #[test]
    fn test_serde_uses_abstract_key() {
        let paper = Paper::new("p1", "T", "An abstract");
        let json = serde_json::to_value(&paper).unwrap();
        assert_eq!(json["abstract"], "An abstract");
        assert!(json.get("full_text").is_none());
    }
}
