//! arXiv search client and Atom feed parsing.

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::paper::Paper;
use crate::providers::RateLimiter;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const ARXIV_API_BASE: &str = "http://export.arxiv.org/api/query";
const USER_AGENT: &str = concat!("paperlab/", env!("CARGO_PKG_VERSION"));

/// A searchable paper index.
#[async_trait]
pub trait PaperSource: Send + Sync {
    /// Up to `max_results` papers matching any of `keywords`.
    ///
    /// If a later page fails, the papers gathered so far are returned; an
    /// error is reported only when nothing was gathered.
    async fn search(
        &self,
        keywords: &[String],
        max_results: usize,
    ) -> Result<Vec<Paper>, SearchError>;
}

/// HTTP client for the arXiv query API.
pub struct ArxivClient {
    client: reqwest::Client,
    base_url: String,
    limiter: Arc<RateLimiter>,
    page_size: usize,
}

impl ArxivClient {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SearchError::Request {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: ARXIV_API_BASE.to_string(),
            limiter: Arc::new(RateLimiter::new(config.min_interval())),
            page_size: config.page_size.max(1),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Share a limiter with other clients hitting the same API.
    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    async fn fetch_page(
        &self,
        query: &str,
        start: usize,
        count: usize,
    ) -> Result<AtomPage, SearchError> {
        self.limiter.acquire().await;
        let url = build_search_url(&self.base_url, query, start, count);
        debug!(url = %url, "arXiv search request");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SearchError::Request {
                message: format!("arXiv API request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Request {
                message: format!("arXiv API returned status {}", status),
            });
        }

        let body = response.text().await.map_err(|e| SearchError::Request {
            message: format!("Failed to read arXiv response: {}", e),
        })?;
        parse_atom_response(&body)
    }
}

#[async_trait]
impl PaperSource for ArxivClient {
    async fn search(
        &self,
        keywords: &[String],
        max_results: usize,
    ) -> Result<Vec<Paper>, SearchError> {
        let query = build_query(keywords)?;
        info!(query = %query, max_results, "Searching arXiv");
        let query = query.as_str();
        let papers = collect_pages(max_results, self.page_size, |start, count| {
            self.fetch_page(query, start, count)
        })
        .await?;
        info!(found = papers.len(), "arXiv search finished");
        Ok(papers)
    }
}

/// One page of an Atom search feed.
#[derive(Debug, Clone, Default)]
pub struct AtomPage {
    pub papers: Vec<Paper>,
    pub total_results: usize,
}

/// Page through a feed until `max_results` papers or the end of results.
pub async fn collect_pages<F, Fut>(
    max_results: usize,
    page_size: usize,
    mut fetch: F,
) -> Result<Vec<Paper>, SearchError>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = Result<AtomPage, SearchError>>,
{
    let mut papers: Vec<Paper> = Vec::new();
    let mut start = 0;

    while papers.len() < max_results {
        let count = page_size.max(1).min(max_results - papers.len());
        match fetch(start, count).await {
            Ok(page) => {
                let got = page.papers.len();
                papers.extend(page.papers);
                start += got;
                if got == 0 || start >= page.total_results {
                    break;
                }
            }
            Err(e) if !papers.is_empty() => {
                warn!(gathered = papers.len(), error = %e, "Keeping partial search results");
                break;
            }
            Err(e) => return Err(e),
        }
    }

    papers.truncate(max_results);
    Ok(papers)
}

/// `all:"kw1" OR all:"kw2"`; quotes inside keywords are dropped.
pub fn build_query(keywords: &[String]) -> Result<String, SearchError> {
    let parts: Vec<String> = keywords
        .iter()
        .map(|k| k.replace('"', ""))
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .map(|k| format!("all:\"{}\"", k))
        .collect();
    if parts.is_empty() {
        return Err(SearchError::NoKeywords);
    }
    Ok(parts.join(" OR "))
}

pub fn build_search_url(base_url: &str, query: &str, start: usize, max_results: usize) -> String {
    format!(
        "{}?search_query={}&start={}&max_results={}&sortBy=relevance&sortOrder=descending",
        base_url,
        urlencoding::encode(query),
        start,
        max_results,
    )
}

// ── XML Parsing ───────────────────────────────────────────────

/// Parse an arXiv Atom feed into papers.
pub fn parse_atom_response(xml: &str) -> Result<AtomPage, SearchError> {
    if !xml.contains("<feed") {
        return Err(SearchError::Parse {
            message: "response is not an Atom feed".to_string(),
        });
    }

    let papers: Vec<Paper> = extract_blocks(xml, "entry")
        .into_iter()
        .filter_map(parse_entry)
        .collect();
    let total_results = extract_tag_text(xml, "opensearch:totalResults")
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(papers.len());

    Ok(AtomPage {
        papers,
        total_results,
    })
}

/// Every `<tag>...</tag>` block, in document order.
fn extract_blocks<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let mut blocks = Vec::new();
    let mut search_from = 0;

    while let Some(pos) = xml[search_from..].find(&open) {
        let start = search_from + pos;
        let Some(end_pos) = xml[start..].find(&close) else {
            break;
        };
        let end = start + end_pos + close.len();
        blocks.push(&xml[start..end]);
        search_from = end;
    }
    blocks
}

/// Every self-closing or open tag `<tag ...>` as raw text.
fn extract_tags<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{} ", tag);
    let mut tags = Vec::new();
    let mut search_from = 0;

    while let Some(pos) = xml[search_from..].find(&open) {
        let start = search_from + pos;
        let Some(end_pos) = xml[start..].find('>') else {
            break;
        };
        let end = start + end_pos + 1;
        tags.push(&xml[start..end]);
        search_from = end;
    }
    tags
}

fn parse_entry(entry: &str) -> Option<Paper> {
    let id_url = extract_tag_text(entry, "id")?;
    let id = extract_arxiv_id_from_url(&id_url);
    let title = normalize_whitespace(&decode_entities(&extract_tag_text(entry, "title")?));

    let authors = extract_blocks(entry, "author")
        .into_iter()
        .filter_map(|block| extract_tag_text(block, "name"))
        .map(|name| decode_entities(&name))
        .collect();

    let summary = normalize_whitespace(&decode_entities(
        &extract_tag_text(entry, "summary").unwrap_or_default(),
    ));
    let published = extract_tag_text(entry, "published")
        .map(|p| normalize_date(&p))
        .unwrap_or_default();

    let categories = extract_tags(entry, "category")
        .into_iter()
        .filter_map(|tag| extract_attribute(tag, "term"))
        .collect();

    let pdf_url = extract_tags(entry, "link")
        .into_iter()
        .find(|tag| {
            extract_attribute(tag, "title").as_deref() == Some("pdf")
                || extract_attribute(tag, "type").as_deref() == Some("application/pdf")
        })
        .and_then(|tag| extract_attribute(tag, "href"))
        .unwrap_or_else(|| format!("https://arxiv.org/pdf/{}", id));

    Some(
        Paper::new(id, title, summary)
            .with_authors(authors)
            .with_published(published)
            .with_url(pdf_url)
            .with_categories(categories),
    )
}

/// Text content of the first `<tag>text</tag>`.
fn extract_tag_text(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);

    let mut search_from = 0;
    loop {
        let start_pos = search_from + xml[search_from..].find(&open)?;
        let after_name = xml[start_pos + open.len()..].chars().next()?;
        // `<id` must not match `<idx>`.
        if after_name == '>' || after_name.is_whitespace() {
            let content_start = xml[start_pos..].find('>')? + start_pos + 1;
            let content_end = xml[content_start..].find(&close)? + content_start;
            return Some(xml[content_start..content_end].trim().to_string());
        }
        search_from = start_pos + open.len();
    }
}

/// Attribute value from a raw tag string.
pub fn extract_attribute(tag: &str, attr: &str) -> Option<String> {
    let search = format!(" {}=\"", attr);
    let start = tag.find(&search)? + search.len();
    let end = tag[start..].find('"')? + start;
    Some(decode_entities(&tag[start..end]))
}

/// The arXiv ID from a URL like "http://arxiv.org/abs/1706.03762v7".
pub fn extract_arxiv_id_from_url(url: &str) -> String {
    if let Some(pos) = url.rfind("/abs/") {
        url[pos + 5..].to_string()
    } else if let Some(pos) = url.rfind("/pdf/") {
        url[pos + 5..].trim_end_matches(".pdf").to_string()
    } else {
        url.to_string()
    }
}

pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// `YYYY-MM-DD` from an Atom timestamp; malformed values keep their date prefix.
fn normalize_date(raw: &str) -> String {
    let raw = raw.trim();
    match chrono::DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts.date_naive().format("%Y-%m-%d").to_string(),
        Err(_) => raw.chars().take(10).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom"
      xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/"
      xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title>ArXiv Query</title>
  <opensearch:totalResults>2</opensearch:totalResults>
  <opensearch:startIndex>0</opensearch:startIndex>
  <entry>
    <id>http://arxiv.org/abs/2101.00001v2</id>
    <published>2021-01-04T17:57:34Z</published>
    <title>Sleep Deprivation and
      Memory Consolidation</title>
    <summary>We study sleep &amp; memory in a randomized controlled trial.</summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name></author>
    <link href="http://arxiv.org/abs/2101.00001v2" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2101.00001v2" rel="related" type="application/pdf"/>
    <arxiv:primary_category xmlns:arxiv="http://arxiv.org/schemas/atom" term="q-bio.NC"/>
    <category term="q-bio.NC" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/1905.12345v1</id>
    <published>2019-05-30T00:00:00Z</published>
    <title>Napping in Shift Workers</title>
    <summary>An observational study.</summary>
    <author><name>Grace Hopper</name></author>
  </entry>
</feed>"#;

    fn page(ids: &[&str], total: usize) -> AtomPage {
        AtomPage {
            papers: ids.iter().map(|id| Paper::new(*id, "T", "A")).collect(),
            total_results: total,
        }
    }

    #[test]
    fn test_parse_feed() {
        let page = parse_atom_response(SAMPLE_FEED).unwrap();
        assert_eq!(page.total_results, 2);
        assert_eq!(page.papers.len(), 2);

        let first = &page.papers[0];
        assert_eq!(first.id, "2101.00001v2");
        assert_eq!(first.title, "Sleep Deprivation and Memory Consolidation");
        assert_eq!(first.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(
            first.abstract_text,
            "We study sleep & memory in a randomized controlled trial."
        );
        assert_eq!(first.published, "2021-01-04");
        assert_eq!(first.url, "http://arxiv.org/pdf/2101.00001v2");
        assert_eq!(first.categories, vec!["q-bio.NC", "cs.LG"]);
    }

    #[test]
    fn test_missing_pdf_link_is_derived() {
        let page = parse_atom_response(SAMPLE_FEED).unwrap();
        assert_eq!(page.papers[1].url, "https://arxiv.org/pdf/1905.12345v1");
        assert!(page.papers[1].categories.is_empty());
    }

    #[test]
    fn test_feed_title_is_not_an_entry() {
        let page = parse_atom_response("<feed><title>ArXiv Query</title></feed>").unwrap();
        assert!(page.papers.is_empty());
        assert_eq!(page.total_results, 0);
    }

    #[test]
    fn test_non_feed_is_parse_error() {
        let err = parse_atom_response("<html>rate limited</html>").unwrap_err();
        assert!(matches!(err, SearchError::Parse { .. }));
    }

    #[test]
    fn test_build_query() {
        let keywords = vec![
            "sleep".to_string(),
            " \"memory\" ".to_string(),
            "  ".to_string(),
        ];
        assert_eq!(
            build_query(&keywords).unwrap(),
            r#"all:"sleep" OR all:"memory""#
        );
        assert!(matches!(
            build_query(&["\"\"".to_string()]),
            Err(SearchError::NoKeywords)
        ));
    }

    #[test]
    fn test_build_search_url() {
        let url = build_search_url(ARXIV_API_BASE, r#"all:"sleep""#, 50, 25);
        assert!(
            url.starts_with("http://export.arxiv.org/api/query?search_query=all%3A%22sleep%22")
        );
        assert!(url.contains("&start=50&max_results=25"));
        assert!(url.contains("sortBy=relevance"));
    }

    #[test]
    fn test_extract_arxiv_id_from_url() {
        assert_eq!(extract_arxiv_id_from_url("http://arxiv.org/abs/1706.03762v7"), "1706.03762v7");
        assert_eq!(extract_arxiv_id_from_url("https://arxiv.org/pdf/1706.03762.pdf"), "1706.03762");
        assert_eq!(extract_arxiv_id_from_url("1706.03762"), "1706.03762");
    }

    #[tokio::test]
    async fn test_collect_pages_until_max() {
        let papers = collect_pages(3, 2, |start, count| async move {
            let ids: Vec<String> = (start..start + count).map(|i| format!("p{i}")).collect();
            let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            Ok(page(&refs, 100))
        })
        .await
        .unwrap();
        let ids: Vec<_> = papers.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p0", "p1", "p2"]);
    }

    #[tokio::test]
    async fn test_collect_pages_stops_at_total() {
        let mut calls = 0;
        let papers = collect_pages(10, 2, |_, _| {
            calls += 1;
            async { Ok(page(&["only"], 1)) }
        })
        .await
        .unwrap();
        assert_eq!(papers.len(), 1);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_collect_pages_keeps_partial_results() {
        let papers = collect_pages(4, 2, |start, _| async move {
            if start == 0 {
                Ok(page(&["a", "b"], 10))
            } else {
                Err(SearchError::Request {
                    message: "503".into(),
                })
            }
        })
        .await
        .unwrap();
        assert_eq!(papers.len(), 2);
    }

    #[tokio::test]
    async fn test_collect_pages_error_without_results() {
        let err = collect_pages(4, 2, |_, _| async {
            Err(SearchError::Request {
                message: "down".into(),
            })
        })
        .await
        .unwrap_err();
        assert!(matches!(err, SearchError::Request { .. }));
    }

    #[test]
    fn test_normalize_date() {
        assert_eq!(normalize_date("2021-01-04T17:57:34Z"), "2021-01-04");
        assert_eq!(normalize_date("2021-01-04T23:30:00-02:00"), "2021-01-04");
        assert_eq!(normalize_date("2020-12"), "2020-12");
    }
}
