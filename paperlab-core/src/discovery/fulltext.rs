//! Full-text retrieval for arXiv papers.
//!
//! PDFs are downloaded and converted with the poppler `pdftotext` utility,
//! which must be on `PATH`. Every failure yields empty text so callers fall
//! back to the abstract.

use crate::config::SearchConfig;
use crate::paper::Paper;
use crate::providers::RateLimiter;
use async_trait::async_trait;
use futures::StreamExt;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const PDF_BASE_URL: &str = "https://arxiv.org/pdf";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const HYDRATE_CONCURRENCY: usize = 4;

#[async_trait]
pub trait FullTextFetcher: Send + Sync {
    /// Plain text of the paper, or "" when it cannot be retrieved.
    async fn fetch_text(&self, paper_id: &str) -> String;
}

pub struct ArxivPdfFetcher {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    max_pages: usize,
    max_chars: usize,
}

impl ArxivPdfFetcher {
    pub fn new(config: &SearchConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            limiter: Arc::new(RateLimiter::new(config.min_interval())),
            max_pages: config.fulltext_max_pages.max(1),
            max_chars: config.fulltext_max_chars,
        })
    }

    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    async fn download(&self, paper_id: &str) -> Result<Vec<u8>, String> {
        self.limiter.acquire().await;
        let url = pdf_url(paper_id);
        debug!(url = %url, "Downloading PDF");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("PDF request failed: {e}"))?;
        if !response.status().is_success() {
            return Err(format!("PDF request returned status {}", response.status()));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| format!("Failed to read PDF body: {e}"))?;
        Ok(bytes.to_vec())
    }

    async fn extract(&self, pdf: Vec<u8>) -> Result<String, String> {
        let mut child = tokio::process::Command::new("pdftotext")
            .args(["-q", "-enc", "UTF-8", "-f", "1", "-l"])
            .arg(self.max_pages.to_string())
            .args(["-", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("Failed to run pdftotext: {e}"))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| "pdftotext stdin unavailable".to_string())?;
        let writer = tokio::spawn(async move {
            let written = stdin.write_all(&pdf).await;
            drop(stdin);
            written
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| format!("pdftotext failed: {e}"))?;
        if let Ok(Err(e)) = writer.await {
            debug!(error = %e, "pdftotext closed its input early");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(format!("pdftotext exited with {}: {stderr}", output.status));
        }
        Ok(clean_text(&String::from_utf8_lossy(&output.stdout), self.max_chars))
    }
}

#[async_trait]
impl FullTextFetcher for ArxivPdfFetcher {
    async fn fetch_text(&self, paper_id: &str) -> String {
        let attempt = async {
            let pdf = self.download(paper_id).await?;
            self.extract(pdf).await
        };
        match tokio::time::timeout(DOWNLOAD_TIMEOUT * 2, attempt).await {
            Ok(Ok(text)) => {
                debug!(paper_id = %paper_id, chars = text.chars().count(), "Extracted full text");
                text
            }
            Ok(Err(e)) => {
                warn!(paper_id = %paper_id, error = %e, "Full text unavailable");
                String::new()
            }
            Err(_) => {
                warn!(paper_id = %paper_id, "Full text retrieval timed out");
                String::new()
            }
        }
    }
}

pub fn pdf_url(paper_id: &str) -> String {
    format!("{}/{}.pdf", PDF_BASE_URL, paper_id.trim())
}

/// Drop form feeds and blank-line runs, then cap at `max_chars` characters.
fn clean_text(raw: &str, max_chars: usize) -> String {
    let mut out = String::new();
    let mut blank_run = 0;
    for line in raw.replace('\u{c}', "\n").lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    crate::analysis::truncate_chars(out.trim(), max_chars).to_string()
}

/// Attach fetched full text to every paper whose text could be retrieved.
pub async fn hydrate_full_text(fetcher: &dyn FullTextFetcher, papers: Vec<Paper>) -> Vec<Paper> {
    futures::stream::iter(papers)
        .map(|paper| async move {
            if paper.usable_full_text().is_some() {
                return paper;
            }
            let text = fetcher.fetch_text(&paper.id).await;
            if text.trim().is_empty() {
                paper
            } else {
                paper.with_full_text(text)
            }
        })
        .buffered(HYDRATE_CONCURRENCY)
        .collect()
        .await
}
