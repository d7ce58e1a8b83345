//! Paper discovery: keyword extraction, arXiv search, criteria filtering and
//! full-text retrieval.

pub mod arxiv;
pub mod criteria;
pub mod fulltext;
pub mod keywords;
pub mod service;

pub use arxiv::{ArxivClient, PaperSource};
pub use criteria::Criteria;
pub use fulltext::{ArxivPdfFetcher, FullTextFetcher, hydrate_full_text};
pub use keywords::{KeywordExtractor, LlmKeywordExtractor, fallback_keywords};
pub use service::{DiscoveryResult, DiscoveryService, clamp_max_papers};
