use crate::form::FormDescriptor;
use crate::resource::Resource;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-page record of one crawl fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub url: String,
    pub depth: usize,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub response_time: Duration,
    pub links_found: Vec<String>,
    pub forms_found: usize,
    pub error: Option<String>,
}

impl CrawlResult {
    pub fn new(url: String, depth: usize) -> Self {
        Self {
            url,
            depth,
            status_code: 0,
            content_type: None,
            response_time: Duration::from_secs(0),
            links_found: Vec::new(),
            forms_found: 0,
            error: None,
        }
    }

    pub fn with_error(url: String, depth: usize, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(url, depth)
        }
    }
}

/// What a finished crawl hands to the scan engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlOutput {
    /// In-scope URLs in discovery order, each fetched at most once.
    pub visited: Vec<Resource>,
    /// Distinct forms found on in-scope pages.
    pub forms: Vec<FormDescriptor>,
    pub pages: Vec<CrawlResult>,
    /// Set when the crawl stopped early on cancellation.
    pub cancelled: bool,
}

impl CrawlOutput {
    pub fn visited_urls(&self) -> Vec<String> {
        self.visited.iter().map(|r| r.as_str().to_string()).collect()
    }
}
