use serde::{Deserialize, Serialize};

/// Outcome of crawling one sitemap tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlResult {
    pub root: String,
    /// Recipe page URLs that passed the host policy.
    pub urls: Vec<String>,
    pub sitemaps_fetched: usize,
    pub sitemaps_failed: usize,
    /// Sitemap references dropped because they sat at the depth limit.
    pub truncated: usize,
}

impl CrawlResult {
    pub fn new(root: String) -> Self {
        Self {
            root,
            ..Self::default()
        }
    }

    /// Fold a child subtree's outcome into this one.
    pub fn merge(&mut self, child: CrawlResult) {
        self.urls.extend(child.urls);
        self.sitemaps_fetched += child.sitemaps_fetched;
        self.sitemaps_failed += child.sitemaps_failed;
        self.truncated += child.truncated;
    }

    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.root)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
    }
}
