use crate::detect::detect;
use crate::extract::{MarkupExtractor, Processor};
use crate::model::Recipe;
use chorba_scanner::fetch::{DEFAULT_TIMEOUT, Fetch, FetchRequest};
use chorba_scanner::{Result, ScanError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Fetches recipe pages and reads their structured markup.
pub struct RecipeScraper {
    fetcher: Arc<dyn Fetch>,
    extractor: MarkupExtractor,
    timeout: Duration,
    user_agent: Option<String>,
}

impl RecipeScraper {
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            fetcher,
            extractor: MarkupExtractor::new(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
        }
    }

    pub fn with_extractor(mut self, extractor: MarkupExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn extractor(&self) -> &MarkupExtractor {
        &self.extractor
    }

    /// Recipe from already-fetched HTML. `None` means no recipe markup.
    pub fn scrape(&self, html: &str) -> Option<Recipe> {
        self.scrape_with_syntax(html).map(|(_, recipe)| recipe)
    }

    pub fn scrape_with_syntax(&self, html: &str) -> Option<(Processor, Recipe)> {
        let data = detect(html);
        debug!(
            "Detected {} JSON-LD blocks, {} microdata items, {} RDFa nodes",
            data.json_ld.len(),
            data.microdata.len(),
            data.rdfa.len()
        );
        self.extractor.extract_with_syntax(&data)
    }

    /// Fetch `url` and extract its recipe.
    ///
    /// Network failures, timeouts and non-2xx responses are errors; a page
    /// without recipe markup is `Ok(None)`.
    pub async fn scrape_from_url(&self, url: &str) -> Result<Option<Recipe>> {
        Url::parse(url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", url, e)))?;

        let request = FetchRequest::html(self.timeout, self.user_agent.clone());
        let response = tokio::time::timeout(self.timeout, self.fetcher.fetch(url, &request))
            .await
            .map_err(|_| ScanError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            })??;
        let html = response.error_for_status()?.text()?;

        let recipe = self.scrape_with_syntax(&html);
        match &recipe {
            Some((processor, found)) => {
                info!("Extracted \"{}\" from {} via {}", found.title, url, processor)
            }
            None => info!("No recipe markup found at {}", url),
        }
        Ok(recipe.map(|(_, recipe)| recipe))
    }
}
