// Bounded-concurrency recipe extraction over crawled URLs

use crate::model::Recipe;
use crate::scrape::RecipeScraper;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::warn;

/// Outcome of extracting one page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestResult {
    pub url: String,
    pub recipe: Option<Recipe>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HarvestResult {
    pub fn is_success(&self) -> bool {
        self.recipe.is_some()
    }
}

/// Options for configuring a harvest operation
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    pub threads: usize,
    /// Pause after each request, per worker
    pub delay: Duration,
    pub show_progress_bars: bool,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            threads: 4,
            delay: Duration::ZERO,
            show_progress_bars: false,
        }
    }
}

/// Extract recipes from `urls`, at most `threads` at a time.
///
/// Results come back in input order. A failed page is recorded in its
/// result and never stops the rest.
pub async fn harvest_recipes(
    urls: Vec<String>,
    scraper: Arc<RecipeScraper>,
    options: HarvestOptions,
) -> Vec<HarvestResult> {
    let HarvestOptions {
        threads,
        delay,
        show_progress_bars,
    } = options;

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new(urls.len() as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("[{bar:40.cyan/blue}] Extracting {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        Some(pb)
    } else {
        None
    };

    // Create semaphore to limit concurrent requests
    let semaphore = Arc::new(Semaphore::new(threads.max(1)));

    let mut tasks = Vec::with_capacity(urls.len());
    for url in urls {
        let scraper = scraper.clone();
        let semaphore = semaphore.clone();
        let pb = progress_bar.clone();
        let task_url = url.clone();

        let handle = tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    return HarvestResult {
                        url,
                        recipe: None,
                        error: Some(e.to_string()),
                    };
                }
            };

            let result = match scraper.scrape_from_url(&url).await {
                Ok(recipe) => HarvestResult {
                    url,
                    recipe,
                    error: None,
                },
                Err(e) => {
                    warn!("Failed to extract {}: {}", url, e);
                    HarvestResult {
                        error: Some(e.to_string()),
                        url,
                        recipe: None,
                    }
                }
            };

            if let Some(pb) = pb {
                pb.inc(1);
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result
        });
        tasks.push((task_url, handle));
    }

    let mut results = Vec::with_capacity(tasks.len());
    for (url, task) in tasks {
        match task.await {
            Ok(result) => results.push(result),
            Err(e) => {
                warn!("Extraction task for {} failed: {}", url, e);
                results.push(HarvestResult {
                    url,
                    recipe: None,
                    error: Some(format!("extraction task failed: {}", e)),
                });
            }
        }
    }

    if let Some(pb) = progress_bar {
        let found = results.iter().filter(|r| r.is_success()).count();
        pb.finish_with_message(format!("done, {} recipes", found));
    }

    results
}
