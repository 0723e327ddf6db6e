use chorba_scanner::crawler::DEFAULT_MAX_DEPTH;
use chorba_scanner::fetch::{DEFAULT_TIMEOUT, Fetch};
use chorba_scanner::result::CrawlResult;
use chorba_scanner::{HostPolicyRegistry, Result, SitemapCrawler};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

/// Options for configuring a crawl operation
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub urls: Vec<String>,
    pub max_depth: usize,
    pub timeout: Duration,
    pub user_agent: Option<String>,
    /// Extra `(host, path regex)` policies layered over the built-in table
    pub host_patterns: Vec<(String, String)>,
    pub show_progress_bars: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            host_patterns: Vec::new(),
            show_progress_bars: false,
        }
    }
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Built-in host policies plus any configured overrides.
pub fn build_registry(host_patterns: &[(String, String)]) -> Result<HostPolicyRegistry> {
    let mut registry = HostPolicyRegistry::builtin()?;
    for (host, pattern) in host_patterns {
        registry.register(host, pattern)?;
    }
    Ok(registry)
}

/// Parse a `HOST=REGEX` pair as given on the command line.
pub fn parse_host_pattern(spec: &str) -> Option<(String, String)> {
    let (host, pattern) = spec.split_once('=')?;
    let host = host.trim();
    let pattern = pattern.trim();
    if host.is_empty() || pattern.is_empty() {
        return None;
    }
    Some((host.to_string(), pattern.to_string()))
}

/// Crawl each site's sitemap tree in turn.
///
/// A site that can't be crawled (bad URL) is reported through the progress
/// callback and skipped. Only an invalid host pattern fails the whole run.
pub async fn execute_crawl(
    options: CrawlOptions,
    fetcher: Arc<dyn Fetch>,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<Vec<CrawlResult>> {
    let CrawlOptions {
        urls,
        max_depth,
        timeout,
        user_agent,
        host_patterns,
        show_progress_bars,
    } = options;

    let registry = Arc::new(build_registry(&host_patterns)?);

    // Set up single spinner for overall crawl progress (only if enabled)
    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message("Starting crawl...");
        Some(Arc::new(pb))
    } else {
        None
    };

    let fetched_count = Arc::new(AtomicUsize::new(0));

    let mut crawler = SitemapCrawler::new(fetcher, registry)
        .with_max_depth(max_depth)
        .with_timeout(timeout)
        .with_user_agent(user_agent);

    if let Some(ref pb) = progress_bar {
        let pb_clone = pb.clone();
        let count_clone = fetched_count.clone();
        crawler = crawler.with_progress_callback(Arc::new(move |depth: usize, url: String| {
            let count = count_clone.fetch_add(1, Ordering::Relaxed) + 1;
            pb_clone.set_message(format!(
                "Reading sitemaps... {} fetched (depth {}: {})",
                count, depth, url
            ));
            pb_clone.tick();
        }));
    }

    let mut all_results = Vec::new();
    for (idx, url_str) in urls.iter().enumerate() {
        if let Some(ref callback) = progress_callback
            && urls.len() > 1
        {
            callback(format!(
                "Crawling site {}/{}: {}",
                idx + 1,
                urls.len(),
                url_str
            ));
        }

        let crawled = match crawler.discover_sitemap(url_str).await {
            Ok(sitemap_url) => crawler.crawl_site(&sitemap_url).await,
            Err(e) => Err(e),
        };

        match crawled {
            Ok(result) => all_results.push(result),
            Err(e) => {
                if let Some(ref callback) = progress_callback {
                    callback(format!("[!]  Failed to crawl {}: {}", url_str, e));
                }
            }
        }
    }

    if let Some(ref pb) = progress_bar {
        let total: usize = all_results.iter().map(|r| r.urls.len()).sum();
        pb.finish_with_message(format!(
            "Crawl complete! {} sitemaps read, {} recipe URLs found",
            fetched_count.load(Ordering::Relaxed),
            total
        ));
    }

    Ok(all_results)
}

/// Generate a crawl report from results
pub fn generate_crawl_report(results: &[CrawlResult]) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Sites crawled: {}\n", results.len()));

    let total_urls: usize = results.iter().map(|r| r.urls.len()).sum();
    report.push_str(&format!("  Recipe URLs found: {}\n", total_urls));

    let fetched: usize = results.iter().map(|r| r.sitemaps_fetched).sum();
    report.push_str(&format!("  Sitemaps fetched: {}\n", fetched));

    let failed: usize = results.iter().map(|r| r.sitemaps_failed).sum();
    report.push_str(&format!("  Sitemaps failed: {}\n", failed));

    let truncated: usize = results.iter().map(|r| r.truncated).sum();
    report.push_str(&format!("  Sitemaps beyond depth limit: {}\n", truncated));

    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    // Group recipe URLs by host, sorted for stable output
    let mut by_host: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for url in results.iter().flat_map(|r| r.urls.iter()) {
        if let Ok(parsed) = Url::parse(url)
            && let Some(host) = parsed.host_str()
        {
            by_host.entry(host.to_string()).or_default().push(url);
        }
    }

    for (host, urls) in by_host.iter() {
        report.push_str(&format!("## {}\n", host));
        report.push_str(&format!("  {} recipes found\n\n", urls.len()));

        for url in urls {
            report.push_str(&format!("  {}\n", extract_url_path(url)));
        }
        report.push('\n');
    }

    report
}
