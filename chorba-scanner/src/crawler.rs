use crate::error::{Result, ScanError};
use crate::fetch::{DEFAULT_TIMEOUT, Fetch, FetchRequest};
use crate::policy::{HostPolicy, HostPolicyRegistry};
use crate::result::CrawlResult;
use crate::robots::{RobotsTxt, robots_url_for};
use crate::sitemap::{SitemapEntry, parse_sitemap};
use futures::future::{BoxFuture, join_all};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_MAX_DEPTH: usize = 3;
pub const DEFAULT_SITEMAP_PATH: &str = "/sitemap.xml";

/// Root sitemap URL for a site without consulting robots.txt. A bare host
/// (empty or `/` path) gets `/sitemap.xml`; anything else is taken as the
/// sitemap itself.
pub fn sitemap_url_for(site: &str) -> Result<String> {
    let mut url = parse_site(site)?;
    if is_bare_host(&url) {
        url.set_path(DEFAULT_SITEMAP_PATH);
    }
    Ok(url.to_string())
}

fn parse_site(site: &str) -> Result<Url> {
    let url = Url::parse(site).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", site, e)))?;
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(ScanError::InvalidUrl(format!("{}: no host", site)));
    }
    Ok(url)
}

fn is_bare_host(url: &Url) -> bool {
    url.path().is_empty() || url.path() == "/"
}

/// Called with `(depth, sitemap_url)` before each sitemap fetch.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// One pending sitemap fetch. Tasks at the depth limit are terminal.
#[derive(Debug, Clone)]
pub struct CrawlTask {
    pub url: Url,
    pub depth: usize,
}

impl CrawlTask {
    fn child(&self, url: Url) -> Self {
        Self {
            url,
            depth: self.depth + 1,
        }
    }
}

/// Depth-bounded recursive sitemap crawler.
///
/// Sibling sitemaps at one level are fetched concurrently and joined before
/// the level returns. A failed fetch drops only that subtree.
pub struct SitemapCrawler {
    fetcher: Arc<dyn Fetch>,
    registry: Arc<HostPolicyRegistry>,
    max_depth: usize,
    timeout: Duration,
    user_agent: Option<String>,
    progress_callback: Option<ProgressCallback>,
}

impl SitemapCrawler {
    pub fn new(fetcher: Arc<dyn Fetch>, registry: Arc<HostPolicyRegistry>) -> Self {
        Self {
            fetcher,
            registry,
            max_depth: DEFAULT_MAX_DEPTH,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            progress_callback: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
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

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn registry(&self) -> &HostPolicyRegistry {
        &self.registry
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Root sitemap URL for `site`.
    ///
    /// A bare host is looked up in its robots.txt `Sitemap:` entries, falling
    /// back to `/sitemap.xml` when robots.txt is missing or lists none. A URL
    /// with a path is taken as the sitemap itself. Only a malformed site is
    /// an error.
    pub async fn discover_sitemap(&self, site: &str) -> Result<String> {
        let url = parse_site(site)?;
        if !is_bare_host(&url) {
            return Ok(url.to_string());
        }

        match self.fetch_robots(&url).await {
            Ok(robots) => {
                if let Some(sitemap) = robots.sitemap_for(site) {
                    debug!("robots.txt for {} lists sitemap {}", site, sitemap);
                    return Ok(sitemap.to_string());
                }
                debug!("robots.txt for {} lists no sitemaps", site);
            }
            Err(e) => debug!("No usable robots.txt for {}: {}", site, e),
        }

        sitemap_url_for(site)
    }

    async fn fetch_robots(&self, site: &Url) -> Result<RobotsTxt> {
        let robots_url = robots_url_for(site)
            .ok_or_else(|| ScanError::InvalidUrl(format!("{}: no robots.txt location", site)))?;
        let request = FetchRequest::text(self.timeout, self.user_agent.clone());
        let response = tokio::time::timeout(self.timeout, self.fetcher.fetch(&robots_url, &request))
            .await
            .map_err(|_| ScanError::Timeout {
                url: robots_url.clone(),
                timeout: self.timeout,
            })??;

        Ok(RobotsTxt::parse(&response.error_for_status()?.text()?))
    }

    /// Recipe URLs reachable from `root_url`, filtered by `policy` at the
    /// root and by each child sitemap's own resolved policy below it.
    pub async fn crawl(&self, root_url: &str, policy: &HostPolicy) -> Result<Vec<String>> {
        Ok(self.crawl_detailed(root_url, policy).await?.urls)
    }

    /// Like [`crawl`](Self::crawl), resolving the root policy from the registry.
    pub async fn crawl_site(&self, root_url: &str) -> Result<CrawlResult> {
        let policy = self.registry.resolve(root_url);
        self.crawl_detailed(root_url, &policy).await
    }

    pub async fn crawl_detailed(&self, root_url: &str, policy: &HostPolicy) -> Result<CrawlResult> {
        let url = Url::parse(root_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", root_url, e)))?;

        info!(
            "Starting sitemap crawl of {} (policy: {}, max depth: {})",
            url,
            policy.host(),
            self.max_depth
        );

        let mut result = self
            .process_sitemap(CrawlTask { url, depth: 0 }, policy)
            .await;
        result.root = root_url.to_string();

        info!(
            "Sitemap crawl of {} complete: {} recipe URLs from {} sitemaps ({} failed, {} truncated)",
            root_url,
            result.urls.len(),
            result.sitemaps_fetched,
            result.sitemaps_failed,
            result.truncated
        );
        Ok(result)
    }

    fn process_sitemap<'a>(
        &'a self,
        task: CrawlTask,
        policy: &'a HostPolicy,
    ) -> BoxFuture<'a, CrawlResult> {
        Box::pin(async move {
            let mut result = CrawlResult::new(task.url.to_string());

            if task.depth >= self.max_depth {
                let limit = ScanError::DepthExceeded {
                    url: task.url.to_string(),
                    max_depth: self.max_depth,
                };
                warn!("{}", limit);
                result.truncated = 1;
                return result;
            }

            if let Some(ref callback) = self.progress_callback {
                callback(task.depth, task.url.to_string());
            }

            let xml = match self.fetch_xml(&task.url).await {
                Ok(xml) => xml,
                Err(e) => {
                    warn!("Error fetching sitemap {}: {}", task.url, e);
                    result.sitemaps_failed = 1;
                    return result;
                }
            };
            result.sitemaps_fetched = 1;

            let (urls, children) = split_entries(parse_sitemap(&xml), &task, policy);
            debug!(
                "[depth {}] {}: {} recipe URLs, {} child sitemaps",
                task.depth,
                task.url,
                urls.len(),
                children.len()
            );
            result.urls = urls;

            let this = self;
            let child_crawls = children.into_iter().map(move |child| async move {
                let child_policy = this.registry.resolve(child.url.as_str());
                this.process_sitemap(child, &child_policy).await
            });

            for child_result in join_all(child_crawls).await {
                result.merge(child_result);
            }

            result
        })
    }

    async fn fetch_xml(&self, url: &Url) -> Result<String> {
        let request = FetchRequest::xml(self.timeout, self.user_agent.clone());
        let response = tokio::time::timeout(self.timeout, self.fetcher.fetch(url.as_str(), &request))
            .await
            .map_err(|_| ScanError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            })??;

        response.error_for_status()?.text()
    }
}

/// Split parsed entries into policy-accepted page URLs and child crawl tasks.
///
/// Child sitemap locations are resolved against the sitemap's own URL.
/// Page locations are returned exactly as advertised and must be absolute.
fn split_entries(
    entries: Vec<SitemapEntry>,
    task: &CrawlTask,
    policy: &HostPolicy,
) -> (Vec<String>, Vec<CrawlTask>) {
    let mut urls = Vec::new();
    let mut children = Vec::new();

    for entry in entries {
        match entry {
            SitemapEntry::Index(location) => match task.url.join(&location) {
                Ok(resolved) => children.push(task.child(resolved)),
                Err(e) => warn!(
                    "Skipping unresolvable sitemap {:?} in {}: {}",
                    location, task.url, e
                ),
            },
            SitemapEntry::Leaf(location) => {
                match location_path(&location).map(|path| policy.is_recipe_path(path)) {
                    Some(true) => urls.push(location),
                    Some(false) => {}
                    None => warn!(
                        "Skipping non-absolute page location {:?} in {}",
                        location, task.url
                    ),
                }
            }
        }
    }

    (urls, children)
}

/// Path of an absolute URL as written: no normalization or percent-encoding,
/// and empty when the location is just a scheme and host.
fn location_path(location: &str) -> Option<&str> {
    let url = Url::parse(location).ok()?;
    if url.cannot_be_a_base() {
        return None;
    }
    let after_scheme = location
        .split_once("://")
        .map_or(location, |(_, rest)| rest);
    let before_query = after_scheme
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    Some(before_query.find('/').map_or("", |i| &before_query[i..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::HttpFetcher;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn urlset(urls: &[String]) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#,
        );
        for url in urls {
            xml.push_str(&format!("<url><loc>{}</loc></url>", url));
        }
        xml.push_str("</urlset>");
        xml
    }

    fn sitemap_index(locs: &[&str]) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?><sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#,
        );
        for loc in locs {
            xml.push_str(&format!("<sitemap><loc>{}</loc></sitemap>", loc));
        }
        xml.push_str("</sitemapindex>");
        xml
    }

    async fn mount_xml(server: &MockServer, at: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/xml")
                    .set_body_bytes(body.into_bytes()),
            )
            .mount(server)
            .await;
    }

    fn crawler() -> SitemapCrawler {
        let mut registry = HostPolicyRegistry::empty();
        registry
            .register("127.0.0.1", r"^/recipe/[^/]+/?$")
            .unwrap();
        SitemapCrawler::new(Arc::new(HttpFetcher::new().unwrap()), Arc::new(registry))
    }

    /// Test leaf filtering against the host policy
    #[tokio::test]
    async fn test_leaf_urls_filtered_by_policy() {
        let mock_server = MockServer::start().await;
        let base = mock_server.uri();

        mount_xml(
            &mock_server,
            "/sitemap.xml",
            urlset(&[
                format!("{}/recipe/garlic-bread", base),
                format!("{}/recipes", base),
                format!("{}/recipe/pancakes/", base),
                format!("{}/about", base),
            ]),
        )
        .await;

        let crawler = crawler();
        let root = format!("{}/sitemap.xml", base);
        let result = crawler.crawl_site(&root).await.unwrap();

        assert_eq!(
            result.urls,
            vec![
                format!("{}/recipe/garlic-bread", base),
                format!("{}/recipe/pancakes/", base),
            ]
        );
        assert_eq!(result.sitemaps_fetched, 1);
        assert_eq!(result.sitemaps_failed, 0);
    }

    /// Test recursion through an index with relative child locations
    #[tokio::test]
    async fn test_nested_index_collects_all_children() {
        let mock_server = MockServer::start().await;
        let base = mock_server.uri();

        mount_xml(
            &mock_server,
            "/sitemap.xml",
            sitemap_index(&["/sitemaps/a.xml", "sitemaps/b.xml"]),
        )
        .await;
        mount_xml(
            &mock_server,
            "/sitemaps/a.xml",
            urlset(&[
                format!("{}/recipe/a1", base),
                format!("{}/recipe/a2", base),
            ]),
        )
        .await;
        mount_xml(
            &mock_server,
            "/sitemaps/b.xml",
            urlset(&[format!("{}/recipe/b1", base), format!("{}/tag/b", base)]),
        )
        .await;

        let crawler = crawler();
        let root = format!("{}/sitemap.xml", base);
        let result = crawler.crawl_site(&root).await.unwrap();

        let mut urls = result.urls.clone();
        urls.sort();
        assert_eq!(
            urls,
            vec![
                format!("{}/recipe/a1", base),
                format!("{}/recipe/a2", base),
                format!("{}/recipe/b1", base),
            ]
        );
        assert_eq!(result.sitemaps_fetched, 3);
    }

    /// Test that a failing child only drops its own subtree
    #[tokio::test]
    async fn test_failed_child_is_not_fatal() {
        let mock_server = MockServer::start().await;
        let base = mock_server.uri();

        mount_xml(
            &mock_server,
            "/sitemap.xml",
            sitemap_index(&["/ok.xml", "/missing.xml", "/broken.xml"]),
        )
        .await;
        mount_xml(
            &mock_server,
            "/ok.xml",
            urlset(&[format!("{}/recipe/ok", base)]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/missing.xml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;
        mount_xml(&mock_server, "/broken.xml", "<urlset><url><loc>".to_string()).await;

        let crawler = crawler();
        let root = format!("{}/sitemap.xml", base);
        let result = crawler.crawl_site(&root).await.unwrap();

        assert_eq!(result.urls, vec![format!("{}/recipe/ok", base)]);
        assert_eq!(result.sitemaps_failed, 1);
        // The malformed document was fetched; it just contributes nothing
        assert_eq!(result.sitemaps_fetched, 3);
    }

    /// Test that the depth bound truncates deeper sitemaps silently
    #[tokio::test]
    async fn test_depth_limit_truncates() {
        let mock_server = MockServer::start().await;
        let base = mock_server.uri();

        mount_xml(
            &mock_server,
            "/level0.xml",
            sitemap_index(&["/level1.xml"]),
        )
        .await;
        mount_xml(
            &mock_server,
            "/level1.xml",
            format!(
                r#"<root><sitemap><loc>/level2.xml</loc></sitemap><url><loc>{}/recipe/one</loc></url></root>"#,
                base
            ),
        )
        .await;
        mount_xml(
            &mock_server,
            "/level2.xml",
            urlset(&[format!("{}/recipe/two", base)]),
        )
        .await;

        let crawler = crawler().with_max_depth(2);
        let root = format!("{}/level0.xml", base);
        let result = crawler.crawl_site(&root).await.unwrap();

        assert_eq!(result.urls, vec![format!("{}/recipe/one", base)]);
        assert_eq!(result.sitemaps_fetched, 2);
        assert_eq!(result.truncated, 1);
    }

    /// Test transparent decompression of gzip sitemaps
    #[tokio::test]
    async fn test_gzip_sitemap() {
        let mock_server = MockServer::start().await;
        let base = mock_server.uri();

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(urlset(&[format!("{}/recipe/zipped", base)]).as_bytes())
            .unwrap();
        let gz = encoder.finish().unwrap();

        mount_xml(
            &mock_server,
            "/sitemap.xml",
            sitemap_index(&["/recipes.xml.gz"]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/recipes.xml.gz"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/x-gzip")
                    .set_body_bytes(gz),
            )
            .mount(&mock_server)
            .await;

        let crawler = crawler();
        let root = format!("{}/sitemap.xml", base);
        let urls = crawler
            .crawl(&root, &crawler.registry().resolve(&root))
            .await
            .unwrap();

        assert_eq!(urls, vec![format!("{}/recipe/zipped", base)]);
    }

    /// Test that a slow sitemap times out without failing the crawl
    #[tokio::test]
    async fn test_timeout_drops_subtree() {
        let mock_server = MockServer::start().await;
        let base = mock_server.uri();

        mount_xml(
            &mock_server,
            "/sitemap.xml",
            sitemap_index(&["/fast.xml", "/slow.xml"]),
        )
        .await;
        mount_xml(
            &mock_server,
            "/fast.xml",
            urlset(&[format!("{}/recipe/fast", base)]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/slow.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(urlset(&[format!("{}/recipe/slow", base)]).into_bytes())
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let crawler = crawler().with_timeout(Duration::from_millis(300));
        let root = format!("{}/sitemap.xml", base);
        let result = crawler.crawl_site(&root).await.unwrap();

        assert_eq!(result.urls, vec![format!("{}/recipe/fast", base)]);
        assert_eq!(result.sitemaps_failed, 1);
    }

    #[tokio::test]
    async fn test_invalid_root_url_is_fatal() {
        let crawler = crawler();
        let err = crawler.crawl_site("not a url").await.unwrap_err();
        assert!(matches!(err, ScanError::InvalidUrl(_)));
    }

    #[test]
    fn test_sitemap_url_for() {
        assert_eq!(
            sitemap_url_for("https://tasty.co").unwrap(),
            "https://tasty.co/sitemap.xml"
        );
        assert_eq!(
            sitemap_url_for("https://tasty.co/").unwrap(),
            "https://tasty.co/sitemap.xml"
        );
        assert_eq!(
            sitemap_url_for("https://tasty.co/sitemaps/recipes.xml").unwrap(),
            "https://tasty.co/sitemaps/recipes.xml"
        );
        assert!(sitemap_url_for("tasty.co").is_err());
        assert!(sitemap_url_for("mailto:chef@example.com").is_err());
    }

    #[test]
    fn test_split_entries_resolves_relative_sitemaps() {
        let task = CrawlTask {
            url: Url::parse("https://example.com/sitemaps/index.xml").unwrap(),
            depth: 1,
        };
        let policy = HostPolicy::match_all();
        let entries = vec![
            SitemapEntry::Index("child.xml".to_string()),
            SitemapEntry::Index("/root-child.xml".to_string()),
            SitemapEntry::Leaf("/recipe/x".to_string()),
            SitemapEntry::Leaf("https://example.com/recipe/y".to_string()),
        ];

        let (urls, children) = split_entries(entries, &task, &policy);

        // Relative page locations are not valid sitemap entries
        assert_eq!(urls, vec!["https://example.com/recipe/y"]);
        assert_eq!(children.len(), 2);
        assert_eq!(
            children[0].url.as_str(),
            "https://example.com/sitemaps/child.xml"
        );
        assert_eq!(children[1].url.as_str(), "https://example.com/root-child.xml");
        assert!(children.iter().all(|c| c.depth == 2));
    }

    #[test]
    fn test_split_entries_keeps_page_locations_verbatim() {
        let task = CrawlTask {
            url: Url::parse("https://example.com/sitemap.xml").unwrap(),
            depth: 0,
        };
        let entries = vec![
            SitemapEntry::Leaf("https://example.com".to_string()),
            SitemapEntry::Leaf("https://example.com/recipe/crème brûlée".to_string()),
            SitemapEntry::Leaf("https://example.com?page=2".to_string()),
        ];

        let (urls, children) = split_entries(entries, &task, &HostPolicy::match_all());

        assert_eq!(urls, vec!["https://example.com/recipe/crème brûlée"]);
        assert!(children.is_empty());
    }

    #[test]
    fn test_location_path() {
        assert_eq!(location_path("https://example.com"), Some(""));
        assert_eq!(location_path("https://example.com/"), Some("/"));
        assert_eq!(location_path("https://example.com#top"), Some(""));
        assert_eq!(
            location_path("https://example.com:8080/recipe/pie?x=1#method"),
            Some("/recipe/pie")
        );
        assert_eq!(
            location_path("https://example.com/recipe/crème brûlée"),
            Some("/recipe/crème brûlée")
        );
        assert_eq!(location_path("/recipe/pie"), None);
        assert_eq!(location_path("mailto:chef@example.com"), None);
    }
}
