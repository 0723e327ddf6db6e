//! robots.txt sitemap discovery.

use url::Url;

pub const ROBOTS_PATH: &str = "/robots.txt";

/// The parts of a robots.txt the crawler cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsTxt {
    /// `Sitemap:` entries in file order
    sitemaps: Vec<String>,
}

impl RobotsTxt {
    pub fn parse(content: &str) -> Self {
        let mut robots = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((directive, value)) = line.split_once(':')
                && directive.trim().eq_ignore_ascii_case("sitemap")
            {
                // Trailing comments are allowed on any directive
                let value = value.split('#').next().unwrap_or_default().trim();
                if !value.is_empty() {
                    robots.sitemaps.push(value.to_string());
                }
            }
        }

        robots
    }

    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }

    /// Pick the sitemap to crawl for `site`.
    ///
    /// A site given with a path prefers a sitemap under that path. Otherwise
    /// the conventional `/sitemap.xml` wins, then the first one listed.
    pub fn sitemap_for(&self, site: &str) -> Option<&str> {
        let has_path = Url::parse(site)
            .map(|url| !url.path().is_empty() && url.path() != "/")
            .unwrap_or(false);

        if has_path
            && let Some(found) = self.sitemaps.iter().find(|sm| sm.starts_with(site))
        {
            return Some(found);
        }

        self.sitemaps
            .iter()
            .find(|sm| {
                Url::parse(sm)
                    .map(|url| url.path() == "/sitemap.xml")
                    .unwrap_or(false)
            })
            .or_else(|| self.sitemaps.first())
            .map(String::as_str)
    }
}

/// robots.txt location for the origin of `site`.
pub fn robots_url_for(site: &Url) -> Option<String> {
    site.join(ROBOTS_PATH).ok().map(|url| url.to_string())
}
