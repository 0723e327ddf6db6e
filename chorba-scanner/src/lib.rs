pub mod crawler;
pub mod error;
pub mod fetch;
pub mod policy;
pub mod result;
pub mod robots;
pub mod sitemap;

pub use crawler::{ProgressCallback, SitemapCrawler, sitemap_url_for};
pub use error::{Result, ScanError};
pub use fetch::{Fetch, FetchRequest, FetchResponse, HttpFetcher};
pub use policy::{BUILTIN_HOST_PATTERNS, HostPolicy, HostPolicyRegistry};
pub use result::CrawlResult;
pub use robots::RobotsTxt;
pub use sitemap::{SitemapEntry, parse_sitemap};
