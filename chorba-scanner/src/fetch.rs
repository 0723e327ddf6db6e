use crate::error::{Result, ScanError};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use std::io::Read;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_USER_AGENT: &str = "Chorba/0.1 (+https://github.com/chorba/chorba)";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub const ACCEPT_XML: &str = "application/xml, text/xml";
pub const ACCEPT_HTML: &str = "text/html,application/xhtml+xml";
pub const ACCEPT_TEXT: &str = "text/plain";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Per-request settings handed to a [`Fetch`] implementation.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub accept: &'static str,
    pub user_agent: Option<String>,
    pub timeout: Duration,
}

impl FetchRequest {
    pub fn xml(timeout: Duration, user_agent: Option<String>) -> Self {
        Self {
            accept: ACCEPT_XML,
            user_agent,
            timeout,
        }
    }

    pub fn html(timeout: Duration, user_agent: Option<String>) -> Self {
        Self {
            accept: ACCEPT_HTML,
            user_agent,
            timeout,
        }
    }

    pub fn text(timeout: Duration, user_agent: Option<String>) -> Self {
        Self {
            accept: ACCEPT_TEXT,
            user_agent,
            timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Fails with [`ScanError::HttpStatus`] on a non-2xx status.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ScanError::HttpStatus {
                url: self.url,
                status: self.status,
            })
        }
    }

    /// Whether the content type or URL names a gzip payload.
    pub fn declares_gzip(&self) -> bool {
        let gzip_content_type = self
            .content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("gzip"))
            .unwrap_or(false);

        gzip_content_type || self.url.ends_with(".gz")
    }

    /// Body as text, gunzipping first when the body is a gzip stream.
    pub fn text(&self) -> Result<String> {
        let gzipped = self.body.starts_with(&GZIP_MAGIC);
        if self.declares_gzip() && !gzipped {
            debug!("{} declared gzip but arrived decoded", self.url);
        }

        if gzipped {
            let mut decoder = GzDecoder::new(self.body.as_slice());
            let mut raw = Vec::new();
            decoder.read_to_end(&mut raw)?;
            debug!(
                "Decompressed {} -> {} bytes from {}",
                self.body.len(),
                raw.len(),
                self.url
            );
            return Ok(String::from_utf8_lossy(&raw).into_owned());
        }
        Ok(String::from_utf8_lossy(&self.body).into_owned())
    }
}

/// Narrow HTTP contract the crawler and scraper depend on.
///
/// Network failures and timeouts are errors; HTTP error statuses are not.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str, request: &FetchRequest) -> Result<FetchResponse>;
}

/// [`Fetch`] implementation over a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str, request: &FetchRequest) -> Result<FetchResponse> {
        debug!("Fetching {}", url);

        let mut builder = self
            .client
            .get(url)
            .timeout(request.timeout)
            .header(ACCEPT, request.accept);
        if let Some(ref user_agent) = request.user_agent {
            builder = builder.header(USER_AGENT, user_agent);
        }

        let timed_out = |e: reqwest::Error| {
            if e.is_timeout() {
                ScanError::Timeout {
                    url: url.to_string(),
                    timeout: request.timeout,
                }
            } else {
                ScanError::HttpError(e)
            }
        };

        let response = builder.send().await.map_err(timed_out)?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.bytes().await.map_err(timed_out)?.to_vec();

        Ok(FetchResponse {
            url: url.to_string(),
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, header_exists, method, path},
    };

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn response(url: &str, content_type: Option<&str>, body: Vec<u8>) -> FetchResponse {
        FetchResponse {
            url: url.to_string(),
            status: 200,
            content_type: content_type.map(String::from),
            body,
        }
    }

    #[test]
    fn test_text_plain_body() {
        let resp = response("http://x/sitemap.xml", Some("text/xml"), b"<urlset/>".to_vec());
        assert_eq!(resp.text().unwrap(), "<urlset/>");
    }

    #[test]
    fn test_text_gzip_content_type() {
        let resp = response(
            "http://x/sitemap",
            Some("application/x-gzip"),
            gzip(b"<urlset/>"),
        );
        assert_eq!(resp.text().unwrap(), "<urlset/>");
    }

    #[test]
    fn test_text_gzip_magic_without_header() {
        let resp = response("http://x/sitemap.xml.gz", None, gzip(b"<sitemapindex/>"));
        assert_eq!(resp.text().unwrap(), "<sitemapindex/>");
    }

    #[test]
    fn test_text_gz_url_with_plain_body() {
        // Already decoded by the transport despite the .gz name
        let resp = response("http://x/sitemap.xml.gz", Some("text/xml"), b"<urlset/>".to_vec());
        assert_eq!(resp.text().unwrap(), "<urlset/>");
    }

    #[test]
    fn test_declares_gzip() {
        assert!(response("http://x/s", Some("application/gzip"), Vec::new()).declares_gzip());
        assert!(response("http://x/s.xml.gz", None, Vec::new()).declares_gzip());
        assert!(!response("http://x/s.xml", Some("text/xml"), Vec::new()).declares_gzip());
    }

    #[test]
    fn test_error_for_status() {
        let mut resp = response("http://x/a", None, Vec::new());
        resp.status = 404;
        let err = resp.error_for_status().unwrap_err();
        assert!(matches!(err, ScanError::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_http_fetcher_sends_headers() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .and(header_exists("accept"))
            .and(header("user-agent", "test-agent"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/xml")
                    .set_body_bytes(b"<urlset/>".to_vec()),
            )
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let url = format!("{}/sitemap.xml", mock_server.uri());
        let resp = fetcher
            .fetch(
                &url,
                &FetchRequest::xml(DEFAULT_TIMEOUT, Some("test-agent".to_string())),
            )
            .await
            .unwrap();

        assert_eq!(resp.status, 200);
        assert_eq!(resp.content_type.as_deref(), Some("application/xml"));
        assert_eq!(resp.text().unwrap(), "<urlset/>");
    }

    #[tokio::test]
    async fn test_http_fetcher_reports_status_as_data() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.xml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let url = format!("{}/missing.xml", mock_server.uri());
        let resp = fetcher
            .fetch(&url, &FetchRequest::xml(DEFAULT_TIMEOUT, None))
            .await
            .unwrap();
        assert_eq!(resp.status, 404);
        assert!(!resp.is_success());
    }

    #[tokio::test]
    async fn test_http_fetcher_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"<urlset/>".to_vec())
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let url = format!("{}/slow.xml", mock_server.uri());
        let err = fetcher
            .fetch(&url, &FetchRequest::xml(Duration::from_millis(50), None))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Timeout { .. }), "{:?}", err);
    }
}
