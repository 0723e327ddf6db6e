// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

pub mod server;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    expand_path, load_urls_from_file, load_urls_from_source, parse_host_patterns,
    parse_url_line, recipes_to_extract,
};

// Re-export crawl functionality from chorba-core
pub use chorba_core::crawl::{
    CrawlOptions, CrawlProgressCallback, execute_crawl, extract_url_path, generate_crawl_report,
};
