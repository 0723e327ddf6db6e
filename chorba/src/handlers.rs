use crate::server;
use chorba_core::RecipeScraper;
use chorba_core::crawl::{
    CrawlOptions, CrawlProgressCallback, execute_crawl, parse_host_pattern,
};
use chorba_core::harvest::{HarvestOptions, harvest_recipes};
use chorba_core::report::{
    CrawlReport, ReportFormat, render_crawl_report, render_recipe, save_report,
};
use chorba_scanner::result::CrawlResult;
use chorba_scanner::{Fetch, HttpFetcher};
use clap::ArgMatches;
use colored::Colorize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

// Helper functions for crawl handler

/// Load URLs from either a file or a single URL argument
pub fn load_urls_from_source(
    url: Option<&Url>,
    hosts_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(hosts_file_path) = hosts_file {
        load_urls_from_file(hosts_file_path)
    } else if let Some(url) = url {
        Ok(vec![url.as_str().to_string()])
    } else {
        Err("Either --url or --hosts-file must be provided".to_string())
    }
}

/// Load and parse URLs from a file. Blank lines and `#` comments are skipped.
pub fn load_urls_from_file(path: &PathBuf) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read hosts file {}: {}", path.display(), e))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_url_line)
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as a URL, trying to add https:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    if let Ok(url) = Url::parse(line)
        && url.has_host()
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("https://{}", line);
    if Url::parse(&with_scheme).is_ok() {
        return Some(with_scheme);
    }

    eprintln!("⚠️  Skipping invalid URL '{}'", line);
    None
}

/// Expand `~` in a user supplied path
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Parse every `--host-pattern HOST=REGEX` value, failing on the first bad one
pub fn parse_host_patterns<'a, I>(specs: I) -> Result<Vec<(String, String)>, String>
where
    I: IntoIterator<Item = &'a String>,
{
    specs
        .into_iter()
        .map(|spec| {
            parse_host_pattern(spec)
                .ok_or_else(|| format!("Invalid host pattern '{}', expected HOST=REGEX", spec))
        })
        .collect()
}

/// The first `limit` recipe URLs across all crawled sites, in crawl order
pub fn recipes_to_extract(results: &[CrawlResult], limit: usize) -> Vec<String> {
    results
        .iter()
        .flat_map(|result| result.urls.iter().cloned())
        .take(limit)
        .collect()
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", "✗".red().bold(), msg);
    std::process::exit(1);
}

fn report_format(sub_matches: &ArgMatches) -> ReportFormat {
    sub_matches
        .get_one::<String>("format")
        .and_then(|f| f.parse().ok())
        .unwrap_or(ReportFormat::Text)
}

fn timeout(sub_matches: &ArgMatches) -> Duration {
    Duration::from_secs(*sub_matches.get_one::<u64>("timeout").unwrap_or(&10))
}

fn user_agent(sub_matches: &ArgMatches) -> Option<String> {
    sub_matches.get_one::<String>("user-agent").cloned()
}

fn fetcher() -> Arc<dyn Fetch> {
    match HttpFetcher::new() {
        Ok(fetcher) => Arc::new(fetcher),
        Err(e) => fail(format!("Failed to build HTTP client: {}", e)),
    }
}

fn emit(content: &str, output: Option<&PathBuf>) {
    match output {
        Some(path) => {
            if let Err(e) = save_report(content, path) {
                fail(format!("Failed to write report to {}: {}", path.display(), e));
            }
            println!(
                "{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{}", content),
    }
}

pub async fn handle_crawl(sub_matches: &ArgMatches, quiet: bool) {
    let url = sub_matches.get_one::<Url>("url");
    let hosts_file = sub_matches
        .get_one::<String>("hosts-file")
        .map(|raw| expand_path(raw));
    let max_depth = *sub_matches.get_one::<usize>("max-depth").unwrap_or(&3);
    let threads = *sub_matches.get_one::<usize>("threads").unwrap_or(&4);
    let delay = Duration::from_millis(*sub_matches.get_one::<u64>("delay-ms").unwrap_or(&0));
    let extract = sub_matches.get_one::<usize>("extract").copied();
    let format = report_format(sub_matches);
    let output = sub_matches.get_one::<PathBuf>("output");

    let urls = load_urls_from_source(url, hosts_file.as_ref()).unwrap_or_else(|e| fail(e));
    let host_patterns = parse_host_patterns(
        sub_matches
            .get_many::<String>("host-pattern")
            .into_iter()
            .flatten(),
    )
    .unwrap_or_else(|e| fail(e));

    if !quiet {
        println!("\n🍲 Crawling {} site(s)", urls.len());
        println!("Max depth: {}", max_depth);
        if let Some(count) = extract {
            println!("Extracting: first {} recipe(s), {} worker(s)", count, threads);
        }
        println!();
    }

    let options = CrawlOptions {
        urls,
        max_depth,
        timeout: timeout(sub_matches),
        user_agent: user_agent(sub_matches),
        host_patterns,
        show_progress_bars: !quiet,
    };

    let progress_callback: Option<CrawlProgressCallback> = if quiet {
        None
    } else {
        Some(Arc::new(|msg: String| {
            println!("{}", msg);
        }))
    };

    let fetcher = fetcher();
    let sites = match execute_crawl(options, fetcher.clone(), progress_callback).await {
        Ok(results) => results,
        Err(e) => fail(format!("Crawl failed: {}", e)),
    };

    if !quiet {
        println!("\n{} Crawl complete!\n", "✓".green().bold());
    }

    let recipes = match extract {
        Some(limit) if limit > 0 => {
            let targets = recipes_to_extract(&sites, limit);
            let scraper = Arc::new(
                RecipeScraper::new(fetcher)
                    .with_timeout(timeout(sub_matches))
                    .with_user_agent(user_agent(sub_matches)),
            );
            let options = HarvestOptions {
                threads,
                delay,
                show_progress_bars: !quiet,
            };
            harvest_recipes(targets, scraper, options).await
        }
        _ => Vec::new(),
    };

    let report = CrawlReport::new(sites, recipes);
    let rendered = render_crawl_report(&report, format)
        .unwrap_or_else(|e| fail(format!("Failed to render report: {}", e)));
    emit(&rendered, output);
}

pub async fn handle_recipe(sub_matches: &ArgMatches, quiet: bool) {
    let url = sub_matches.get_one::<Url>("url");
    let file = sub_matches.get_one::<String>("file").map(|raw| expand_path(raw));
    let format = report_format(sub_matches);

    let scraper = RecipeScraper::new(fetcher())
        .with_timeout(timeout(sub_matches))
        .with_user_agent(user_agent(sub_matches));

    let (source, recipe) = match (url, file) {
        (_, Some(path)) => {
            let html = read_html_file(&path).unwrap_or_else(|e| fail(e));
            (path.display().to_string(), scraper.scrape(&html))
        }
        (Some(url), None) => match scraper.scrape_from_url(url.as_str()).await {
            Ok(recipe) => (url.to_string(), recipe),
            Err(e) => fail(format!("Failed to fetch {}: {}", url, e)),
        },
        (None, None) => fail("Either --url or --file must be provided"),
    };

    let Some(recipe) = recipe else {
        fail(format!("No recipe markup found in {}", source));
    };

    if !quiet && format == ReportFormat::Text {
        print_divider();
        println!("  {}", source.bright_white());
        print_divider();
    }

    let rendered =
        render_recipe(&recipe, format).unwrap_or_else(|e| fail(format!("Failed to render: {}", e)));
    print!("{}", rendered);
}

pub async fn handle_serve(sub_matches: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    let bind = sub_matches
        .get_one::<SocketAddr>("bind")
        .copied()
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8000)));

    let scraper = RecipeScraper::new(Arc::new(HttpFetcher::new()?))
        .with_timeout(timeout(sub_matches))
        .with_user_agent(user_agent(sub_matches));

    if !quiet {
        println!(
            "{} Serving recipe extraction on http://{}",
            "→".blue(),
            bind.to_string().bright_white()
        );
    }

    server::serve(bind, Arc::new(scraper)).await
}

/// Read a saved page from disk
pub fn read_html_file(path: &Path) -> Result<String, String> {
    fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))
}
