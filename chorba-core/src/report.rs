// Report rendering for crawls and extracted recipes

use crate::crawl::{extract_url_path, generate_crawl_report};
use crate::harvest::HarvestResult;
use crate::model::Recipe;
use chorba_scanner::result::CrawlResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Markdown,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            other => Err(format!("unknown report format: {}", other)),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportFormat::Text => "text",
            ReportFormat::Json => "json",
            ReportFormat::Markdown => "markdown",
        })
    }
}

/// Serializable view of a crawl, with any extracted recipes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlReport {
    pub sites: Vec<CrawlResult>,
    pub total_recipe_urls: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipes: Vec<HarvestResult>,
}

impl CrawlReport {
    pub fn new(sites: Vec<CrawlResult>, recipes: Vec<HarvestResult>) -> Self {
        let total_recipe_urls = sites.iter().map(|s| s.urls.len()).sum();
        Self {
            sites,
            total_recipe_urls,
            recipes,
        }
    }
}

pub fn render_crawl_report(
    report: &CrawlReport,
    format: ReportFormat,
) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Json => serde_json::to_string_pretty(report),
        ReportFormat::Text => {
            let mut out = generate_crawl_report(&report.sites);
            if !report.recipes.is_empty() {
                out.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
                for harvested in &report.recipes {
                    out.push_str(&render_harvest_text(harvested));
                    out.push('\n');
                }
            }
            Ok(out)
        }
        ReportFormat::Markdown => Ok(generate_markdown_report(report)),
    }
}

fn render_harvest_text(harvested: &HarvestResult) -> String {
    match (&harvested.recipe, &harvested.error) {
        (Some(recipe), _) => format!("{}\n{}", harvested.url, recipe_text(recipe)),
        (None, Some(error)) => format!("{}\n  extraction failed: {}\n", harvested.url, error),
        (None, None) => format!("{}\n  no recipe markup found\n", harvested.url),
    }
}

fn generate_markdown_report(report: &CrawlReport) -> String {
    let mut md = String::new();
    md.push_str("# Recipe Crawl Report\n\n");
    md.push_str("| Site | Recipe URLs | Sitemaps fetched | Failed | Truncated |\n");
    md.push_str("|------|-------------|------------------|--------|-----------|\n");
    for site in &report.sites {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            site.root,
            site.urls.len(),
            site.sitemaps_fetched,
            site.sitemaps_failed,
            site.truncated
        ));
    }
    md.push_str(&format!(
        "\n**Total recipe URLs:** {}\n\n",
        report.total_recipe_urls
    ));

    for site in &report.sites {
        if site.urls.is_empty() {
            continue;
        }
        md.push_str(&format!(
            "## {}\n\n",
            site.host().unwrap_or_else(|| site.root.clone())
        ));
        for url in &site.urls {
            md.push_str(&format!("- [{}]({})\n", extract_url_path(url), url));
        }
        md.push('\n');
    }

    let recipes: Vec<&Recipe> = report
        .recipes
        .iter()
        .filter_map(|h| h.recipe.as_ref())
        .collect();
    if !recipes.is_empty() {
        md.push_str("## Recipes\n\n");
        for recipe in recipes {
            md.push_str(&recipe_markdown(recipe, "###"));
        }
    }

    md
}

/// Render a single recipe.
pub fn render_recipe(recipe: &Recipe, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Json => serde_json::to_string_pretty(recipe),
        ReportFormat::Text => Ok(recipe_text(recipe)),
        ReportFormat::Markdown => Ok(recipe_markdown(recipe, "#")),
    }
}

fn recipe_text(recipe: &Recipe) -> String {
    let mut out = String::new();
    out.push_str(&format!("  {}\n", recipe.title));
    out.push_str(&format!("  {}\n\n", "─".repeat(recipe.title.chars().count().max(1))));

    out.push_str("  Ingredients:\n");
    for ingredient in &recipe.ingredients {
        out.push_str(&format!("    • {}\n", ingredient.name));
    }

    out.push_str("\n  Directions:\n");
    for line in &recipe.directions {
        out.push_str(&format!("    {}\n", line));
    }
    out
}

fn recipe_markdown(recipe: &Recipe, heading: &str) -> String {
    let mut md = String::new();
    md.push_str(&format!("{} {}\n\n", heading, recipe.title));

    md.push_str(&format!("{}# Ingredients\n\n", heading));
    for ingredient in &recipe.ingredients {
        md.push_str(&format!("- {}\n", ingredient.name));
    }

    md.push_str(&format!("\n{}# Directions\n\n", heading));
    for line in &recipe.directions {
        // Section steps keep their indent and nest under the header item
        if line.starts_with(' ') {
            md.push_str(&format!("{}\n", line));
        } else {
            md.push_str(&format!("- {}\n", line));
        }
    }
    md.push('\n');
    md
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
