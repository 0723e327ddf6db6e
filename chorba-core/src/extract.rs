use crate::detect::{StructuredData, detect};
use crate::model::Recipe;
use crate::normalize::normalize_recipe;
use crate::{jsonld, microdata, rdfa};
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

/// One markup syntax a recipe can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Processor {
    JsonLd,
    Microdata,
    Rdfa,
}

impl Processor {
    /// Default priority order.
    pub const ALL: [Processor; 3] = [Processor::JsonLd, Processor::Microdata, Processor::Rdfa];

    pub fn syntax_name(self) -> &'static str {
        match self {
            Processor::JsonLd => "json-ld",
            Processor::Microdata => "microdata",
            Processor::Rdfa => "rdfa",
        }
    }

    pub fn from_syntax_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.syntax_name().eq_ignore_ascii_case(name))
    }

    /// Whether the page carries any data in this syntax.
    pub fn has_data(self, data: &StructuredData) -> bool {
        match self {
            Processor::JsonLd => !data.json_ld.is_empty(),
            Processor::Microdata => !data.microdata.is_empty(),
            Processor::Rdfa => !data.rdfa.is_empty(),
        }
    }

    /// Recipe properties in this syntax, empty when there is no recipe.
    pub fn extract_recipe(self, data: &StructuredData) -> Map<String, Value> {
        match self {
            Processor::JsonLd => jsonld::extract_recipe(data.json_ld.as_slice()),
            Processor::Microdata => microdata::extract_recipe(&data.microdata),
            Processor::Rdfa => rdfa::extract_recipe(&data.rdfa),
        }
    }
}

impl fmt::Display for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.syntax_name())
    }
}

/// Tries each processor in order; the first one to find a recipe wins.
#[derive(Debug, Clone)]
pub struct MarkupExtractor {
    processors: Vec<Processor>,
}

impl Default for MarkupExtractor {
    fn default() -> Self {
        Self {
            processors: Processor::ALL.to_vec(),
        }
    }
}

impl MarkupExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_processors(processors: Vec<Processor>) -> Self {
        Self { processors }
    }

    pub fn syntax_names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.syntax_name()).collect()
    }

    pub fn extract(&self, html: &str) -> Option<Recipe> {
        self.extract_from(&detect(html))
    }

    pub fn extract_from(&self, data: &StructuredData) -> Option<Recipe> {
        self.extract_with_syntax(data).map(|(_, recipe)| recipe)
    }

    /// Like [`extract_from`](Self::extract_from), also naming the syntax
    /// the recipe came from.
    pub fn extract_with_syntax(&self, data: &StructuredData) -> Option<(Processor, Recipe)> {
        for &processor in &self.processors {
            if !processor.has_data(data) {
                continue;
            }

            let properties = processor.extract_recipe(data);
            if properties.is_empty() {
                debug!("No recipe in {} data", processor);
                continue;
            }

            debug!("Recipe found via {}", processor);
            return Some((processor, normalize_recipe(&properties, &data.title)));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MICRODATA_PAGE: &str = r#"<html><head><title>Micro</title></head><body>
        <div itemscope itemtype="http://schema.org/Recipe">
          <span itemprop="name">Micro Pancakes</span>
          <span itemprop="recipeIngredient">milk</span>
        </div></body></html>"#;

    #[test]
    fn test_syntax_names_in_priority_order() {
        assert_eq!(
            MarkupExtractor::new().syntax_names(),
            vec!["json-ld", "microdata", "rdfa"]
        );
        assert_eq!(Processor::from_syntax_name("RDFa"), Some(Processor::Rdfa));
        assert_eq!(Processor::from_syntax_name("turtle"), None);
    }

    #[test]
    fn test_json_ld_without_recipe_falls_through() {
        let html = MICRODATA_PAGE.replace(
            "<title>Micro</title>",
            r#"<title>Micro</title><script type="application/ld+json">{"@type":"WebSite"}</script>"#,
        );
        let (processor, recipe) = MarkupExtractor::new()
            .extract_with_syntax(&detect(&html))
            .unwrap();
        assert_eq!(processor, Processor::Microdata);
        assert_eq!(recipe.title, "Micro Pancakes");
    }

    #[test]
    fn test_restricted_processors() {
        let extractor = MarkupExtractor::with_processors(vec![Processor::Rdfa]);
        assert!(extractor.extract(MICRODATA_PAGE).is_none());
    }

    #[test]
    fn test_no_structured_data() {
        assert!(MarkupExtractor::new().extract("<p>just text</p>").is_none());
    }
}
