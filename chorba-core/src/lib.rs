pub mod crawl;
pub mod detect;
pub mod extract;
pub mod harvest;
pub mod jsonld;
pub mod microdata;
pub mod model;
pub mod normalize;
pub mod rdfa;
pub mod report;
pub mod scrape;

pub use extract::{MarkupExtractor, Processor};
pub use model::{Ingredient, Recipe};
pub use scrape::RecipeScraper;
