//! JSON-LD (`<script type="application/ld+json">`) recipe lookup.

use crate::normalize::type_matches;
use serde_json::{Map, Value};
use tracing::debug;

const RECIPE_TYPE: &str = "Recipe";

/// Parse and merge raw JSON-LD blocks into one list of candidate nodes.
///
/// Arrays are spliced in, `@graph` containers are expanded, and blocks that
/// fail to parse are skipped without affecting the rest.
pub fn merge_blocks<S: AsRef<str>>(blocks: &[S]) -> Vec<Value> {
    let mut nodes = Vec::new();
    for (idx, block) in blocks.iter().enumerate() {
        match serde_json::from_str::<Value>(block.as_ref()) {
            Ok(value) => push_nodes(value, &mut nodes),
            Err(e) => debug!("Skipping malformed JSON-LD block {}: {}", idx, e),
        }
    }
    nodes
}

fn push_nodes(value: Value, nodes: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                push_nodes(item, nodes);
            }
        }
        Value::Object(mut object) => match object.remove("@graph") {
            Some(graph) => push_nodes(graph, nodes),
            None => nodes.push(Value::Object(object)),
        },
        _ => {}
    }
}

fn is_recipe(node: &Value) -> bool {
    node.get("@type")
        .map(|t| type_matches(t, RECIPE_TYPE))
        .unwrap_or(false)
}

/// First node typed as a Recipe, looking one level into `mainEntity` for
/// article pages that wrap their recipe.
pub fn find_recipe(nodes: &[Value]) -> Option<&Map<String, Value>> {
    nodes.iter().find_map(|node| {
        if is_recipe(node) {
            return node.as_object();
        }
        match node.get("mainEntity")? {
            Value::Array(entities) => entities.iter().find(|e| is_recipe(e))?.as_object(),
            entity if is_recipe(entity) => entity.as_object(),
            _ => None,
        }
    })
}

/// Recipe properties from a page's JSON-LD blocks, or an empty map.
pub fn extract_recipe<S: AsRef<str>>(blocks: &[S]) -> Map<String, Value> {
    let nodes = merge_blocks(blocks);
    debug!("Merged {} JSON-LD nodes from {} blocks", nodes.len(), blocks.len());
    find_recipe(&nodes).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_bare_object_and_graph() {
        let blocks = [
            r#"{"@type": "WebSite", "name": "Example"}"#,
            r#"{"@context": "https://schema.org", "@graph": [
                {"@type": "BreadcrumbList"},
                {"@type": "Recipe", "name": "Soup"}
            ]}"#,
        ];
        let nodes = merge_blocks(&blocks);
        assert_eq!(nodes.len(), 3);
        assert_eq!(find_recipe(&nodes).unwrap()["name"], "Soup");
    }

    #[test]
    fn test_merge_skips_malformed_blocks() {
        let blocks = [
            "{not json",
            r#"[{"@type": "Person"}, {"@type": "Recipe", "name": "Stew"}]"#,
            "42",
        ];
        let nodes = merge_blocks(&blocks);
        assert_eq!(nodes.len(), 2);
        assert_eq!(extract_recipe(&blocks)["name"], "Stew");
    }

    #[test]
    fn test_type_list_contains_recipe() {
        let blocks = [r#"{"@type": ["Recipe", "NewsArticle"], "name": "Hybrid"}"#];
        assert_eq!(extract_recipe(&blocks)["name"], "Hybrid");
    }

    #[test]
    fn test_main_entity_unwrapped() {
        let blocks = [r#"{
            "@type": "Article",
            "mainEntity": {"@type": "Recipe", "name": "Nested"}
        }"#];
        assert_eq!(extract_recipe(&blocks)["name"], "Nested");
    }

    #[test]
    fn test_main_entity_list() {
        let blocks = [r#"{
            "@type": "WebPage",
            "mainEntity": [{"@type": "Person"}, {"@type": "Recipe", "name": "Listed"}]
        }"#];
        assert_eq!(extract_recipe(&blocks)["name"], "Listed");
    }

    #[test]
    fn test_first_recipe_wins() {
        let blocks = [
            r#"{"@type": "Recipe", "name": "First"}"#,
            r#"{"@type": "Recipe", "name": "Second"}"#,
        ];
        assert_eq!(extract_recipe(&blocks)["name"], "First");
    }

    #[test]
    fn test_no_recipe_is_empty() {
        let blocks = [r#"{"@type": "Organization", "name": "Acme"}"#];
        assert!(extract_recipe(&blocks).is_empty());
        assert!(extract_recipe::<&str>(&[]).is_empty());
    }
}
