//! Recipe lookup and graph resolution over flat RDFa nodes.
//!
//! Nodes are keyed by absolute property IRIs and reference each other by
//! `@id`. Resolution turns the recipe node's properties into plain values:
//!
//! - `{"@value": v}` becomes `v`
//! - `{"@id": "http..."}` stays an opaque IRI string
//! - `{"@id": ref}` to a known node becomes a map of that node's schema.org
//!   properties, or a scalar when only one property is left
//! - unknown references fall back to the identifier itself
//! - lists collapse: nothing resolves to `None`, one item to that item

use crate::normalize::type_local_name;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::debug;

const SCHEMA_PREFIXES: [&str; 2] = ["http://schema.org/", "https://schema.org/"];

/// Properties projected out of the recipe node.
pub const RECIPE_PROPERTIES: [&str; 3] = ["name", "recipeIngredient", "recipeInstructions"];

struct GraphResolver<'a> {
    lookup: HashMap<&'a str, &'a Map<String, Value>>,
    /// Nodes on the current dereference path.
    visiting: HashSet<&'a str>,
}

impl<'a> GraphResolver<'a> {
    fn new(nodes: &'a [Value]) -> Self {
        let lookup = nodes
            .iter()
            .filter_map(|node| {
                let node = node.as_object()?;
                Some((node.get("@id")?.as_str()?, node))
            })
            .collect();
        Self {
            lookup,
            visiting: HashSet::new(),
        }
    }

    fn resolve(&mut self, value: &'a Value) -> Option<Value> {
        match value {
            Value::Null => None,
            Value::Array(items) => {
                let mut resolved: Vec<Value> =
                    items.iter().filter_map(|item| self.resolve(item)).collect();
                match resolved.len() {
                    0 => None,
                    1 => resolved.pop(),
                    _ => Some(Value::Array(resolved)),
                }
            }
            Value::Object(object) => {
                if let Some(literal) = object.get("@value") {
                    return Some(literal.clone());
                }
                if let Some(id) = object.get("@id").and_then(Value::as_str) {
                    return Some(self.dereference(id));
                }
                let mut resolved = Map::new();
                for (key, value) in object {
                    if key.starts_with('@') {
                        continue;
                    }
                    if let Some(value) = self.resolve(value) {
                        resolved.insert(key.clone(), value);
                    }
                }
                Some(Value::Object(resolved))
            }
            scalar => Some(scalar.clone()),
        }
    }

    fn dereference(&mut self, id: &'a str) -> Value {
        if id.starts_with("http://") || id.starts_with("https://") {
            return Value::String(id.to_string());
        }

        let Some(node) = self.lookup.get(id).copied() else {
            return Value::String(id.to_string());
        };
        if !self.visiting.insert(id) {
            debug!("Reference cycle through {}", id);
            return Value::String(id.to_string());
        }

        let mut resolved = Map::new();
        for (key, value) in node {
            if !is_schema_property(key) {
                continue;
            }
            if let Some(value) = self.resolve(value) {
                resolved.insert(type_local_name(key).to_string(), value);
            }
        }
        self.visiting.remove(id);

        match resolved.len() {
            0 => Value::String(id.to_string()),
            1 => resolved
                .into_iter()
                .next()
                .map(|(_, only)| only)
                .unwrap_or_else(|| Value::String(id.to_string())),
            _ => Value::Object(resolved),
        }
    }
}

fn is_schema_property(key: &str) -> bool {
    SCHEMA_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
}

fn is_recipe_node(node: &Map<String, Value>) -> bool {
    match node.get("@type") {
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| t.contains("Recipe")),
        Some(Value::String(t)) => t.contains("Recipe"),
        _ => false,
    }
}

/// Recipe properties resolved from an RDFa graph, or an empty map.
pub fn extract_recipe(nodes: &[Value]) -> Map<String, Value> {
    let Some(recipe) = nodes
        .iter()
        .filter_map(Value::as_object)
        .find(|node| is_recipe_node(node))
    else {
        return Map::new();
    };

    let mut resolver = GraphResolver::new(nodes);
    let mut properties = Map::new();
    for property in RECIPE_PROPERTIES {
        // First prefix whose value resolves to something wins
        let value = SCHEMA_PREFIXES.iter().find_map(|prefix| {
            recipe
                .get(&format!("{}{}", prefix, property))
                .and_then(|raw| resolver.resolve(raw))
        });
        if let Some(value) = value {
            properties.insert(property.to_string(), value);
        }
    }
    properties
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nodes(value: Value) -> Vec<Value> {
        match value {
            Value::Array(items) => items,
            _ => panic!("expected an array"),
        }
    }

    #[test]
    fn test_literals_and_list_collapse() {
        let graph = nodes(json!([{
            "@id": "#r",
            "@type": ["http://schema.org/Recipe"],
            "http://schema.org/name": [{"@value": "Udon"}],
            "http://schema.org/recipeIngredient": [{"@value": "noodles"}, {"@value": "honey"}]
        }]));
        let recipe = extract_recipe(&graph);
        assert_eq!(recipe["name"], "Udon");
        assert_eq!(recipe["recipeIngredient"], json!(["noodles", "honey"]));
        assert!(!recipe.contains_key("recipeInstructions"));
    }

    #[test]
    fn test_single_property_reference_collapses_to_scalar() {
        let graph = nodes(json!([
            {
                "@id": "#r",
                "@type": ["http://schema.org/Recipe"],
                "http://schema.org/recipeInstructions": [{"@id": "_:b0"}, {"@id": "_:b1"}]
            },
            {"@id": "_:b0", "@type": ["http://schema.org/HowToStep"], "http://schema.org/text": [{"@value": "Boil."}]},
            {"@id": "_:b1", "@type": ["http://schema.org/HowToStep"], "http://schema.org/text": [{"@value": "Drain."}]}
        ]));
        let recipe = extract_recipe(&graph);
        assert_eq!(recipe["recipeInstructions"], json!(["Boil.", "Drain."]));
    }

    #[test]
    fn test_multi_property_reference_becomes_map() {
        let graph = nodes(json!([
            {
                "@type": ["http://schema.org/Recipe"],
                "https://schema.org/recipeInstructions": [{"@id": "_:s"}]
            },
            {
                "@id": "_:s",
                "http://schema.org/name": [{"@value": "Prep"}],
                "http://schema.org/itemListElement": [{"@id": "_:t"}],
                "http://www.w3.org/ns/other": [{"@value": "ignored"}]
            },
            {"@id": "_:t", "http://schema.org/text": [{"@value": "Chop"}]}
        ]));
        let recipe = extract_recipe(&graph);
        assert_eq!(
            recipe["recipeInstructions"],
            json!({"name": "Prep", "itemListElement": "Chop"})
        );
    }

    #[test]
    fn test_absolute_and_unknown_references() {
        let graph = nodes(json!([{
            "@type": ["http://schema.org/Recipe"],
            "http://schema.org/recipeIngredient": [
                {"@id": "http://example.com/units/cup"},
                {"@id": "_:missing"}
            ]
        }]));
        let recipe = extract_recipe(&graph);
        assert_eq!(
            recipe["recipeIngredient"],
            json!(["http://example.com/units/cup", "_:missing"])
        );
    }

    #[test]
    fn test_reference_cycle_terminates() {
        let graph = nodes(json!([
            {
                "@id": "_:r",
                "@type": ["http://schema.org/Recipe"],
                "http://schema.org/recipeInstructions": [{"@id": "_:a"}]
            },
            {"@id": "_:a", "http://schema.org/text": [{"@value": "A"}], "http://schema.org/next": [{"@id": "_:b"}]},
            {"@id": "_:b", "http://schema.org/text": [{"@value": "B"}], "http://schema.org/next": [{"@id": "_:a"}]}
        ]));
        let recipe = extract_recipe(&graph);
        assert_eq!(
            recipe["recipeInstructions"],
            json!({"text": "A", "next": {"text": "B", "next": "_:a"}})
        );
    }

    #[test]
    fn test_empty_values_are_dropped() {
        let graph = nodes(json!([{
            "@type": ["http://schema.org/Recipe"],
            "http://schema.org/name": [],
            "http://schema.org/recipeIngredient": [null]
        }]));
        assert!(extract_recipe(&graph).is_empty());
    }

    #[test]
    fn test_empty_http_property_falls_through_to_https() {
        let graph = nodes(json!([{
            "@type": ["https://schema.org/Recipe"],
            "http://schema.org/name": [],
            "https://schema.org/name": [{"@value": "Shakshuka"}]
        }]));
        let recipe = extract_recipe(&graph);
        assert_eq!(recipe["name"], "Shakshuka");
    }

    #[test]
    fn test_no_recipe_node() {
        let graph = nodes(json!([{"@type": ["http://schema.org/Person"]}]));
        assert!(extract_recipe(&graph).is_empty());
        assert!(extract_recipe(&[]).is_empty());
    }
}
