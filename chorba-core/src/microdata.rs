//! Recipe lookup over microdata item trees.

use crate::normalize::{type_local_name, type_matches};
use serde_json::{Map, Value, json};

const RECIPE_TYPE: &str = "Recipe";

fn is_item(value: &Value) -> bool {
    value.get("properties").is_some_and(Value::is_object)
}

fn is_recipe_item(item: &Value) -> bool {
    item.get("type")
        .map(|t| type_matches(t, RECIPE_TYPE))
        .unwrap_or(false)
}

/// Depth-first search for the first Recipe item, including items nested in
/// another item's properties.
fn find_recipe_item(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(values) => values.iter().find_map(find_recipe_item),
        item if is_item(item) => {
            if is_recipe_item(item) {
                return Some(item);
            }
            item["properties"]
                .as_object()?
                .values()
                .find_map(find_recipe_item)
        }
        _ => None,
    }
}

/// Nested items become `{"@type": <local type>, ...properties}` so that
/// steps and sections look the same as in JSON-LD.
fn flatten_item_value(value: &Value) -> Value {
    match value {
        Value::Array(values) => Value::Array(values.iter().map(flatten_item_value).collect()),
        item if is_item(item) => {
            let mut flat = Map::new();
            if let Some(local) = item
                .get("type")
                .and_then(|t| t.as_array())
                .and_then(|types| types.first())
                .and_then(Value::as_str)
            {
                flat.insert("@type".to_string(), json!(type_local_name(local)));
            }
            if let Some(properties) = item["properties"].as_object() {
                for (name, value) in properties {
                    flat.insert(name.clone(), flatten_item_value(value));
                }
            }
            Value::Object(flat)
        }
        other => other.clone(),
    }
}

/// Properties of the first Recipe item, or an empty map.
pub fn extract_recipe(items: &[Value]) -> Map<String, Value> {
    let Some(recipe) = items.iter().find_map(find_recipe_item) else {
        return Map::new();
    };

    recipe["properties"]
        .as_object()
        .map(|properties| {
            properties
                .iter()
                .map(|(name, value)| (name.clone(), flatten_item_value(value)))
                .collect()
        })
        .unwrap_or_default()
}
