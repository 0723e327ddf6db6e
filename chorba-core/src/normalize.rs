//! Conversion of extracted property maps into [`Recipe`].
//!
//! All three markup processors hand their output to [`normalize_recipe`], so
//! a recipe reads the same whichever syntax the page used. Values may be a
//! scalar or a list wherever schema.org allows either.

use crate::model::{Ingredient, Recipe};
use serde_json::{Map, Value};

const SECTION_STEP_PREFIX: &str = "  - ";

/// Build a [`Recipe`] from a schema.org property map.
///
/// `fallback_title` is used when the map has no usable `name`.
pub fn normalize_recipe(properties: &Map<String, Value>, fallback_title: &str) -> Recipe {
    let title = properties
        .get("name")
        .and_then(first_text)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| fallback_title.trim().to_string());

    // `ingredients` is the pre-2014 schema.org name
    let ingredients = properties
        .get("recipeIngredient")
        .or_else(|| properties.get("ingredients"))
        .map(ingredient_names)
        .unwrap_or_default()
        .into_iter()
        .map(Ingredient::new)
        .collect();

    let directions = properties
        .get("recipeInstructions")
        .map(flatten_directions)
        .unwrap_or_default();

    Recipe {
        title,
        ingredients,
        directions,
    }
}

/// Flatten `recipeInstructions` into direction lines, in source order.
///
/// Plain strings are kept as lines, verbatim. Steps contribute their `text`. Sections
/// contribute a `"{name}:"` header followed by their steps as `"  - {text}"`.
pub fn flatten_directions(instructions: &Value) -> Vec<String> {
    let mut directions = Vec::new();
    match instructions {
        Value::Array(items) => {
            for item in items {
                push_direction(item, &mut directions);
            }
        }
        other => push_direction(other, &mut directions),
    }
    directions
}

fn push_direction(item: &Value, directions: &mut Vec<String>) {
    match item {
        Value::String(line) => directions.push(line.clone()),
        Value::Object(node) if is_section(node) => {
            if let Some(name) = node.get("name").and_then(first_text) {
                let name = name.trim();
                if !name.is_empty() {
                    directions.push(format!("{}:", name));
                }
            }
            for step in as_list(node.get("itemListElement")) {
                if let Some(text) = step_text(step) {
                    directions.push(format!("{}{}", SECTION_STEP_PREFIX, text));
                }
            }
        }
        Value::Object(node) if is_step(node) => {
            if let Some(text) = node.get("text").and_then(first_text) {
                let text = text.trim();
                if !text.is_empty() {
                    directions.push(text.to_string());
                }
            }
        }
        // Resolved graphs can nest step lists one level deeper
        Value::Array(items) => {
            for item in items {
                push_direction(item, directions);
            }
        }
        _ => {}
    }
}

fn step_text(step: &Value) -> Option<String> {
    let text = match step {
        Value::String(s) => s.as_str(),
        Value::Object(node) if is_step(node) => node.get("text").and_then(first_text)?,
        _ => return None,
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn is_section(node: &Map<String, Value>) -> bool {
    match node.get("@type") {
        Some(t) => type_matches(t, "HowToSection"),
        None => node.contains_key("itemListElement"),
    }
}

fn is_step(node: &Map<String, Value>) -> bool {
    match node.get("@type") {
        Some(t) => type_matches(t, "HowToStep"),
        None => node.contains_key("text"),
    }
}

/// Whether a `@type` value (string or list) names `wanted`, either bare or
/// as the last segment of an IRI such as `http://schema.org/Recipe`.
pub fn type_matches(type_value: &Value, wanted: &str) -> bool {
    let matches = |t: &str| t == wanted || type_local_name(t) == wanted;
    match type_value {
        Value::String(t) => matches(t),
        Value::Array(types) => types.iter().filter_map(Value::as_str).any(matches),
        _ => false,
    }
}

/// `http://schema.org/Recipe` and `schema:Recipe` both become `Recipe`.
pub fn type_local_name(iri: &str) -> &str {
    iri.rsplit(['/', '#', ':']).next().unwrap_or(iri)
}

fn ingredient_names(value: &Value) -> Vec<String> {
    as_list(Some(value))
        .into_iter()
        .filter_map(first_text)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

fn as_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    }
}

/// The first string found in a scalar, a list, or a `{"name"|"text": ...}`
/// object.
fn first_text(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Array(items) => items.iter().find_map(first_text),
        Value::Object(node) => node
            .get("@value")
            .or_else(|| node.get("text"))
            .or_else(|| node.get("name"))
            .and_then(first_text),
        _ => None,
    }
}
