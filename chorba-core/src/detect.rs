//! Structured data detection in HTML pages.
//!
//! [`detect`] pulls out the raw material for each markup processor:
//!
//! - **JSON-LD**: the text of every `application/ld+json` script
//! - **Microdata**: one tree per top-level `itemscope` element
//! - **RDFa**: a flat node list from an RDFa Lite walk, keyed by absolute
//!   property IRIs with cross-references by `@id`
//!
//! A syntax the page doesn't use just leaves its bucket empty.

use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::LazyLock;

const SCHEMA_ORG: &str = "http://schema.org/";

static TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("title").expect("Failed to parse title selector - this is a bug")
});

static SCRIPT_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("script[type]").expect("Failed to parse script selector - this is a bug")
});

static ITEMSCOPE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("[itemscope]").expect("Failed to parse itemscope selector - this is a bug")
});

/// Per-syntax structured data found in one page.
#[derive(Debug, Clone, Default)]
pub struct StructuredData {
    /// Trimmed `<title>` text, empty when absent.
    pub title: String,
    pub json_ld: Vec<String>,
    pub microdata: Vec<Value>,
    pub rdfa: Vec<Value>,
}

impl StructuredData {
    pub fn is_empty(&self) -> bool {
        self.json_ld.is_empty() && self.microdata.is_empty() && self.rdfa.is_empty()
    }
}

pub fn detect(html: &str) -> StructuredData {
    let document = Html::parse_document(html);

    StructuredData {
        title: page_title(&document),
        json_ld: json_ld_blocks(&document),
        microdata: microdata_items(&document),
        rdfa: RdfaWalker::walk(&document),
    }
}

fn page_title(document: &Html) -> String {
    document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .unwrap_or_default()
}

fn json_ld_blocks(document: &Html) -> Vec<String> {
    document
        .select(&SCRIPT_SELECTOR)
        .filter(|el| {
            el.value()
                .attr("type")
                .map(|t| t.trim().to_ascii_lowercase().starts_with("application/ld+json"))
                .unwrap_or(false)
        })
        .map(|el| el.text().collect::<String>())
        .filter(|text| !text.trim().is_empty())
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// Microdata
// ============================================================================

fn microdata_items(document: &Html) -> Vec<Value> {
    document
        .select(&ITEMSCOPE_SELECTOR)
        .filter(|el| el.value().attr("itemprop").is_none())
        .map(microdata_item)
        .collect()
}

/// `{"type": [...], "id"?: ..., "properties": {...}}` for one item scope.
fn microdata_item(scope: ElementRef) -> Value {
    let types: Vec<Value> = scope
        .value()
        .attr("itemtype")
        .map(|t| t.split_whitespace().map(|s| json!(s)).collect())
        .unwrap_or_default();

    let mut properties = Map::new();
    collect_microdata_properties(scope, &mut properties);

    let mut item = Map::new();
    item.insert("type".to_string(), Value::Array(types));
    if let Some(id) = scope.value().attr("itemid") {
        item.insert("id".to_string(), json!(id));
    }
    item.insert("properties".to_string(), Value::Object(properties));
    Value::Object(item)
}

fn collect_microdata_properties(parent: ElementRef, properties: &mut Map<String, Value>) {
    for child in parent.children().filter_map(ElementRef::wrap) {
        let opens_scope = child.value().attr("itemscope").is_some();

        if let Some(names) = child.value().attr("itemprop") {
            let value = if opens_scope {
                microdata_item(child)
            } else {
                microdata_value(child)
            };
            for name in names.split_whitespace() {
                append_property(properties, name, value.clone());
            }
        }

        // A nested scope owns its own descendants
        if !opens_scope {
            collect_microdata_properties(child, properties);
        }
    }
}

fn microdata_value(element: ElementRef) -> Value {
    let el = element.value();
    if let Some(content) = el.attr("content") {
        return json!(content.trim());
    }

    let attr = match el.name() {
        "a" | "area" | "link" => el.attr("href"),
        "img" | "audio" | "video" | "source" | "iframe" | "embed" | "track" => el.attr("src"),
        "time" => el.attr("datetime"),
        "data" | "meter" => el.attr("value"),
        "object" => el.attr("data"),
        _ => None,
    };

    match attr {
        Some(value) => json!(value.trim()),
        None => json!(collapse_whitespace(&element.text().collect::<String>())),
    }
}

/// Repeated names accumulate into an array.
fn append_property(properties: &mut Map<String, Value>, name: &str, value: Value) {
    match properties.get_mut(name) {
        Some(Value::Array(values)) => values.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            properties.insert(name.to_string(), value);
        }
    }
}

// ============================================================================
// RDFa Lite
// ============================================================================

#[derive(Clone)]
struct RdfaContext {
    vocab: Option<String>,
    prefixes: HashMap<String, String>,
    /// Index into the walker's nodes of the current subject.
    subject: Option<usize>,
}

impl RdfaContext {
    fn root() -> Self {
        let mut prefixes = HashMap::new();
        prefixes.insert("schema".to_string(), SCHEMA_ORG.to_string());
        Self {
            vocab: None,
            prefixes,
            subject: None,
        }
    }

    fn expand(&self, term: &str) -> String {
        if term.starts_with("http://") || term.starts_with("https://") {
            return term.to_string();
        }
        if let Some((prefix, local)) = term.split_once(':')
            && let Some(iri) = self.prefixes.get(prefix)
        {
            return format!("{}{}", iri, local);
        }
        match self.vocab {
            Some(ref vocab) => format!("{}{}", vocab, term),
            None => term.to_string(),
        }
    }
}

#[derive(Default)]
struct RdfaWalker {
    nodes: Vec<Map<String, Value>>,
    by_id: HashMap<String, usize>,
    blank_count: usize,
}

impl RdfaWalker {
    fn walk(document: &Html) -> Vec<Value> {
        let mut walker = Self::default();
        walker.visit(document.root_element(), &RdfaContext::root());
        walker.nodes.into_iter().map(Value::Object).collect()
    }

    fn visit(&mut self, element: ElementRef, parent: &RdfaContext) {
        let el = element.value();
        let mut ctx = parent.clone();

        if let Some(vocab) = el.attr("vocab") {
            let vocab = vocab.trim();
            ctx.vocab = (!vocab.is_empty()).then(|| vocab.to_string());
        }
        if let Some(prefix) = el.attr("prefix") {
            let tokens: Vec<&str> = prefix.split_whitespace().collect();
            for pair in tokens.chunks(2) {
                if let [name, iri] = pair
                    && let Some(name) = name.strip_suffix(':')
                {
                    ctx.prefixes.insert(name.to_string(), iri.to_string());
                }
            }
        }

        let properties: Vec<String> = el
            .attr("property")
            .map(|p| p.split_whitespace().map(|t| ctx.expand(t)).collect())
            .unwrap_or_default();
        let types: Vec<String> = el
            .attr("typeof")
            .map(|t| t.split_whitespace().map(|t| ctx.expand(t)).collect())
            .unwrap_or_default();
        let explicit_id = el.attr("resource").or_else(|| el.attr("about"));

        if el.attr("typeof").is_some() {
            let node = self.node_for(explicit_id);
            self.add_types(node, &types);
            let id = self.id_of(node);
            for property in &properties {
                self.add_value(parent.subject, property, json!({ "@id": id }));
            }
            ctx.subject = Some(node);
        } else if !properties.is_empty() {
            let value = rdfa_value(element);
            for property in &properties {
                self.add_value(parent.subject, property, value.clone());
            }
        } else if let Some(id) = explicit_id {
            ctx.subject = Some(self.node_for(Some(id)));
        }

        for child in element.children().filter_map(ElementRef::wrap) {
            self.visit(child, &ctx);
        }
    }

    /// Existing node for `id`, or a new one (blank when `id` is `None`).
    fn node_for(&mut self, id: Option<&str>) -> usize {
        let id = match id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => {
                let blank = format!("_:b{}", self.blank_count);
                self.blank_count += 1;
                blank
            }
        };

        if let Some(&idx) = self.by_id.get(&id) {
            return idx;
        }
        let mut node = Map::new();
        node.insert("@id".to_string(), json!(id));
        self.nodes.push(node);
        self.by_id.insert(id, self.nodes.len() - 1);
        self.nodes.len() - 1
    }

    fn id_of(&self, node: usize) -> String {
        self.nodes[node]
            .get("@id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    fn add_types(&mut self, node: usize, types: &[String]) {
        if types.is_empty() {
            return;
        }
        let entry = self.nodes[node]
            .entry("@type")
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(existing) = entry {
            for t in types {
                if !existing.iter().any(|e| e.as_str() == Some(t.as_str())) {
                    existing.push(json!(t));
                }
            }
        }
    }

    fn add_value(&mut self, subject: Option<usize>, property: &str, value: Value) {
        // Properties outside any typed subject have nothing to attach to
        let Some(subject) = subject else {
            return;
        };
        let entry = self.nodes[subject]
            .entry(property)
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(values) = entry {
            values.push(value);
        }
    }
}

fn rdfa_value(element: ElementRef) -> Value {
    let el = element.value();
    if let Some(content) = el.attr("content") {
        return json!({ "@value": content.trim() });
    }
    if let Some(iri) = el
        .attr("resource")
        .or_else(|| el.attr("href"))
        .or_else(|| el.attr("src"))
    {
        return json!({ "@id": iri.trim() });
    }
    if el.name() == "time"
        && let Some(datetime) = el.attr("datetime")
    {
        return json!({ "@value": datetime.trim() });
    }
    json!({ "@value": collapse_whitespace(&element.text().collect::<String>()) })
}
