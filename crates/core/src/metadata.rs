//! Product facts from embedded `application/ld+json` blocks.

use crate::Document;
use crate::price::parse_price_token;
use serde_json::Value;

/// Product facts read from embedded JSON-LD.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddedProduct {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub price: Option<i64>,
}

impl Document {
    /// Get meta tag content by name or property attribute
    pub fn meta_content(&self, attr: &str) -> Option<String> {
        for selector in [format!("meta[name=\"{}\"]", attr), format!("meta[property=\"{}\"]", attr)] {
            if let Some(el) = self.select_first(&selector)
                && let Some(content) = el.attr("content")
            {
                let content = content.trim();
                if !content.is_empty() {
                    return Some(content.to_string());
                }
            }
        }
        None
    }

    /// First schema.org `Product` (or bare `Offer`) found in any
    /// `application/ld+json` script.
    ///
    /// Handles top-level arrays and `@graph` containers. Scripts that fail
    /// to parse are skipped.
    pub fn embedded_product(&self) -> Option<EmbeddedProduct> {
        let scripts = self.select("script[type=\"application/ld+json\"]").ok()?;
        for script in scripts {
            let text = script.text();
            let Ok(value) = serde_json::from_str::<Value>(text.trim()) else {
                continue;
            };
            if let Some(product) = find_product(&value) {
                return Some(product);
            }
        }
        None
    }
}

fn find_product(value: &Value) -> Option<EmbeddedProduct> {
    match value {
        Value::Array(items) => items.iter().find_map(find_product),
        Value::Object(obj) => {
            if let Some(graph) = obj.get("@graph")
                && let Some(product) = find_product(graph)
            {
                return Some(product);
            }
            if is_product_type(obj.get("@type")) {
                return Some(EmbeddedProduct {
                    name: obj.get("name").and_then(json_text),
                    sku: obj.get("sku").or_else(|| obj.get("mpn")).and_then(json_text),
                    price: obj.get("offers").and_then(offer_price).or_else(|| obj.get("price").and_then(json_price)),
                });
            }
            None
        }
        _ => None,
    }
}

fn is_product_type(kind: Option<&Value>) -> bool {
    let matches = |s: &str| matches!(s.to_ascii_lowercase().as_str(), "product" | "offer");
    match kind {
        Some(Value::String(s)) => matches(s),
        Some(Value::Array(kinds)) => kinds.iter().filter_map(Value::as_str).any(matches),
        _ => false,
    }
}

/// `offers` may be one object, a list of them, or an `AggregateOffer`.
fn offer_price(offers: &Value) -> Option<i64> {
    match offers {
        Value::Array(items) => items.iter().find_map(offer_price),
        Value::Object(obj) => obj
            .get("price")
            .and_then(json_price)
            .or_else(|| obj.get("lowPrice").and_then(json_price)),
        _ => None,
    }
}

fn json_price(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let whole = s.split('.').next().unwrap_or(s);
            parse_price_token(whole)
        }
        _ => None,
    }
}

fn json_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() { None } else { Some(text) }
}
