//! HTML parsing and DOM navigation.
//!
//! This module provides the [`Document`] and [`Element`] types that every
//! extraction strategy works against. Lookups are lenient: missing nodes are
//! `None`, never errors, so a cascade can move on to its next strategy.
//!
//! # Example
//!
//! ```rust
//! use chumon_core::parse::Document;
//!
//! let html = r#"
//!     <html>
//!         <body>
//!             <h1>Widget</h1>
//!             <dl><dt>型番</dt><dd>W-100</dd></dl>
//!         </body>
//!     </html>
//! "#;
//!
//! let doc = Document::parse(html);
//! assert_eq!(doc.first_text("h1"), Some("Widget".to_string()));
//! assert_eq!(doc.labelled_value(&["型番"]), Some("W-100".to_string()));
//! ```

use scraper::{ElementRef, Html, Selector};

use crate::{ChumonError, Result};

/// Elements whose text never counts as visible page text.
const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Represents a parsed HTML document.
pub struct Document {
    html: Html,
}

impl Document {
    /// Parses HTML from a string.
    ///
    /// html5ever recovers from any malformed input, so parsing itself never
    /// fails.
    pub fn parse(html: &str) -> Self {
        Self { html: Html::parse_document(html) }
    }

    /// Selects elements using a CSS selector.
    ///
    /// # Errors
    ///
    /// Returns [`ChumonError::ConfigError`] if the selector is invalid.
    ///
    /// # Example
    ///
    /// ```rust
    /// use chumon_core::parse::Document;
    ///
    /// let html = r#"<p class="price">100</p><p class="price">200</p>"#;
    /// let doc = Document::parse(html);
    /// assert_eq!(doc.select("p.price").unwrap().len(), 2);
    /// ```
    pub fn select(&'_ self, selector: &str) -> Result<Vec<Element<'_>>> {
        let sel = parse_selector(selector)?;
        Ok(self.html.select(&sel).map(|el| Element { element: el }).collect())
    }

    /// Returns the first element matching `selector`, if any.
    pub fn select_first(&'_ self, selector: &str) -> Option<Element<'_>> {
        let sel = parse_selector(selector).ok()?;
        self.html.select(&sel).next().map(|el| Element { element: el })
    }

    /// Trimmed text of the first element matching `selector`, when non-empty.
    pub fn first_text(&self, selector: &str) -> Option<String> {
        self.select_first(selector).and_then(|el| el.trimmed_text())
    }

    /// Gets the trimmed content of the `<title>` element.
    pub fn title(&self) -> Option<String> {
        self.first_text("title")
    }

    /// Gets all text content from the document, including script bodies.
    pub fn text_content(&self) -> String {
        self.html.root_element().text().collect()
    }

    /// Visible text, one trimmed text node per line.
    ///
    /// Script, style and template bodies are skipped so that price and
    /// label regexes only see what a shopper would see.
    pub fn visible_text(&self) -> String {
        let mut lines = Vec::new();
        for node in self.html.root_element().descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            let hidden = node
                .parent()
                .and_then(|parent| parent.value().as_element().map(|el| el.name().to_ascii_lowercase()))
                .is_some_and(|name| INVISIBLE_TAGS.contains(&name.as_str()));
            if hidden {
                continue;
            }
            let text: &str = text;
            let text = text.trim();
            if !text.is_empty() {
                lines.push(text);
            }
        }
        lines.join("\n")
    }

    /// Looks up a label/value pair in definition lists and tables.
    ///
    /// Scans every `dt` and `th` in document order. The first one whose text
    /// contains any of `labels` yields the text of its following `dd` (for
    /// `dt`) or `td` (for `th`) sibling, when that text is non-empty.
    pub fn labelled_value(&self, labels: &[&str]) -> Option<String> {
        for label_el in self.select("dt, th").ok()? {
            let label = label_el.text();
            let label = label.trim();
            if !labels.iter().any(|candidate| label.contains(candidate)) {
                continue;
            }
            let value_tag = if label_el.tag_name() == "dt" { "dd" } else { "td" };
            if let Some(value) = label_el.next_sibling_element(value_tag).and_then(|el| el.trimmed_text()) {
                return Some(value);
            }
        }
        None
    }

    /// Like [`Document::labelled_value`], restricted to rows of tables
    /// matched by `row_selector` (each row's first `th` is the label and its
    /// first `td` the value).
    pub fn table_row_value(&self, row_selector: &str, labels: &[&str]) -> Option<String> {
        for row in self.select(row_selector).ok()? {
            let Some(label) = row.select_first("th").and_then(|th| th.trimmed_text()) else {
                continue;
            };
            if !labels.iter().any(|candidate| label.contains(candidate)) {
                continue;
            }
            if let Some(value) = row.select_first("td").and_then(|td| td.trimmed_text()) {
                return Some(value);
            }
        }
        None
    }

    /// Finds the first element matching `selector` that comes after `anchor`
    /// in document order, anywhere in the tree.
    pub fn next_in_document<'a>(&'a self, anchor: &Element<'a>, selector: &str) -> Option<Element<'a>> {
        let sel = parse_selector(selector).ok()?;
        let anchor_id = anchor.element.id();
        let mut passed_anchor = false;
        for node in self.html.root_element().descendants() {
            if node.id() == anchor_id {
                passed_anchor = true;
                continue;
            }
            if !passed_anchor {
                continue;
            }
            if let Some(el) = ElementRef::wrap(node)
                && sel.matches(&el)
            {
                return Some(Element { element: el });
            }
        }
        None
    }
}

/// A wrapper around scraper's ElementRef for easier DOM navigation.
#[derive(Clone, Debug)]
pub struct Element<'a> {
    element: ElementRef<'a>,
}

impl<'a> Element<'a> {
    /// Gets the text content of this element.
    pub fn text(&self) -> String {
        self.element.text().collect()
    }

    /// Trimmed text content, `None` when only whitespace remains.
    pub fn trimmed_text(&self) -> Option<String> {
        let text = self.text();
        let text = text.trim();
        if text.is_empty() { None } else { Some(text.to_string()) }
    }

    /// Text with each text node trimmed and joined by single spaces.
    pub fn spaced_text(&self) -> String {
        self.element
            .text()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Gets the value of an attribute.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }

    /// Gets the lowercase tag name.
    pub fn tag_name(&self) -> String {
        self.element.value().name().to_lowercase()
    }

    /// Whether the `class` attribute contains `class_name` as a whole token.
    pub fn has_class(&self, class_name: &str) -> bool {
        self.element.value().classes().any(|class| class == class_name)
    }

    /// The parent element, if any.
    pub fn parent(&self) -> Option<Element<'a>> {
        self.element
            .parent()
            .and_then(ElementRef::wrap)
            .map(|element| Element { element })
    }

    /// The first following sibling element with the given tag name.
    pub fn next_sibling_element(&self, tag: &str) -> Option<Element<'a>> {
        self.element
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name().eq_ignore_ascii_case(tag))
            .map(|element| Element { element })
    }

    /// Selects descendant elements using a CSS selector.
    ///
    /// # Errors
    ///
    /// Returns [`ChumonError::ConfigError`] if the selector is invalid.
    pub fn select(&self, selector: &str) -> Result<Vec<Element<'a>>> {
        let sel = parse_selector(selector)?;
        Ok(self.element.select(&sel).map(|el| Element { element: el }).collect())
    }

    /// First descendant matching `selector`.
    pub fn select_first(&self, selector: &str) -> Option<Element<'a>> {
        let sel = parse_selector(selector).ok()?;
        self.element.select(&sel).next().map(|el| Element { element: el })
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| ChumonError::ConfigError(format!("Invalid selector {selector:?}: {e}")))
}
