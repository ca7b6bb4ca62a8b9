//! Field extraction cascades.
//!
//! Every field is pulled out of a page by a [`Cascade`]: a static, ordered
//! list of named strategies. Strategies are plain functions from a [`Page`]
//! to an optional value. They are tried in order and the first non-empty
//! result wins, so a later strategy can never overwrite an earlier one.
//!
//! Strategies never fail. A missing element, a selector that does not match
//! or an embedded JSON blob that does not parse all just mean "nothing here",
//! and the cascade moves on.
//!
//! # Example
//!
//! ```rust
//! use chumon_core::extract::{Cascade, Page};
//! use chumon_core::parse::Document;
//! use url::Url;
//!
//! fn heading(page: &Page<'_>) -> Option<String> {
//!     page.doc.first_text("h1")
//! }
//!
//! fn title(page: &Page<'_>) -> Option<String> {
//!     page.doc.title()
//! }
//!
//! static NAME: Cascade<String> = Cascade::new("name", &[("heading", heading), ("title", title)]);
//!
//! let doc = Document::parse("<title>From title</title><h1>  </h1>");
//! let url = Url::parse("https://shop.example/item/1").unwrap();
//! let page = Page::new(&doc, &url);
//! assert_eq!(NAME.run(&page), Some("From title".to_string()));
//! ```

pub mod common;

use std::cell::OnceCell;

use url::Url;

use crate::parse::Document;
use crate::price::PricePair;

/// A parsed page together with the URL it was fetched from.
pub struct Page<'a> {
    pub doc: &'a Document,
    pub url: &'a Url,
    visible_text: OnceCell<String>,
}

impl<'a> Page<'a> {
    pub fn new(doc: &'a Document, url: &'a Url) -> Self {
        Self { doc, url, visible_text: OnceCell::new() }
    }

    /// The document's visible text, computed once per page.
    pub fn visible_text(&self) -> &str {
        self.visible_text.get_or_init(|| self.doc.visible_text())
    }
}

/// One extraction strategy for a field.
pub type Strategy<T> = fn(&Page<'_>) -> Option<T>;

/// Values a cascade can produce. Blank values count as "not found".
pub trait Extractable {
    fn is_blank(&self) -> bool;
}

impl Extractable for String {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl Extractable for PricePair {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

/// An ordered list of named strategies for one field.
pub struct Cascade<T: 'static> {
    field: &'static str,
    strategies: &'static [(&'static str, Strategy<T>)],
}

impl<T: Extractable> Cascade<T> {
    pub const fn new(field: &'static str, strategies: &'static [(&'static str, Strategy<T>)]) -> Self {
        Self { field, strategies }
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    /// Strategy names in the order they are tried.
    pub fn strategy_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.strategies.iter().map(|(name, _)| *name)
    }

    /// Runs the strategies in order and returns the first non-blank result.
    pub fn run(&self, page: &Page<'_>) -> Option<T> {
        self.run_named(page).map(|(_, value)| value)
    }

    /// Like [`Cascade::run`], also naming the strategy that matched.
    pub fn run_named(&self, page: &Page<'_>) -> Option<(&'static str, T)> {
        for (name, strategy) in self.strategies {
            if let Some(value) = strategy(page)
                && !value.is_blank()
            {
                tracing::debug!(field = self.field, strategy = *name, "strategy matched");
                return Some((name, value));
            }
        }
        tracing::debug!(field = self.field, "no strategy matched");
        None
    }
}

/// The four cascades for one site.
pub struct ExtractorSet {
    pub name: Cascade<String>,
    pub model: Cascade<String>,
    pub item_code: Cascade<String>,
    pub prices: Cascade<PricePair>,
}

/// Raw cascade results for one page, before tax reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub name: Option<String>,
    pub model: Option<String>,
    pub item_code: Option<String>,
    pub prices: PricePair,
}

impl Extracted {
    /// Whether any field at all was found.
    pub fn has_any(&self) -> bool {
        self.name.is_some() || self.model.is_some() || self.item_code.is_some() || !self.prices.is_empty()
    }
}

impl ExtractorSet {
    pub fn extract(&self, page: &Page<'_>) -> Extracted {
        Extracted {
            name: self.name.run(page),
            model: self.model.run(page),
            item_code: self.item_code.run(page),
            prices: self.prices.run(page).unwrap_or_default(),
        }
    }
}
