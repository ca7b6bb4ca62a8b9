//! Queries in, records out.
//!
//! A [`ProductQuery`] moves through [`QueryState`] once. It ends either
//! `Accepted` with a [`ProductRecord`], or `Rejected` with the reason.
//! A record is never emitted half-built: if nothing informative was found on
//! the page the query is rejected with [`Rejection::NoUsableData`].

use std::fmt;
use std::num::NonZeroU32;

use serde::Serialize;

use crate::extract::{Extracted, Page};
use crate::reconcile::{TaxRate, reconcile};
use crate::sites::Site;
use crate::{ChumonError, Rejection, Result};

/// One order line requested by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    url: String,
    quantity: NonZeroU32,
}

impl ProductQuery {
    /// # Errors
    ///
    /// Returns [`ChumonError::InvalidQuery`] for an empty URL or a zero
    /// quantity.
    pub fn new(url: impl Into<String>, quantity: u32) -> Result<Self> {
        let url = url.into().trim().to_string();
        if url.is_empty() {
            return Err(ChumonError::InvalidQuery("URL is empty".to_string()));
        }
        let quantity = NonZeroU32::new(quantity)
            .ok_or_else(|| ChumonError::InvalidQuery(format!("quantity must be at least 1 for {url}")))?;
        Ok(Self { url, quantity })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn quantity(&self) -> NonZeroU32 {
        self.quantity
    }
}

impl fmt::Display for ProductQuery {
    /// Same shape as an input list line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | 個数: {}", self.url, self.quantity)
    }
}

/// A normalised order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductRecord {
    pub supplier: String,
    pub item_code: String,
    pub name: String,
    pub model: String,
    pub price_excl_tax: Option<i64>,
    pub price_incl_tax: Option<i64>,
    pub url: String,
    pub quantity: NonZeroU32,
}

impl ProductRecord {
    /// `price_excl_tax × quantity`
    pub fn line_total_excl_tax(&self) -> Option<i64> {
        self.price_excl_tax.map(|unit| unit.saturating_mul(i64::from(self.quantity.get())))
    }

    /// At least one of name, model, item code or a price is present.
    pub fn is_viable(&self) -> bool {
        !self.name.is_empty()
            || !self.model.is_empty()
            || !self.item_code.is_empty()
            || self.price_excl_tax.is_some()
            || self.price_incl_tax.is_some()
    }
}

/// Where a query is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryState {
    Pending,
    Routed(Site),
    Fetched,
    Extracted,
    Accepted,
    Rejected(Rejection),
}

impl QueryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryState::Accepted | QueryState::Rejected(_))
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryState::Pending => f.write_str("pending"),
            QueryState::Routed(site) => write!(f, "routed to {site}"),
            QueryState::Fetched => f.write_str("fetched"),
            QueryState::Extracted => f.write_str("extracted"),
            QueryState::Accepted => f.write_str("accepted"),
            QueryState::Rejected(rejection) => write!(f, "rejected: {rejection}"),
        }
    }
}

/// Runs the site's cascades over `page` and builds the record.
pub fn assemble(
    site: Site, page: &Page<'_>, query: &ProductQuery, rate: TaxRate,
) -> std::result::Result<ProductRecord, Rejection> {
    build_record(site, site.extractors().extract(page), query, rate)
}

/// Reconciles prices and enforces viability on already-extracted fields.
pub fn build_record(
    site: Site, extracted: Extracted, query: &ProductQuery, rate: TaxRate,
) -> std::result::Result<ProductRecord, Rejection> {
    let prices = reconcile(extracted.prices, rate);
    let record = ProductRecord {
        supplier: site.supplier().to_string(),
        item_code: extracted.item_code.unwrap_or_default(),
        name: extracted.name.unwrap_or_default(),
        model: extracted.model.unwrap_or_default(),
        price_excl_tax: prices.excl_tax,
        price_incl_tax: prices.incl_tax,
        url: query.url().to_string(),
        quantity: query.quantity(),
    };

    if record.is_viable() { Ok(record) } else { Err(Rejection::NoUsableData) }
}
