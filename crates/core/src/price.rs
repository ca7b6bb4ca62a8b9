//! Price tokens and the excl/incl tax pair.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9０-９][0-9０-９,，]*").expect("valid number regex"));

/// A yen amount introduced by a half- or full-width yen sign.
static CURRENCY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[¥￥]\s*([0-9０-９][0-9０-９,，]*)").expect("valid currency regex"));

/// Tax-excluded and tax-included unit prices, either of which may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PricePair {
    pub excl_tax: Option<i64>,
    pub incl_tax: Option<i64>,
}

impl PricePair {
    pub fn new(excl_tax: Option<i64>, incl_tax: Option<i64>) -> Self {
        Self { excl_tax, incl_tax }
    }

    pub fn incl_only(incl_tax: i64) -> Self {
        Self { excl_tax: None, incl_tax: Some(incl_tax) }
    }

    pub fn excl_only(excl_tax: i64) -> Self {
        Self { excl_tax: Some(excl_tax), incl_tax: None }
    }

    pub fn is_empty(&self) -> bool {
        self.excl_tax.is_none() && self.incl_tax.is_none()
    }

    /// `None` when neither side is known, so strategies can end with `.found()`.
    pub fn found(self) -> Option<Self> {
        if self.is_empty() { None } else { Some(self) }
    }
}

/// Parses one numeric token, dropping thousands separators.
///
/// Full-width digits are accepted. Anything else left over after removing
/// separators makes the token invalid.
pub fn parse_price_token(token: &str) -> Option<i64> {
    let mut digits = String::with_capacity(token.len());
    for c in token.trim().chars() {
        match c {
            ',' | '，' => {}
            '0'..='9' => digits.push(c),
            '０'..='９' => digits.push(char::from(b'0' + (c as u32 - '０' as u32) as u8)),
            _ => return None,
        }
    }
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Every numeric token in `text`, in order of appearance.
pub fn numeric_tokens(text: &str) -> Vec<i64> {
    NUMBER_RE
        .find_iter(text)
        .filter_map(|m| parse_price_token(m.as_str()))
        .collect()
}

/// Yen amounts in `text` with the byte span of each match.
pub fn currency_amounts(text: &str) -> Vec<(i64, usize, usize)> {
    CURRENCY_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let value = parse_price_token(caps.get(1)?.as_str())?;
            Some((value, whole.start(), whole.end()))
        })
        .collect()
}

/// First yen amount in `text`.
pub fn first_currency_amount(text: &str) -> Option<i64> {
    currency_amounts(text).first().map(|(value, _, _)| *value)
}
