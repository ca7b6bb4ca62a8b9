//! Strategies shared by several sites.
//!
//! Site modules wrap these in small named functions so each cascade entry
//! stays a plain `fn` pointer.

use std::sync::LazyLock;

use regex::Regex;

use super::Page;
use crate::parse::Element;
use crate::price::{PricePair, currency_amounts, first_currency_amount, numeric_tokens};

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

static TAX_HINT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"税込|税抜|税別").expect("valid tax hint regex"));

/// `型番: ABC-123` style pairs in flattened page text.
static INLINE_MODEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:型番|型式|品番|モデル番号|メーカー型番)\s*[:：]\s*([^\s　|｜]+)").expect("valid inline model regex")
});

/// Collapses whitespace runs (including newlines) to single spaces and trims.
pub fn clean_text(text: &str) -> Option<String> {
    let cleaned = WHITESPACE_RE.replace_all(text.trim(), " ");
    if cleaned.is_empty() { None } else { Some(cleaned.into_owned()) }
}

/// Cleaned text of the first element matching `selector`.
pub fn selector_text(page: &Page<'_>, selector: &str) -> Option<String> {
    page.doc
        .select(selector)
        .ok()?
        .iter()
        .find_map(|el| clean_text(&el.spaced_text()))
}

/// `og:title` meta content.
pub fn og_title(page: &Page<'_>) -> Option<String> {
    page.doc.meta_content("og:title").and_then(|t| clean_text(&t))
}

/// The `<title>` cut at the earliest of `separators`.
///
/// A title without any separator is returned whole.
pub fn title_before(page: &Page<'_>, separators: &[&str]) -> Option<String> {
    let title = page.doc.title()?;
    let cut = separators.iter().filter_map(|sep| title.find(sep)).min().unwrap_or(title.len());
    clean_text(&title[..cut])
}

/// `name` of the embedded JSON-LD product.
pub fn embedded_name(page: &Page<'_>) -> Option<String> {
    page.doc.embedded_product()?.name.and_then(|n| clean_text(&n))
}

/// `sku` (or `mpn`) of the embedded JSON-LD product.
pub fn embedded_sku(page: &Page<'_>) -> Option<String> {
    page.doc.embedded_product()?.sku
}

/// Value next to a `dt`/`th` label containing one of `labels`.
pub fn labelled(page: &Page<'_>, labels: &[&str]) -> Option<String> {
    page.doc.labelled_value(labels).and_then(|v| clean_text(&v))
}

/// `label: value` in the visible page text.
pub fn inline_model(page: &Page<'_>) -> Option<String> {
    INLINE_MODEL_RE
        .captures(page.visible_text())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// All capture groups of the first match of `re` against the URL path,
/// concatenated.
pub fn url_path_code(page: &Page<'_>, re: &Regex) -> Option<String> {
    let caps = re.captures(page.url.path())?;
    let code: String = caps.iter().skip(1).flatten().map(|m| m.as_str()).collect();
    if code.is_empty() { None } else { Some(code) }
}

/// First number in an element's text, preferring a yen-prefixed amount.
pub fn element_price(el: &Element<'_>) -> Option<i64> {
    let text = el.spaced_text();
    first_currency_amount(&text).or_else(|| numeric_tokens(&text).into_iter().next())
}

fn is_price_like(el: &Element<'_>) -> bool {
    let attr_mentions_price =
        |name: &str| el.attr(name).is_some_and(|value| value.to_ascii_lowercase().contains("price"));
    attr_mentions_price("class") || attr_mentions_price("data-testid")
}

/// Largest numeric token inside any element whose class (or test id)
/// mentions "price", read as the tax-included price.
pub fn generic_price(page: &Page<'_>) -> Option<PricePair> {
    let candidates = page.doc.select("[class], [data-testid]").ok()?;
    candidates
        .iter()
        .filter(|el| is_price_like(el))
        .flat_map(|el| numeric_tokens(&el.spaced_text()))
        .max()
        .map(PricePair::incl_only)
}

/// First `¥`/`￥` amount in the visible text, read as tax-included.
pub fn currency_scan(page: &Page<'_>) -> Option<PricePair> {
    first_currency_amount(page.visible_text()).map(PricePair::incl_only)
}

/// Yen amounts labelled 税込 or 税抜/税別.
///
/// Each label belongs to the nearest amount within `window` characters, the
/// following one on a tie, so a label next to one price never leaks onto its
/// neighbour. An amount only fills both sides when it carries both labels.
pub fn hinted_currency_scan(page: &Page<'_>, window: usize) -> Option<PricePair> {
    let text = page.visible_text();
    let amounts = currency_amounts(text);
    let mut labels = vec![(false, false); amounts.len()];
    for hint in TAX_HINT_RE.find_iter(text) {
        let Some(owner) = nearest_amount(text, &amounts, hint.start(), hint.end(), window) else {
            continue;
        };
        if hint.as_str() == "税込" {
            labels[owner].0 = true;
        } else {
            labels[owner].1 = true;
        }
    }

    let mut prices = PricePair::default();
    for (&(value, _, _), (incl, excl)) in amounts.iter().zip(labels) {
        if incl && prices.incl_tax.is_none() {
            prices.incl_tax = Some(value);
        }
        if excl && prices.excl_tax.is_none() {
            prices.excl_tax = Some(value);
        }
    }
    prices.found()
}

/// Index of the amount closest to the label spanning `start..end`.
fn nearest_amount(
    text: &str, amounts: &[(i64, usize, usize)], start: usize, end: usize, window: usize,
) -> Option<usize> {
    let next_index = amounts.iter().position(|&(_, amount_start, _)| amount_start >= end);
    let prev_index = next_index.unwrap_or(amounts.len()).checked_sub(1);

    let before = prev_index
        .map(|i| (i, text[amounts[i].2..start].chars().count()))
        .filter(|&(_, distance)| distance <= window);
    let after = next_index
        .map(|i| (i, text[end..amounts[i].1].chars().count()))
        .filter(|&(_, distance)| distance <= window);

    match (before, after) {
        (Some((prev, before)), Some((next, after))) => Some(if before < after { prev } else { next }),
        (Some((prev, _)), None) => Some(prev),
        (None, Some((next, _))) => Some(next),
        (None, None) => None,
    }
}

/// Offer price of the embedded JSON-LD product, read as tax-included.
pub fn embedded_price(page: &Page<'_>) -> Option<PricePair> {
    page.doc.embedded_product()?.price.map(PricePair::incl_only)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::Document;
    use url::Url;

    fn with_page<R>(html: &str, url: &str, f: impl FnOnce(&Page<'_>) -> R) -> R {
        let doc = Document::parse(html);
        let url = Url::parse(url).unwrap();
        let page = Page::new(&doc, &url);
        f(&page)
    }

    #[test]
    fn test_title_before_separator() {
        let name = with_page("<title>Widget A | SiteX</title>", "https://x.example/", |p| title_before(p, &["|"]));
        assert_eq!(name, Some("Widget A".to_string()));
    }

    #[test]
    fn test_title_before_earliest_separator() {
        let name = with_page("<title>抵抗 1kΩ：秋月｜通販</title>", "https://x.example/", |p| {
            title_before(p, &["｜", "|", "："])
        });
        assert_eq!(name, Some("抵抗 1kΩ".to_string()));
    }

    #[test]
    fn test_title_without_separator_is_whole() {
        let name = with_page("<title> Plain </title>", "https://x.example/", |p| title_before(p, &["|"]));
        assert_eq!(name, Some("Plain".to_string()));
    }

    #[test]
    fn test_generic_price_picks_largest_token() {
        let html = r#"
            <div class="itemPrice"><span>120</span></div>
            <span class="PriceBox">1,980</span>
            <span class="sale-price">980</span>
            <span class="other">99999</span>
        "#;
        let prices = with_page(html, "https://x.example/", generic_price);
        assert_eq!(prices, Some(PricePair::incl_only(1980)));
    }

    #[test]
    fn test_generic_price_absent() {
        let prices = with_page(r#"<span class="total">500</span>"#, "https://x.example/", generic_price);
        assert_eq!(prices, None);
    }

    #[test]
    fn test_currency_scan_ignores_scripts() {
        let html = r#"<script>var p = "¥1";</script><p>価格 ￥2,500</p>"#;
        let prices = with_page(html, "https://x.example/", currency_scan);
        assert_eq!(prices, Some(PricePair::incl_only(2500)));
    }

    #[test]
    fn test_hinted_currency_scan() {
        let html = "<p>￥1,100（税込）</p><p>￥1,000（税抜）</p><p>￥50</p>";
        let prices = with_page(html, "https://x.example/", |p| hinted_currency_scan(p, 15));
        assert_eq!(prices, Some(PricePair::new(Some(1000), Some(1100))));
    }

    #[test]
    fn test_hinted_currency_scan_label_before_amount() {
        let html = "<p>税込 ￥1,100</p><p>税抜 ￥1,000</p>";
        let prices = with_page(html, "https://x.example/", |p| hinted_currency_scan(p, 15));
        assert_eq!(prices, Some(PricePair::new(Some(1000), Some(1100))));
    }

    #[test]
    fn test_hinted_currency_scan_single_label_fills_one_side() {
        let html = "<p>￥1,100（税込）</p><p>送料 ￥500</p>";
        let prices = with_page(html, "https://x.example/", |p| hinted_currency_scan(p, 15));
        assert_eq!(prices, Some(PricePair::incl_only(1100)));
    }

    #[test]
    fn test_hinted_currency_scan_ignores_distant_labels() {
        let html = "<p>価格はすべて税込表示です。詳しくはお問い合わせください。</p><p>在庫あり ￥2,000</p>";
        let prices = with_page(html, "https://x.example/", |p| hinted_currency_scan(p, 15));
        assert_eq!(prices, None);
    }

    #[test]
    fn test_inline_model() {
        let html = "<div>仕様<br>型番：AE-ATM0P<br>メーカー：秋月</div>";
        let model = with_page(html, "https://x.example/", inline_model);
        assert_eq!(model, Some("AE-ATM0P".to_string()));
    }

    #[test]
    fn test_url_path_code_concatenates_groups() {
        static RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/p/(\d+)/(\d+)").unwrap());
        let code = with_page("", "https://www.monotaro.com/p/0123/4567/", |p| url_path_code(p, &RE));
        assert_eq!(code, Some("01234567".to_string()));
    }

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  a \n\t b  "), Some("a b".to_string()));
        assert_eq!(clean_text(" \n "), None);
    }
}
