//! Amazon.co.jp product pages (`/dp/<ASIN>` and `/gp/product/<ASIN>`).
//!
//! Prices on amazon.co.jp are always shown tax-included.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use url::Url;

use crate::extract::{Cascade, ExtractorSet, Page, common};
use crate::fetch::{FetchProfile, PoliteDelay, RetryDelay};
use crate::price::{PricePair, numeric_tokens};

static ASIN_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(?:dp|gp/product)/([A-Z0-9]{10})").expect("valid asin regex"));

const MODEL_LABELS: &[&str] =
    &["型番", "モデル番号", "品番", "メーカー型番", "Item model number", "Manufacturer Part Number"];
const ASIN_LABELS: &[&str] = &["ASIN"];

const DETAIL_TABLE_ROWS: &str =
    "#productDetails_techSpec_section_1 tr, #productDetails_detailBullets_sections1 tr, #productDetails_db_sections tr";

const OFFSCREEN_PRICE_SELECTORS: &[&str] = &[
    "#corePriceDisplay_desktop_feature_div .a-price .a-offscreen",
    "#apex_desktop .a-price .a-offscreen",
    "span.a-price .a-offscreen",
    "#priceblock_ourprice",
    "#priceblock_dealprice",
    "#priceblock_saleprice",
    "span#sns-base-price",
    ".apexPriceToPay .a-offscreen",
];

pub(crate) const REFERER: &str = "https://www.amazon.co.jp/";

pub(crate) fn matches(url: &Url) -> bool {
    let host_ok = matches!(url.host_str(), Some("amazon.co.jp" | "www.amazon.co.jp"));
    let path = url.path();
    host_ok && (path.contains("/dp/") || path.contains("/gp/product/"))
}

pub(crate) fn fetch_profile() -> FetchProfile {
    FetchProfile {
        block_statuses: vec![403, 429, 503],
        soft_block_markers: ["captcha", "robot check", "validatecaptcha"].into_iter().map(String::from).collect(),
        referer: Some(REFERER.to_string()),
        retry_delay: RetryDelay::Exponential {
            base: Duration::from_secs(2),
            jitter_min: Duration::from_millis(500),
            jitter_max: Duration::from_millis(1800),
        },
    }
}

pub(crate) const POLITE_DELAY: PoliteDelay =
    PoliteDelay::Random { min: Duration::from_secs(3), max: Duration::from_secs(6) };

fn product_title(page: &Page<'_>) -> Option<String> {
    common::selector_text(page, "#productTitle")
}

fn title(page: &Page<'_>) -> Option<String> {
    common::title_before(page, &[": Amazon"])
}

fn detail_table(page: &Page<'_>, labels: &[&str]) -> Option<String> {
    page.doc.table_row_value(DETAIL_TABLE_ROWS, labels).and_then(|v| common::clean_text(&v))
}

/// `<li><span class="a-text-bold">型番 ‏ : ‎</span><span>XYZ</span></li>`
fn detail_bullet(page: &Page<'_>, labels: &[&str]) -> Option<String> {
    let items = page.doc.select("#detailBullets_feature_div li").ok()?;
    items.iter().find_map(|li| {
        let bold = li.select_first("span.a-text-bold")?;
        let label = bold.text();
        let label = label.trim_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '：' | '\u{200e}' | '\u{200f}'));
        if !labels.iter().any(|candidate| label.contains(candidate)) {
            return None;
        }
        common::clean_text(&bold.next_sibling_element("span")?.spaced_text())
    })
}

fn table_model(page: &Page<'_>) -> Option<String> {
    detail_table(page, MODEL_LABELS)
}

fn bullet_model(page: &Page<'_>) -> Option<String> {
    detail_bullet(page, MODEL_LABELS)
}

fn labelled_model(page: &Page<'_>) -> Option<String> {
    common::labelled(page, MODEL_LABELS)
}

fn table_asin(page: &Page<'_>) -> Option<String> {
    detail_table(page, ASIN_LABELS)
}

fn bullet_asin(page: &Page<'_>) -> Option<String> {
    detail_bullet(page, ASIN_LABELS)
}

fn url_asin(page: &Page<'_>) -> Option<String> {
    common::url_path_code(page, &ASIN_PATH_RE)
}

fn offscreen_price(page: &Page<'_>) -> Option<PricePair> {
    OFFSCREEN_PRICE_SELECTORS.iter().find_map(|selector| {
        page.doc
            .select(selector)
            .ok()?
            .iter()
            .find_map(|el| numeric_tokens(&el.text()).into_iter().find(|price| *price > 0))
            .map(PricePair::incl_only)
    })
}

pub(crate) static EXTRACTORS: ExtractorSet = ExtractorSet {
    name: Cascade::new(
        "name",
        &[
            ("#productTitle", product_title),
            ("og:title", common::og_title),
            ("title", title),
            ("json-ld", common::embedded_name),
        ],
    ),
    model: Cascade::new(
        "model",
        &[
            ("detail-table", table_model),
            ("detail-bullets", bullet_model),
            ("labelled", labelled_model),
            ("inline", common::inline_model),
        ],
    ),
    item_code: Cascade::new(
        "item_code",
        &[("detail-table", table_asin), ("detail-bullets", bullet_asin), ("url", url_asin)],
    ),
    prices: Cascade::new(
        "prices",
        &[
            ("offscreen", offscreen_price),
            ("generic", common::generic_price),
            ("currency", common::currency_scan),
            ("json-ld", common::embedded_price),
        ],
    ),
};
