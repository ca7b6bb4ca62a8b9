//! Akizuki Denshi product pages (`https://akizukidenshi.com/catalog/g/g<code>/`).
//!
//! The shop answers bursts with a "busy" or maintenance page served as
//! 200, so those phrases count as soft blocks.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use url::Url;

use crate::extract::{Cascade, ExtractorSet, Page, common};
use crate::fetch::{FetchProfile, PoliteDelay, RetryDelay};
use crate::price::PricePair;

static CATALOG_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/catalog/g/g(\d+)").expect("valid akizuki path regex"));

const MODEL_LABELS: &[&str] = &["型番", "型式", "品番"];
const ITEM_CODE_LABELS: &[&str] = &["販売コード", "商品コード"];

/// Characters either side of a yen amount searched for a tax hint.
const HINT_WINDOW: usize = 15;

pub(crate) fn matches(url: &Url) -> bool {
    url.host_str().is_some_and(|host| host.contains("akizukidenshi.com"))
}

pub(crate) fn fetch_profile() -> FetchProfile {
    FetchProfile {
        block_statuses: vec![403],
        soft_block_markers: ["アクセスが集中", "メンテナンス", "ただいま処理中"]
            .into_iter()
            .map(String::from)
            .collect(),
        referer: None,
        retry_delay: RetryDelay::Linear { base: Duration::from_millis(1000), step: Duration::from_millis(500) },
    }
}

pub(crate) const POLITE_DELAY: PoliteDelay = PoliteDelay::Fixed(Duration::from_millis(700));

fn goods_heading(page: &Page<'_>) -> Option<String> {
    common::selector_text(page, "h1.h1-goods-name")
}

fn heading(page: &Page<'_>) -> Option<String> {
    common::selector_text(page, "h1")
}

fn title(page: &Page<'_>) -> Option<String> {
    common::title_before(page, &["｜", "|", ":"])
}

fn spec_number(page: &Page<'_>) -> Option<String> {
    common::selector_text(page, "dd#spec_number")
}

fn labelled_model(page: &Page<'_>) -> Option<String> {
    common::labelled(page, MODEL_LABELS)
}

fn spec_goods(page: &Page<'_>) -> Option<String> {
    common::selector_text(page, "dd#spec_goods")
}

fn labelled_item_code(page: &Page<'_>) -> Option<String> {
    common::labelled(page, ITEM_CODE_LABELS)
}

fn url_item_code(page: &Page<'_>) -> Option<String> {
    common::url_path_code(page, &CATALOG_PATH_RE)
}

fn goods_price(page: &Page<'_>) -> Option<PricePair> {
    let price_of = |selector: &str| page.doc.select_first(selector).and_then(|el| common::element_price(&el));
    PricePair::new(price_of(".block-goods-price--net-price"), price_of(".block-goods-price--price")).found()
}

fn hinted_price(page: &Page<'_>) -> Option<PricePair> {
    common::hinted_currency_scan(page, HINT_WINDOW)
}

pub(crate) static EXTRACTORS: ExtractorSet = ExtractorSet {
    name: Cascade::new(
        "name",
        &[
            ("h1.h1-goods-name", goods_heading),
            ("h1", heading),
            ("og:title", common::og_title),
            ("title", title),
            ("json-ld", common::embedded_name),
        ],
    ),
    model: Cascade::new(
        "model",
        &[("spec-number", spec_number), ("labelled", labelled_model), ("inline", common::inline_model)],
    ),
    item_code: Cascade::new(
        "item_code",
        &[("spec-goods", spec_goods), ("labelled", labelled_item_code), ("url", url_item_code)],
    ),
    prices: Cascade::new(
        "prices",
        &[
            ("goods-price", goods_price),
            ("tax-hint", hinted_price),
            ("generic", common::generic_price),
            ("currency", common::currency_scan),
            ("json-ld", common::embedded_price),
        ],
    ),
};
