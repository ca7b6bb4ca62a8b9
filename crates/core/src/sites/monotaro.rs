//! MonotaRO product pages (`https://www.monotaro.com/p/<a>/<b>/`).

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use url::Url;

use crate::extract::{Cascade, ExtractorSet, Page, common};
use crate::fetch::{FetchProfile, PoliteDelay, RetryDelay};
use crate::price::{PricePair, numeric_tokens};

static PRODUCT_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/p/(\d+)/(\d+)").expect("valid monotaro path regex"));

/// Fastener-style sizes such as `M2.5×16` leading the title.
static TITLE_MODEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([A-Z0-9.\-]+[×x][A-Z0-9.\-]+)\s+").expect("valid title model regex"));

static TAX_INCLUDED_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"販売価格.*税込").expect("valid tax label regex"));

const MODEL_LABELS: &[&str] = &["型番", "品番", "SKU"];
const ITEM_CODE_LABELS: &[&str] = &["注文コード", "商品コード"];

pub(crate) fn matches(url: &Url) -> bool {
    let host_ok = url
        .host_str()
        .is_some_and(|host| host == "monotaro.com" || host.ends_with(".monotaro.com"));
    host_ok && PRODUCT_PATH_RE.is_match(url.path())
}

pub(crate) fn fetch_profile() -> FetchProfile {
    FetchProfile {
        block_statuses: vec![403],
        soft_block_markers: ["ログインしてください", "ログインが必要です", "アクセスが制限されています"]
            .into_iter()
            .map(String::from)
            .collect(),
        referer: None,
        retry_delay: RetryDelay::Fixed(Duration::from_secs(2)),
    }
}

pub(crate) const POLITE_DELAY: PoliteDelay = PoliteDelay::Fixed(Duration::from_millis(100));

fn heading(page: &Page<'_>) -> Option<String> {
    common::selector_text(page, "h1")
}

fn title(page: &Page<'_>) -> Option<String> {
    common::title_before(page, &["|"])
}

/// `<span class="AttributeLabelItem">品番M2.5×16</span>`
fn attribute_label(page: &Page<'_>) -> Option<String> {
    page.doc.select("span.AttributeLabelItem").ok()?.iter().find_map(|el| {
        let text = el.text();
        let (_, rest) = text.split_once("品番")?;
        common::clean_text(rest.trim_start_matches([':', '：', ' ']))
    })
}

fn labelled_model(page: &Page<'_>) -> Option<String> {
    common::labelled(page, MODEL_LABELS)
}

fn title_token(page: &Page<'_>) -> Option<String> {
    let title = page.doc.title()?;
    TITLE_MODEL_RE
        .captures(&title)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn labelled_item_code(page: &Page<'_>) -> Option<String> {
    common::labelled(page, ITEM_CODE_LABELS)
}

fn url_item_code(page: &Page<'_>) -> Option<String> {
    common::url_path_code(page, &PRODUCT_PATH_RE)
}

/// Selling price block: the excl-tax figure follows `.SellingPrice__Title`
/// and the incl-tax figure sits beside a `販売価格(税込)` reference label.
fn selling_price(page: &Page<'_>) -> Option<PricePair> {
    let excl_tax = page
        .doc
        .select_first(".SellingPrice__Title")
        .and_then(|anchor| page.doc.next_in_document(&anchor, "span.Price--Lg"))
        .and_then(|el| numeric_tokens(&el.text()).into_iter().next());

    let incl_tax = page.doc.select("span.ReferencePrice__Title").ok().and_then(|titles| {
        titles
            .iter()
            .filter(|el| TAX_INCLUDED_LABEL_RE.is_match(&el.text()))
            .find_map(|el| numeric_tokens(&el.parent()?.text()).last().copied())
    });

    PricePair::new(excl_tax, incl_tax).found()
}

pub(crate) static EXTRACTORS: ExtractorSet = ExtractorSet {
    name: Cascade::new(
        "name",
        &[
            ("h1", heading),
            ("og:title", common::og_title),
            ("title", title),
            ("json-ld", common::embedded_name),
        ],
    ),
    model: Cascade::new(
        "model",
        &[
            ("attribute-label", attribute_label),
            ("labelled", labelled_model),
            ("inline", common::inline_model),
            ("title-token", title_token),
        ],
    ),
    item_code: Cascade::new("item_code", &[("labelled", labelled_item_code), ("url", url_item_code)]),
    prices: Cascade::new(
        "prices",
        &[
            ("selling-price", selling_price),
            ("generic", common::generic_price),
            ("currency", common::currency_scan),
            ("json-ld", common::embedded_price),
        ],
    ),
};
