//! Mapping product URLs to the shop that serves them.

use url::Url;

use crate::sites::Site;

/// Picks the site whose product URLs include `url`.
///
/// Only `http` and `https` URLs are considered. Anything unparsable or
/// belonging to no supported shop is `None`.
pub fn route(url: &str) -> Option<Site> {
    let parsed = Url::parse(url.trim()).ok()?;
    route_url(&parsed)
}

pub fn route_url(url: &Url) -> Option<Site> {
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    Site::ALL.into_iter().find(|site| site.matches(url))
}
