//! The supported shops.
//!
//! Each shop is one [`Site`] variant. A variant knows how to recognise its
//! product URLs, how its responses should be judged and retried, how long to
//! wait between consecutive fetches, and which extraction cascades apply to
//! its pages.

mod akizuki;
mod amazon;
mod monotaro;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use url::Url;

use crate::extract::ExtractorSet;
use crate::fetch::{FetchProfile, PoliteDelay};
use crate::{ChumonError, Result};

/// A supported shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    Monotaro,
    Akizuki,
    Amazon,
}

impl Site {
    /// Every site, in routing order.
    pub const ALL: [Site; 3] = [Site::Monotaro, Site::Akizuki, Site::Amazon];

    /// Supplier name written to the メーカー column.
    pub fn supplier(&self) -> &'static str {
        match self {
            Site::Monotaro => "モノタロウ",
            Site::Akizuki => "秋月電子通商",
            Site::Amazon => "Amazon",
        }
    }

    /// Short key used in settings files and log fields.
    pub fn key(&self) -> &'static str {
        match self {
            Site::Monotaro => "monotaro",
            Site::Akizuki => "akizuki",
            Site::Amazon => "amazon",
        }
    }

    /// Whether `url` is a product page of this site.
    pub fn matches(&self, url: &Url) -> bool {
        match self {
            Site::Monotaro => monotaro::matches(url),
            Site::Akizuki => akizuki::matches(url),
            Site::Amazon => amazon::matches(url),
        }
    }

    pub fn fetch_profile(&self) -> FetchProfile {
        match self {
            Site::Monotaro => monotaro::fetch_profile(),
            Site::Akizuki => akizuki::fetch_profile(),
            Site::Amazon => amazon::fetch_profile(),
        }
    }

    /// Default pause between consecutive fetches.
    pub fn polite_delay(&self) -> PoliteDelay {
        match self {
            Site::Monotaro => monotaro::POLITE_DELAY,
            Site::Akizuki => akizuki::POLITE_DELAY,
            Site::Amazon => amazon::POLITE_DELAY,
        }
    }

    pub fn extractors(&self) -> &'static ExtractorSet {
        match self {
            Site::Monotaro => &monotaro::EXTRACTORS,
            Site::Akizuki => &akizuki::EXTRACTORS,
            Site::Amazon => &amazon::EXTRACTORS,
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Site {
    type Err = ChumonError;

    fn from_str(s: &str) -> Result<Self> {
        Site::ALL
            .into_iter()
            .find(|site| site.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ChumonError::ConfigError(format!("Unknown site: {s}")))
    }
}
