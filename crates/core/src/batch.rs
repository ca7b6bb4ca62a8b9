//! Sequential batch processing.
//!
//! Queries are processed strictly one at a time, in input order, with the
//! site's polite delay between consecutive fetches. Outcomes come back in
//! the same order as the queries.
//!
//! With [`FailurePolicy::FailFast`] the batch stops at the first fetch
//! failure or page without usable data. With [`FailurePolicy::CollectAll`]
//! it keeps going and reports every outcome. URLs of unsupported sites are
//! recorded and skipped under both policies.
//!
//! # Example
//!
//! ```rust,no_run
//! use chumon_core::batch::{BatchConfig, BatchRunner, FailurePolicy};
//! use chumon_core::fetch::SavedPage;
//! use chumon_core::record::ProductQuery;
//!
//! # async fn demo() -> chumon_core::Result<()> {
//! let source = SavedPage::from_file("saved/product.html")?;
//! let config = BatchConfig { policy: FailurePolicy::CollectAll, ..Default::default() };
//! let runner = BatchRunner::new(source, config);
//!
//! let queries = vec![ProductQuery::new("https://www.monotaro.com/p/1234/5678/", 2)?];
//! let report = runner.run(&queries, |event| println!("{}: {}", event.query.url(), event.state)).await;
//! assert_eq!(report.outcomes.len(), 1);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::extract::Page;
use crate::fetch::PageSource;
use crate::parse::Document;
use crate::reconcile::TaxRate;
use crate::record::{ProductQuery, ProductRecord, QueryState, assemble};
use crate::router::route_url;
use crate::sites::Site;
use crate::{ChumonError, Rejection};

/// What a batch does after a hard per-query failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop at the first fetch failure or page without usable data.
    #[default]
    FailFast,
    /// Process every query and report all failures at the end.
    CollectAll,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::FailFast => f.write_str("fail-fast"),
            FailurePolicy::CollectAll => f.write_str("collect-all"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = ChumonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "fail-fast" | "failfast" => Ok(FailurePolicy::FailFast),
            "collect-all" | "collectall" => Ok(FailurePolicy::CollectAll),
            other => Err(ChumonError::ConfigError(format!("Unknown failure policy: {other}"))),
        }
    }
}

/// Per-run settings for a [`BatchRunner`].
#[derive(Debug, Clone, Default)]
pub struct BatchConfig {
    pub policy: FailurePolicy,
    pub tax_rate: TaxRate,
    /// Replaces every site's polite delay. `Some(Duration::ZERO)` disables it.
    pub polite_delay: Option<Duration>,
    /// Per-site replacements, consulted after `polite_delay`.
    pub site_delays: HashMap<Site, Duration>,
    /// Checked between queries. Setting it stops the batch before the next
    /// query starts.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl BatchConfig {
    /// Pause before fetching a page of `site` when another fetch preceded it.
    pub fn delay_for(&self, site: Site) -> Duration {
        self.polite_delay
            .or_else(|| self.site_delays.get(&site).copied())
            .unwrap_or_else(|| site.polite_delay().sample())
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// A state transition of one query, reported while the batch runs.
#[derive(Debug, Clone, Copy)]
pub struct BatchEvent<'a> {
    /// Position of the query in the input.
    pub index: usize,
    pub query: &'a ProductQuery,
    pub state: &'a QueryState,
}

/// Terminal result of one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutcome {
    pub query: ProductQuery,
    pub site: Option<Site>,
    pub result: Result<ProductRecord, Rejection>,
}

impl QueryOutcome {
    pub fn state(&self) -> QueryState {
        match &self.result {
            Ok(_) => QueryState::Accepted,
            Err(rejection) => QueryState::Rejected(rejection.clone()),
        }
    }
}

/// Everything a batch produced.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// One entry per processed query, in input order.
    pub outcomes: Vec<QueryOutcome>,
    /// Queries never started because the batch stopped early.
    pub skipped: usize,
    /// Stopped by a hard failure under [`FailurePolicy::FailFast`].
    pub aborted: bool,
    /// Stopped by the cancellation flag.
    pub cancelled: bool,
}

impl BatchReport {
    pub fn records(&self) -> Vec<&ProductRecord> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok()).collect()
    }

    pub fn into_records(self) -> Vec<ProductRecord> {
        self.outcomes.into_iter().filter_map(|o| o.result.ok()).collect()
    }

    pub fn rejections(&self) -> Vec<(&ProductQuery, &Rejection)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|rejection| (&o.query, rejection)))
            .collect()
    }

    pub fn accepted_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn rejected_count(&self) -> usize {
        self.outcomes.len() - self.accepted_count()
    }
}

/// Drives queries through routing, fetching, extraction and assembly.
pub struct BatchRunner<S> {
    source: S,
    config: BatchConfig,
}

impl<S: PageSource> BatchRunner<S> {
    pub fn new(source: S, config: BatchConfig) -> Self {
        Self { source, config }
    }

    /// Processes `queries` in order, calling `on_event` for every state
    /// transition.
    pub async fn run<F>(&self, queries: &[ProductQuery], mut on_event: F) -> BatchReport
    where
        F: FnMut(BatchEvent<'_>),
    {
        let mut report = BatchReport::default();
        let mut fetched_before = false;

        for (index, query) in queries.iter().enumerate() {
            if self.config.is_cancelled() {
                tracing::info!(index, "batch cancelled");
                report.cancelled = true;
                break;
            }

            let outcome = self.run_query(index, query, &mut fetched_before, &mut on_event).await;
            let hard_failure = outcome.result.as_ref().err().is_some_and(Rejection::is_hard);
            report.outcomes.push(outcome);

            if hard_failure && self.config.policy == FailurePolicy::FailFast {
                tracing::info!(index, "stopping batch after failure");
                report.aborted = true;
                break;
            }
        }

        report.skipped = queries.len() - report.outcomes.len();
        report
    }

    async fn run_query<F>(
        &self, index: usize, query: &ProductQuery, fetched_before: &mut bool, on_event: &mut F,
    ) -> QueryOutcome
    where
        F: FnMut(BatchEvent<'_>),
    {
        let mut emit = |state: &QueryState| on_event(BatchEvent { index, query, state });
        emit(&QueryState::Pending);

        let routed = Url::parse(query.url()).ok().and_then(|url| route_url(&url).map(|site| (url, site)));
        let Some((url, site)) = routed else {
            return self.finish(query, None, Err(Rejection::UnknownSite), &mut emit);
        };
        emit(&QueryState::Routed(site));

        if *fetched_before {
            let delay = self.config.delay_for(site);
            if !delay.is_zero() {
                tracing::debug!(site = %site, delay_ms = delay.as_millis() as u64, "polite delay");
                tokio::time::sleep(delay).await;
            }
        }
        *fetched_before = true;

        let markup = match self.source.fetch_page(query.url(), &site.fetch_profile()).await {
            Ok(markup) => markup,
            Err(failure) => return self.finish(query, Some(site), Err(Rejection::FetchFailed(failure)), &mut emit),
        };
        emit(&QueryState::Fetched);

        let result = {
            let doc = Document::parse(&markup);
            let page = Page::new(&doc, &url);
            assemble(site, &page, query, self.config.tax_rate)
        };
        emit(&QueryState::Extracted);

        self.finish(query, Some(site), result, &mut emit)
    }

    fn finish(
        &self, query: &ProductQuery, site: Option<Site>, result: Result<ProductRecord, Rejection>,
        emit: &mut impl FnMut(&QueryState),
    ) -> QueryOutcome {
        let outcome = QueryOutcome { query: query.clone(), site, result };
        match &outcome.result {
            Ok(record) => tracing::info!(url = query.url(), name = %record.name, "accepted"),
            Err(rejection) => tracing::info!(url = query.url(), reason = %rejection, "rejected"),
        }
        emit(&outcome.state());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FetchFailure;
    use crate::fetch::FetchProfile;
    use std::collections::HashMap as Map;

    /// Serves canned responses keyed by URL.
    struct CannedPages(Map<&'static str, Result<&'static str, FetchFailure>>);

    impl PageSource for CannedPages {
        async fn fetch_page(&self, url: &str, _profile: &FetchProfile) -> Result<String, FetchFailure> {
            match self.0.get(url) {
                Some(Ok(markup)) => Ok(markup.to_string()),
                Some(Err(failure)) => Err(failure.clone()),
                None => Err(FetchFailure::HttpError(404)),
            }
        }
    }

    const GOOD: &str = "https://www.monotaro.com/p/1111/2222/";
    const EMPTY: &str = "https://www.monotaro.com/p/3333/4444/";
    const BLOCKED: &str = "https://akizukidenshi.com/catalog/g/g100/";
    const UNKNOWN: &str = "https://www.rakuten.co.jp/item/1";

    /// The item code from the URL would make any page viable, so the
    /// "empty" page is served under a URL whose code cannot be read.
    fn runner(policy: FailurePolicy) -> BatchRunner<CannedPages> {
        let pages = Map::from([
            (GOOD, Ok("<h1>Hex bolt</h1><span class=\"price\">￥550</span>")),
            (EMPTY, Ok("<html><body></body></html>")),
            (BLOCKED, Err(FetchFailure::BotBlocked)),
            ("https://akizukidenshi.com/", Ok("<html><body><p>no product</p></body></html>")),
        ]);
        let config = BatchConfig { policy, polite_delay: Some(Duration::ZERO), ..Default::default() };
        BatchRunner::new(CannedPages(pages), config)
    }

    fn queries(urls: &[&str]) -> Vec<ProductQuery> {
        urls.iter().map(|url| ProductQuery::new(*url, 1).unwrap()).collect()
    }

    #[test]
    fn test_failure_policy_parse() {
        assert_eq!("fail-fast".parse::<FailurePolicy>().unwrap(), FailurePolicy::FailFast);
        assert_eq!("COLLECT_ALL".parse::<FailurePolicy>().unwrap(), FailurePolicy::CollectAll);
        assert!("sometimes".parse::<FailurePolicy>().is_err());
        assert_eq!(FailurePolicy::default(), FailurePolicy::FailFast);
    }

    #[test]
    fn test_delay_override_order() {
        let mut config = BatchConfig::default();
        config.site_delays.insert(Site::Amazon, Duration::from_millis(10));
        assert_eq!(config.delay_for(Site::Amazon), Duration::from_millis(10));
        assert_eq!(config.delay_for(Site::Akizuki), Duration::from_millis(700));
        config.polite_delay = Some(Duration::ZERO);
        assert_eq!(config.delay_for(Site::Amazon), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_fail_fast_stops_at_no_usable_data() {
        let runner = runner(FailurePolicy::FailFast);
        let report = runner.run(&queries(&[GOOD, "https://akizukidenshi.com/", GOOD]), |_| {}).await;

        assert!(report.aborted);
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.outcomes[1].result, Err(Rejection::NoUsableData));
        assert_eq!(report.records().len(), 1);
    }

    #[tokio::test]
    async fn test_collect_all_keeps_going() {
        let runner = runner(FailurePolicy::CollectAll);
        let report = runner.run(&queries(&["https://akizukidenshi.com/", GOOD, BLOCKED]), |_| {}).await;

        assert!(!report.aborted);
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.accepted_count(), 1);
        assert_eq!(report.rejected_count(), 2);
        assert_eq!(report.outcomes[2].result, Err(Rejection::FetchFailed(FetchFailure::BotBlocked)));

        let record = report.records()[0];
        assert_eq!(record.name, "Hex bolt");
        assert_eq!(record.price_incl_tax, Some(550));
        assert_eq!(record.price_excl_tax, Some(500));
    }

    #[tokio::test]
    async fn test_unknown_site_does_not_abort_fail_fast() {
        let runner = runner(FailurePolicy::FailFast);
        let report = runner.run(&queries(&[UNKNOWN, GOOD]), |_| {}).await;

        assert!(!report.aborted);
        assert_eq!(report.outcomes[0].result, Err(Rejection::UnknownSite));
        assert_eq!(report.outcomes[0].site, None);
        assert!(report.outcomes[1].result.is_ok());
    }

    #[tokio::test]
    async fn test_item_code_alone_is_viable() {
        let runner = runner(FailurePolicy::FailFast);
        let report = runner.run(&queries(&[EMPTY]), |_| {}).await;
        let record = report.records()[0].clone();
        assert_eq!(record.item_code, "33334444");
        assert_eq!(record.name, "");
    }

    #[tokio::test]
    async fn test_events_follow_state_machine() {
        let runner = runner(FailurePolicy::CollectAll);
        let mut states = Vec::new();
        runner
            .run(&queries(&[GOOD, UNKNOWN]), |event| states.push((event.index, event.state.clone())))
            .await;

        assert_eq!(
            states,
            vec![
                (0, QueryState::Pending),
                (0, QueryState::Routed(Site::Monotaro)),
                (0, QueryState::Fetched),
                (0, QueryState::Extracted),
                (0, QueryState::Accepted),
                (1, QueryState::Pending),
                (1, QueryState::Rejected(Rejection::UnknownSite)),
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_flag_checked_between_queries() {
        let mut runner = runner(FailurePolicy::CollectAll);
        let flag = Arc::new(AtomicBool::new(false));
        runner.config.cancel = Some(flag.clone());

        let report = runner
            .run(&queries(&[GOOD, GOOD, GOOD]), |event| {
                if event.state.is_terminal() {
                    flag.store(true, Ordering::Relaxed);
                }
            })
            .await;

        assert!(report.cancelled);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.skipped, 2);
    }
}
