pub mod batch;
pub mod config;
pub mod encoding;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod input;
pub mod metadata;
pub mod parse;
pub mod price;
pub mod reconcile;
pub mod record;
pub mod router;
pub mod sites;
pub mod workbook;

pub use batch::{BatchConfig, BatchEvent, BatchReport, BatchRunner, FailurePolicy, QueryOutcome};
pub use config::{AppConfig, ConfigParser, Setting, default_config_path, load_config};
pub use error::{ChumonError, FetchFailure, Rejection, Result};
pub use extract::{Cascade, Extracted, ExtractorSet, Page};
pub use fetch::{FetchConfig, FetchProfile, Fetcher, PageSource, PoliteDelay, RetryDelay, SavedPage, fetch_file};
pub use input::{parse_line, parse_queries, read_queries};
pub use metadata::EmbeddedProduct;
pub use parse::Document;
pub use price::PricePair;
pub use reconcile::{TaxRate, reconcile};
pub use record::{ProductQuery, ProductRecord, QueryState, assemble, build_record};
pub use router::{route, route_url};
pub use sites::Site;
pub use workbook::{DEFAULT_SHEET, WorkbookWriter, WriteMode, WriteSummary, write_records};
