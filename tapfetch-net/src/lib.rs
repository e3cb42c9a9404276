// tapfetch-net/src/lib.rs
pub mod fetcher;
pub mod github;
pub mod http;
pub mod validation;

pub use fetcher::{AuthenticatedArchiveFetcher, FetchOutcome, FetchPhase, FetchRequest};
pub use tapfetch_common::{
    cache::Cache,
    config::Config,
    error::{FetchError, Result},
    formula::Formula,
    locator::SourceLocator,
};
pub use validation::{sha256_file, validate_url, verify_checksum};
