// tapfetch-common/src/lib.rs
pub mod cache;
pub mod config;
pub mod credential;
pub mod error;
pub mod formula;
pub mod locator;

// Re-export key types
pub use cache::Cache;
pub use config::Config;
pub use credential::{Credential, CredentialResolver, CredentialSource, TokenScheme};
pub use error::{FetchError, Result};
pub use formula::Formula;
pub use locator::SourceLocator;
