// resfetch-core/src/lib.rs

pub mod cache;
pub mod fetcher;
pub mod materialize;
pub mod rewrite;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types for easier use by the CLI crate
pub use cache::HashCache;
pub use fetcher::{fetch_from_config, FetchOptions, FetchReport, Fetcher, ReportEntry, Stage};
pub use materialize::{Materialized, Materializer};
pub use rewrite::{HefStemLayout, RewriteRules, SourceRewrite};
