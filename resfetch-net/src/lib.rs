// resfetch-net/src/lib.rs
pub mod http;
pub mod mirror;
pub mod resolver;
pub mod validation;

pub use http::HttpResolver;
pub use mirror::MirrorResolver;
pub use resfetch_common::{
    error::{FetchError, Result},
    Config, Requirement,
};
pub use resolver::{RemoteResolver, Resolver};
pub use validation::{parse_hash_sidecar, validate_url};
