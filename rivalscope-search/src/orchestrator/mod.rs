//! Search orchestration: fan-out, domain grouping and source scoring.
//!
//! - [`search::search_all`] runs every (query × provider) call with a
//!   bounded in-flight pool and per-call timeouts
//! - [`dedup::group_by_domain`] merges raw hits into per-domain groups
//! - [`scoring`] turns provider tier and result position into a source score

pub mod dedup;
pub mod scoring;
pub mod search;
pub mod url_normalize;

pub use dedup::{DomainGroup, group_by_domain};
pub use search::{FanOutOptions, ProviderFailure, SearchReport, search_all};
pub use url_normalize::{is_same_site, normalize_domain};
