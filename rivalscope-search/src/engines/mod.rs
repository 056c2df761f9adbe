//! Built-in search providers.
//!
//! Each module provides a struct implementing [`crate::engine::SearchProvider`].
//! DuckDuckGo and Bing scrape HTML result pages; Brave uses its paid JSON API.

pub mod bing;
pub mod brave;
pub mod duckduckgo;

pub use bing::BingProvider;
pub use brave::BraveProvider;
pub use duckduckgo::DuckDuckGoProvider;
