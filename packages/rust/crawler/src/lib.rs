//! Crawl-side primitives: the URL frontier and the HTTP page fetcher.
//!
//! The crawl loop itself lives in `docbinder-core`; this crate owns the two
//! pieces of state it drives: the [`Frontier`] (dedup + FIFO queue +
//! admission) and the [`PageFetcher`] (reqwest client + retry policy).

pub mod fetch;
pub mod frontier;

pub use fetch::{PageFetcher, USER_AGENT};
pub use frontier::{Frontier, FrontierEntry, FrontierStats};
