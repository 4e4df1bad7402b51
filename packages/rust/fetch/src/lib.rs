//! HTTP fetching and main-content extraction for web sources.
//!
//! This crate provides:
//! - [`Fetcher`]: a configured HTTP client that refuses private hosts
//! - [`readability`]: picks the article body out of a full HTML page

mod client;
mod guard;
pub mod readability;

pub use client::{FetchedPage, Fetcher, USER_AGENT};
pub use guard::{is_private_ip, is_ssrf_target};
pub use readability::{Readable, extract_readable};
