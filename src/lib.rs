//! Merges several RSS/Atom feeds into a single RSS 2.0 feed.

pub mod config;
pub mod feed;
pub mod pipeline;
pub mod util;
