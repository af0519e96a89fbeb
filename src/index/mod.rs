//! Message index: the scanning loop, persistence, and queries over the result.

pub mod builder;
pub mod format;
pub mod indexer;
pub mod reader;
