//! Byte-level access to the MBOX: positional block reads and message fetches.

pub mod block;
pub mod reader;
