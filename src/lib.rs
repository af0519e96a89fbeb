//! `mboxseek`: random-access indexing for MBOX files of any size.
//!
//! This crate scans an MBOX in fixed-size blocks, records where every message
//! starts and how long its header block and body are, and then fetches any
//! single message with one exact-length read.
//!
//! ```no_run
//! use mboxseek::index::indexer::{MessageIndexer, ScanOptions};
//! use mboxseek::store::reader::MessageReader;
//!
//! # fn main() -> mboxseek::error::Result<()> {
//! let file = std::fs::File::open("inbox.mbox")?;
//! let indexer = MessageIndexer::new(&file, &ScanOptions::default())?;
//! let entries = indexer.index_all()?;
//! let reader = MessageReader::new(&file)?;
//! let raw = reader.read_message(&entries[0])?;
//! # let _ = raw;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod index;
pub mod model;
pub mod parser;
pub mod store;
