//! MBOX format detection, block-wise boundary scanning and header parsing.

pub mod format;
pub mod header;
pub mod scan;
