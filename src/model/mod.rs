//! Core data model types: message descriptors, header maps, line terminators.

pub mod headers;
pub mod message;
pub mod terminator;
