//! Index querying utilities.

use std::collections::HashMap;

use crate::model::message::MessageDescriptor;

/// Count how many entries took their body length from `Content-Length`.
pub fn count_declared(entries: &[MessageDescriptor]) -> usize {
    entries.iter().filter(|e| e.content_length_declared).count()
}

/// Sum of the bytes covered by all entries, saturating at `u64::MAX`.
pub fn total_bytes(entries: &[MessageDescriptor]) -> u64 {
    entries
        .iter()
        .fold(0u64, |acc, e| acc.saturating_add(e.total_length))
}

/// The entry with the largest `total_length`, if any.
pub fn largest(entries: &[MessageDescriptor]) -> Option<&MessageDescriptor> {
    entries.iter().max_by_key(|e| e.total_length)
}

/// Return the top N senders (first `From` header, trimmed) by message count.
pub fn top_senders(entries: &[MessageDescriptor], n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for entry in entries {
        let sender = entry
            .headers
            .first("From")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("(unknown)");
        *counts.entry(sender.to_string()).or_default() += 1;
    }
    let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(n);
    sorted
}
