//! Input line intake shared by every backend.

use std::sync::atomic::Ordering;

use crate::message::{self, Message};
use crate::observability::metrics;

use super::Counters;

/// Decode one input line.
///
/// Blank lines are skipped. Lines that fail to decode are logged
/// and dropped; the run continues.
pub(crate) fn ingest(line: &[u8], counters: &Counters) -> Option<Message> {
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() {
        tracing::debug!("Skipping blank input line");
        return None;
    }

    counters.lines_read.fetch_add(1, Ordering::Relaxed);
    metrics::record_line_read();

    match message::decode(trimmed) {
        Ok(message) => {
            counters.decoded.fetch_add(1, Ordering::Relaxed);
            Some(message)
        }
        Err(e) => {
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            metrics::record_decode_error();
            tracing::warn!(
                line = %String::from_utf8_lossy(trimmed),
                error = %e,
                "Dropping undecodable input line"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_counts() {
        let counters = Counters::default();
        let line = hex::encode(b"1 abc 1\nGET / HTTP/1.1\r\n\r\n");

        assert!(ingest(b"   \n", &counters).is_none());
        assert!(ingest(b"zz-not-hex\n", &counters).is_none());
        let message = ingest(format!("{}\n", line).as_bytes(), &counters).unwrap();
        assert_eq!(message.id(), "abc");

        assert_eq!(counters.lines_read.load(Ordering::SeqCst), 2);
        assert_eq!(counters.decoded.load(Ordering::SeqCst), 1);
        assert_eq!(counters.dropped.load(Ordering::SeqCst), 1);
    }
}
