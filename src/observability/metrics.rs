//! Metrics collection.
//!
//! # Metrics
//! - `gor_lines_total` (counter): non-empty input lines read
//! - `gor_decode_errors_total` (counter): lines dropped by the codec
//! - `gor_messages_emitted_total` (counter): output lines, by category
//! - `gor_callback_failures_total` (counter): callbacks that failed or panicked
//! - `gor_write_errors_total` (counter): output lines that could not be written
//!
//! # Design Decisions
//! - Counters only; latency is left to the capture tool
//! - Labels are bounded: category, never exchange id

use crate::message::MessageType;

pub fn record_line_read() {
    ::metrics::counter!("gor_lines_total").increment(1);
}

pub fn record_decode_error() {
    ::metrics::counter!("gor_decode_errors_total").increment(1);
}

pub fn record_emitted(kind: MessageType) {
    ::metrics::counter!("gor_messages_emitted_total", "category" => kind.channel()).increment(1);
}

pub fn record_callback_failure() {
    ::metrics::counter!("gor_callback_failures_total").increment(1);
}

pub fn record_write_error() {
    ::metrics::counter!("gor_write_errors_total").increment(1);
}
