//! Plain-text rendering of structured records.

mod entry;

pub use entry::{format_entry, FIELD_LABELS, SEPARATOR_WIDTH};

