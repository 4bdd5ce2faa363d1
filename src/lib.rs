//! rg-probe: streaming telemetry extraction for monitoring dashboards
//!
//! This library turns raw bytes produced by external data sources (command
//! output, file reads, polled device state) into typed, named values a
//! display layer reads on demand:
//! - Scanf-style format matching over byte spans
//! - A streaming buffer manager with whole-stream and per-line extraction
//!   rules, driven by byte feeds and interval ticks
//! - Typed extractors (copy, scanf string/number/counter, regex) with
//!   dirty-variable notification
//!
//! Acquisition of the bytes themselves and the scheduling of feeds and
//! ticks belong to the host; the core never performs I/O.

pub mod buffer;
pub mod extract;
pub mod rules;
pub mod scan;
pub mod variable;

// Re-export commonly used types
pub use buffer::{Buffer, ExtractorSlot};
pub use extract::{Extractor, ValueKind};
pub use rules::{emit_help, register_rule, Registration, RuleError};
pub use variable::Variable;
