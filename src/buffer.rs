//! Streaming buffer manager
//!
//! A [`Buffer`] accumulates the raw bytes of one monitored source into a
//! whole-stream sink and, when any line rule is registered, a current-line
//! sink. Completed lines and interval boundaries drive the registered
//! extractors; the host calls [`Buffer::feed`] whenever bytes arrive and
//! [`Buffer::complete_interval`] once per monitoring tick.

use crate::extract::Extractor;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to a registered extractor. Registration returns a clone so
/// the host can read held values on demand while the buffer keeps driving
/// the rule.
pub type ExtractorSlot = Rc<RefCell<Extractor>>;

/// Per-source accumulation sinks and extraction rules.
pub struct Buffer {
    whole_sink: Vec<u8>,
    /// Materialized by the first line-rule registration
    line_sink: Option<Vec<u8>>,
    line_number: u64,
    whole_rules: Vec<ExtractorSlot>,
    line_rules: Vec<(u64, ExtractorSlot)>,
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Buffer {
    pub fn new() -> Self {
        Self {
            whole_sink: Vec::new(),
            line_sink: None,
            line_number: 1,
            whole_rules: Vec::new(),
            line_rules: Vec::new(),
        }
    }

    /// Register a rule fired with the whole-stream sink at interval end.
    /// Rules fire in registration order.
    pub fn register_whole(&mut self, extractor: Extractor) -> ExtractorSlot {
        let slot = Rc::new(RefCell::new(extractor));
        self.whole_rules.push(Rc::clone(&slot));
        slot
    }

    /// Register a rule fired when a line completes. `target_line == 0`
    /// fires on every line; `target_line == k` fires only when line `k`
    /// (1-based within the interval) completes.
    pub fn register_line(&mut self, target_line: u64, extractor: Extractor) -> ExtractorSlot {
        let slot = Rc::new(RefCell::new(extractor));
        self.line_rules.push((target_line, Rc::clone(&slot)));
        self.line_sink.get_or_insert_with(Vec::new);
        slot
    }

    /// 1-based number of the line currently being accumulated.
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// Append freshly acquired bytes. Feeding one byte at a time is
    /// indistinguishable from feeding the same bytes in bulk.
    pub fn feed(&mut self, bytes: &[u8]) {
        if self.line_sink.is_none() {
            self.whole_sink.extend_from_slice(bytes);
            return;
        }
        for &b in bytes {
            self.whole_sink.push(b);
            if b == b'\n' {
                self.fire_line_rules();
                if let Some(sink) = &mut self.line_sink {
                    sink.clear();
                }
                self.line_number += 1;
            } else if let Some(sink) = &mut self.line_sink {
                sink.push(b);
            }
        }
    }

    /// End the current monitoring interval: fire whole-stream rules with
    /// everything accumulated, then line rules matching the (possibly
    /// partial, possibly empty) trailing line, then reset both sinks and
    /// the line counter.
    pub fn complete_interval(&mut self) {
        log::trace!(
            "interval complete: {} bytes, ended on line {}",
            self.whole_sink.len(),
            self.line_number
        );
        for slot in &self.whole_rules {
            slot.borrow_mut().produce(&self.whole_sink);
        }
        if self.line_sink.is_some() {
            self.fire_line_rules();
        }
        self.whole_sink.clear();
        if let Some(sink) = &mut self.line_sink {
            sink.clear();
        }
        self.line_number = 1;
    }

    /// Fire every line rule targeting line 0 or the current line, with the
    /// current line sink content.
    fn fire_line_rules(&self) {
        let content: &[u8] = self.line_sink.as_deref().unwrap_or(&[]);
        for (target, slot) in &self.line_rules {
            if *target == 0 || *target == self.line_number {
                slot.borrow_mut().produce(content);
            }
        }
    }
}
