//! Typed extractors
//!
//! Each registered rule becomes one [`Extractor`]: a closed set of variants
//! sharing a single `produce` operation. An extractor owns its held value
//! and any persistent state (previous counter sample, compiled regex) and
//! holds only a weak reference to the output [`Variable`] it feeds.

use crate::scan;
use crate::variable::Variable;
use regex::{Regex, RegexBuilder};
use std::rc::Weak;

/// Whether a rule yields text or a number. Drives which getter the
/// registration layer exposes and the `S`/`N` letter in help output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Numeric,
}

/// A configured extraction rule with its held value and persistent state.
#[derive(Debug)]
pub struct Extractor {
    kind: Kind,
    variable: Option<Weak<Variable>>,
}

#[derive(Debug)]
enum Kind {
    /// Hold the entire sink content verbatim
    CopyAll { held: String },
    /// Hold the literal text captured by the first format conversion
    ScanfString { held: String, format: Vec<u8> },
    /// Hold the captured conversion parsed as a double
    ScanfNumber { held: f64, format: Vec<u8> },
    /// Hold the delta between consecutive unsigned counter readings
    ScanfCounter {
        held: f64,
        previous: Option<u64>,
        format: Vec<u8>,
    },
    /// Hold a regex capture group, or the whole line for `capture_index < 0`
    Regex {
        held: String,
        pattern: Regex,
        capture_index: i32,
    },
}

impl Extractor {
    pub fn copy_all(variable: Option<Weak<Variable>>) -> Self {
        Self {
            kind: Kind::CopyAll { held: String::new() },
            variable,
        }
    }

    pub fn scanf_string(format: &str, variable: Option<Weak<Variable>>) -> Self {
        Self {
            kind: Kind::ScanfString {
                held: String::new(),
                format: format.as_bytes().to_vec(),
            },
            variable,
        }
    }

    pub fn scanf_number(format: &str, variable: Option<Weak<Variable>>) -> Self {
        Self {
            kind: Kind::ScanfNumber {
                held: f64::NAN,
                format: format.as_bytes().to_vec(),
            },
            variable,
        }
    }

    pub fn scanf_counter(format: &str, variable: Option<Weak<Variable>>) -> Self {
        Self {
            kind: Kind::ScanfCounter {
                held: f64::NAN,
                previous: None,
                format: format.as_bytes().to_vec(),
            },
            variable,
        }
    }

    /// Compile a regex rule. Compilation happens once, here; a bad pattern
    /// is a fatal configuration error surfaced to the caller.
    pub fn regex(
        pattern: &str,
        capture_index: i32,
        case_insensitive: bool,
        variable: Option<Weak<Variable>>,
    ) -> Result<Self, regex::Error> {
        let compiled = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()?;
        Ok(Self {
            kind: Kind::Regex {
                held: String::new(),
                pattern: compiled,
                capture_index,
            },
            variable,
        })
    }

    pub fn kind(&self) -> ValueKind {
        match self.kind {
            Kind::ScanfNumber { .. } | Kind::ScanfCounter { .. } => ValueKind::Numeric,
            Kind::CopyAll { .. } | Kind::ScanfString { .. } | Kind::Regex { .. } => ValueKind::Text,
        }
    }

    /// Current numeric value; `None` for text-valued rules.
    pub fn value_num(&self) -> Option<f64> {
        match &self.kind {
            Kind::ScanfNumber { held, .. } | Kind::ScanfCounter { held, .. } => Some(*held),
            _ => None,
        }
    }

    /// Current text value; `None` for numeric rules.
    pub fn value_text(&self) -> Option<&str> {
        match &self.kind {
            Kind::CopyAll { held }
            | Kind::ScanfString { held, .. }
            | Kind::Regex { held, .. } => Some(held),
            _ => None,
        }
    }

    /// Run this rule against the given sink content. On success the held
    /// value is replaced and the output variable (if any) is marked dirty;
    /// on failure everything stays untouched and nothing is notified.
    pub fn produce(&mut self, sink: &[u8]) -> bool {
        let updated = match &mut self.kind {
            Kind::CopyAll { held } => {
                *held = String::from_utf8_lossy(sink).into_owned();
                true
            }
            Kind::ScanfString { held, format } => match scan::match_format(sink, format) {
                Some(m) => {
                    *held = String::from_utf8_lossy(&sink[m.start..m.end]).into_owned();
                    true
                }
                None => false,
            },
            Kind::ScanfNumber { held, format } => {
                match scan::match_format(sink, format)
                    .and_then(|m| scan::parse_number(&sink[m.start..m.end], m.conversion))
                {
                    Some(value) => {
                        *held = value;
                        true
                    }
                    None => false,
                }
            }
            Kind::ScanfCounter {
                held,
                previous,
                format,
            } => {
                match scan::match_format(sink, format)
                    .and_then(|m| scan::parse_counter(&sink[m.start..m.end], m.conversion))
                {
                    Some(reading) => {
                        // Wraparound delta first, then the no-baseline
                        // override; the first successful parse reports NaN
                        // but still records the reading.
                        let delta = previous.map(|p| reading.wrapping_sub(p) as f64);
                        *held = delta.unwrap_or(f64::NAN);
                        *previous = Some(reading);
                        true
                    }
                    None => false,
                }
            }
            Kind::Regex {
                held,
                pattern,
                capture_index,
            } => {
                // The sink is matched as a C string: stop at the first NUL
                let nul = sink.iter().position(|&b| b == 0).unwrap_or(sink.len());
                let text = String::from_utf8_lossy(&sink[..nul]);
                if *capture_index < 0 {
                    if pattern.is_match(&text) {
                        *held = text.into_owned();
                        true
                    } else {
                        false
                    }
                } else {
                    match pattern
                        .captures(&text)
                        .and_then(|caps| caps.get(*capture_index as usize))
                    {
                        Some(group) => {
                            *held = group.as_str().to_owned();
                            true
                        }
                        None => false,
                    }
                }
            }
        };

        if updated {
            if let Some(var) = self.variable.as_ref().and_then(Weak::upgrade) {
                var.mark_dirty();
            }
        } else {
            log::trace!("extractor did not match current sample");
        }
        updated
    }
}
