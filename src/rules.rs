//! Rule grammar parsing and registration
//!
//! Rules are colon-delimited strings handed over by the host's
//! configuration layer:
//!
//! ```text
//! read:<rule>
//! readline:<N>:<rule>
//! ```
//!
//! where `<rule>` is one of `all`, `scanf:{string|str|s}:<format>`,
//! `scanf:{number|num|n}:<format>`, `scanf:{counter|count|c}:<format>`,
//! `grep:<regex>:<capture-index>` or `igrep:<regex>:<capture-index>`.
//! Scanf formats are the remainder of the rule string, so they may contain
//! colons; grep capture indexes are split off the last colon for the same
//! reason. `readline:0` fires on every completed line, `readline:k` only
//! when line `k` (1-based) completes within the interval.

use crate::buffer::{Buffer, ExtractorSlot};
use crate::extract::{Extractor, ValueKind};
use crate::variable::Variable;
use std::rc::{Rc, Weak};
use thiserror::Error;

/// Fatal configuration-time rule errors.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("unknown rule keyword `{0}`")]
    UnknownKeyword(String),
    #[error("rule `{0}` is missing a required token")]
    MissingToken(String),
    #[error("unexpected trailing tokens `{0}`")]
    TrailingTokens(String),
    #[error("invalid line number `{0}`")]
    BadLineNumber(String),
    #[error("unknown scanf kind `{0}`")]
    BadScanfKind(String),
    #[error("invalid capture index `{0}`")]
    BadCaptureIndex(String),
    #[error("bad regex pattern `{pattern}`: {source}")]
    BadPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A successfully registered rule: the shared extractor slot plus the
/// value kind that gates the numeric/text getters.
#[derive(Debug)]
pub struct Registration {
    slot: ExtractorSlot,
    kind: ValueKind,
}

impl Registration {
    /// Opaque handle to the underlying extractor.
    pub fn handle(&self) -> &ExtractorSlot {
        &self.slot
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Current numeric value; `None` for string-valued rules.
    pub fn number(&self) -> Option<f64> {
        self.slot.borrow().value_num()
    }

    /// Current text value; `None` for numeric rules.
    pub fn text(&self) -> Option<String> {
        self.slot.borrow().value_text().map(str::to_owned)
    }
}

/// Parse a rule string and register the resulting extractor with `buffer`.
/// The variable, when given, is marked dirty after every successful
/// produce; the core holds only a weak reference to it.
pub fn register_rule(
    buffer: &mut Buffer,
    rule: &str,
    variable: Option<&Rc<Variable>>,
) -> Result<Registration, RuleError> {
    let weak = variable.map(Rc::downgrade);
    let (keyword, rest) = split_token(rule);

    let registration = match keyword {
        "read" => {
            let body = rest.ok_or_else(|| RuleError::MissingToken(rule.to_string()))?;
            let extractor = parse_body(rule, body, weak)?;
            let kind = extractor.kind();
            Registration {
                slot: buffer.register_whole(extractor),
                kind,
            }
        }
        "readline" => {
            let body = rest.ok_or_else(|| RuleError::MissingToken(rule.to_string()))?;
            let (line_token, body) = split_token(body);
            let target: u64 = line_token
                .parse()
                .map_err(|_| RuleError::BadLineNumber(line_token.to_string()))?;
            let body = body.ok_or_else(|| RuleError::MissingToken(rule.to_string()))?;
            let extractor = parse_body(rule, body, weak)?;
            let kind = extractor.kind();
            Registration {
                slot: buffer.register_line(target, extractor),
                kind,
            }
        }
        other => return Err(RuleError::UnknownKeyword(other.to_string())),
    };

    log::debug!(
        "registered rule `{}` for variable `{}`",
        rule,
        variable.map(|v| v.name()).unwrap_or("<unnamed>")
    );
    Ok(registration)
}

/// One line per supported rule path: `"<S|N> <module>:<option>:<template>"`.
/// `S` marks string-valued rules, `N` numeric ones. Documentation only.
pub fn emit_help(module: &str, option: &str) -> String {
    const TEMPLATES: &[(char, &str)] = &[
        ('S', "all"),
        ('S', "scanf:str:<format>"),
        ('N', "scanf:num:<format>"),
        ('N', "scanf:count:<format>"),
        ('S', "grep:<regex>:<capture-index>"),
        ('S', "igrep:<regex>:<capture-index>"),
    ];

    let mut out = String::new();
    for (letter, template) in TEMPLATES {
        out.push_str(&format!("{} {}:{}:read:{}\n", letter, module, option, template));
    }
    for (letter, template) in TEMPLATES {
        out.push_str(&format!(
            "{} {}:{}:readline:<N>:{}\n",
            letter, module, option, template
        ));
    }
    out
}

/// Split off the token before the first colon. The remainder keeps any
/// further colons intact.
fn split_token(s: &str) -> (&str, Option<&str>) {
    match s.split_once(':') {
        Some((head, tail)) => (head, Some(tail)),
        None => (s, None),
    }
}

/// Parse the `<rule>` body shared by `read` and `readline`. `rule` is the
/// full original string, used for error messages.
fn parse_body(
    rule: &str,
    body: &str,
    variable: Option<Weak<Variable>>,
) -> Result<Extractor, RuleError> {
    let (name, rest) = split_token(body);
    match name {
        "all" => match rest {
            None => Ok(Extractor::copy_all(variable)),
            Some(extra) => Err(RuleError::TrailingTokens(extra.to_string())),
        },
        "scanf" => {
            let rest = rest.ok_or_else(|| RuleError::MissingToken(rule.to_string()))?;
            let (kind, format) = split_token(rest);
            let format = match format {
                Some(f) if !f.is_empty() => f,
                _ => return Err(RuleError::MissingToken(rule.to_string())),
            };
            match kind {
                "string" | "str" | "s" => Ok(Extractor::scanf_string(format, variable)),
                "number" | "num" | "n" => Ok(Extractor::scanf_number(format, variable)),
                "counter" | "count" | "c" => Ok(Extractor::scanf_counter(format, variable)),
                other => Err(RuleError::BadScanfKind(other.to_string())),
            }
        }
        "grep" | "igrep" => {
            let rest = rest.ok_or_else(|| RuleError::MissingToken(rule.to_string()))?;
            // The capture index sits after the last colon so the pattern
            // itself may contain colons
            let (pattern, index_token) = rest
                .rsplit_once(':')
                .ok_or_else(|| RuleError::MissingToken(rule.to_string()))?;
            let capture_index: i32 = index_token
                .parse()
                .map_err(|_| RuleError::BadCaptureIndex(index_token.to_string()))?;
            Extractor::regex(pattern, capture_index, name == "igrep", variable).map_err(
                |source| RuleError::BadPattern {
                    pattern: pattern.to_string(),
                    source,
                },
            )
        }
        other => Err(RuleError::UnknownKeyword(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_all_end_to_end() {
        let mut buffer = Buffer::new();
        let var = Variable::new("raw");
        let reg = register_rule(&mut buffer, "read:all", Some(&var)).unwrap();
        assert_eq!(reg.kind(), ValueKind::Text);

        buffer.feed(b"anything at all");
        buffer.complete_interval();
        assert!(var.take_dirty());
        assert_eq!(reg.text().as_deref(), Some("anything at all"));
        assert!(reg.number().is_none());
    }

    #[test]
    fn test_read_scanf_number_end_to_end() {
        let mut buffer = Buffer::new();
        let reg = register_rule(&mut buffer, "read:scanf:num:value=%d", None).unwrap();
        assert_eq!(reg.kind(), ValueKind::Numeric);

        buffer.feed(b"value=42");
        buffer.complete_interval();
        assert_eq!(reg.number(), Some(42.0));
        assert!(reg.text().is_none());
    }

    #[test]
    fn test_readline_grep_end_to_end() {
        let mut buffer = Buffer::new();
        let var = Variable::new("free");
        let reg =
            register_rule(&mut buffer, "readline:0:grep:^([0-9]+) free$:1", Some(&var)).unwrap();

        buffer.feed(b"128 used\n128 free\n");
        assert!(var.take_dirty());
        assert_eq!(reg.text().as_deref(), Some("128"));
    }

    #[test]
    fn test_scanf_kind_aliases() {
        let mut buffer = Buffer::new();
        for rule in [
            "read:scanf:string:%s",
            "read:scanf:str:%s",
            "read:scanf:s:%s",
        ] {
            let reg = register_rule(&mut buffer, rule, None).unwrap();
            assert_eq!(reg.kind(), ValueKind::Text);
        }
        for rule in [
            "read:scanf:number:%d",
            "read:scanf:n:%d",
            "read:scanf:counter:%u",
            "read:scanf:count:%u",
            "read:scanf:c:%u",
        ] {
            let reg = register_rule(&mut buffer, rule, None).unwrap();
            assert_eq!(reg.kind(), ValueKind::Numeric);
        }
    }

    #[test]
    fn test_scanf_format_keeps_embedded_colons() {
        let mut buffer = Buffer::new();
        let reg = register_rule(&mut buffer, "readline:1:scanf:n:cpu0: %d", None).unwrap();
        buffer.feed(b"cpu0: 55\n");
        assert_eq!(reg.number(), Some(55.0));
    }

    #[test]
    fn test_grep_pattern_keeps_embedded_colons() {
        let mut buffer = Buffer::new();
        let reg = register_rule(&mut buffer, "read:grep:^eth0: ([a-z]+)$:1", None).unwrap();
        buffer.feed(b"eth0: up");
        buffer.complete_interval();
        assert_eq!(reg.text().as_deref(), Some("up"));
    }

    #[test]
    fn test_igrep_is_case_insensitive() {
        let mut buffer = Buffer::new();
        let reg = register_rule(&mut buffer, "read:igrep:^CPU:-1", None).unwrap();
        buffer.feed(b"cpu throttled");
        buffer.complete_interval();
        assert_eq!(reg.text().as_deref(), Some("cpu throttled"));
    }

    #[test]
    fn test_unknown_keyword() {
        let mut buffer = Buffer::new();
        let err = register_rule(&mut buffer, "write:all", None).unwrap_err();
        assert!(matches!(err, RuleError::UnknownKeyword(ref k) if k == "write"));
    }

    #[test]
    fn test_unknown_rule_body() {
        let mut buffer = Buffer::new();
        let err = register_rule(&mut buffer, "read:sed:s/a/b/", None).unwrap_err();
        assert!(matches!(err, RuleError::UnknownKeyword(ref k) if k == "sed"));
    }

    #[test]
    fn test_bad_line_number() {
        let mut buffer = Buffer::new();
        let err = register_rule(&mut buffer, "readline:first:all", None).unwrap_err();
        assert!(matches!(err, RuleError::BadLineNumber(ref n) if n == "first"));
    }

    #[test]
    fn test_missing_tokens() {
        let mut buffer = Buffer::new();
        assert!(matches!(
            register_rule(&mut buffer, "read", None).unwrap_err(),
            RuleError::MissingToken(_)
        ));
        assert!(matches!(
            register_rule(&mut buffer, "read:scanf:n", None).unwrap_err(),
            RuleError::MissingToken(_)
        ));
        assert!(matches!(
            register_rule(&mut buffer, "read:grep:pattern-only", None).unwrap_err(),
            RuleError::MissingToken(_)
        ));
    }

    #[test]
    fn test_trailing_tokens_after_all() {
        let mut buffer = Buffer::new();
        let err = register_rule(&mut buffer, "read:all:junk", None).unwrap_err();
        assert!(matches!(err, RuleError::TrailingTokens(ref t) if t == "junk"));
    }

    #[test]
    fn test_bad_capture_index() {
        let mut buffer = Buffer::new();
        let err = register_rule(&mut buffer, "read:grep:x:one", None).unwrap_err();
        assert!(matches!(err, RuleError::BadCaptureIndex(ref i) if i == "one"));
    }

    #[test]
    fn test_bad_pattern_names_the_pattern() {
        let mut buffer = Buffer::new();
        let err = register_rule(&mut buffer, "read:grep:([0-9]+:1", None).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("([0-9]+"), "got: {}", message);
    }

    #[test]
    fn test_bad_scanf_kind() {
        let mut buffer = Buffer::new();
        let err = register_rule(&mut buffer, "read:scanf:float:%f", None).unwrap_err();
        assert!(matches!(err, RuleError::BadScanfKind(ref k) if k == "float"));
    }

    #[test]
    fn test_help_text_shape() {
        let help = emit_help("exec", "probe");
        let lines: Vec<&str> = help.lines().collect();
        assert_eq!(lines.len(), 12);
        assert_eq!(lines[0], "S exec:probe:read:all");
        assert_eq!(lines[2], "N exec:probe:read:scanf:num:<format>");
        assert_eq!(lines[6], "S exec:probe:readline:<N>:all");
        assert!(lines.iter().all(|l| l.starts_with("S ") || l.starts_with("N ")));
    }
}
