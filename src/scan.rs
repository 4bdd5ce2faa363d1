//! Scanf-style format matching over raw byte spans
//!
//! The matcher walks an input span and a format span in lockstep and
//! reports the bounds of the first unsuppressed conversion. It is pure and
//! restartable: cursors are plain offsets threaded through helper
//! functions, so a failed match leaves no state behind and the caller can
//! retry against the next sample.
//!
//! Supported directives:
//! - a whitespace byte in the format consumes any run of input whitespace
//! - `%%` matches a literal `%`
//! - `%[*][L]<conv>` where `*` suppresses the capture and `L` caps the
//!   field width; conversions are `d i o u x X p` (integers), `f e g E a`
//!   (doubles), `s` (non-whitespace run), `c` (exactly `L` bytes, default
//!   one) and `[...]` (POSIX scan-set with `^` negation and `a-b` ranges)

/// A successful match: the capture bounds within the input, the conversion
/// character that produced it, and the format bytes that were not yet
/// consumed when the capture completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatMatch<'f> {
    /// Byte offset in the input where the capture begins
    pub start: usize,
    /// Byte offset one past the end of the capture
    pub end: usize,
    /// Conversion character (`b'['` for scan-sets)
    pub conversion: u8,
    /// Unconsumed remainder of the format
    pub rest: &'f [u8],
}

/// Integer scanning base selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Base {
    Decimal,
    Octal,
    Hex,
    /// Detected from the prefix: `0x`/`0X` is hex, a leading `0` is octal,
    /// anything else is decimal
    Auto,
}

/// Match `format` against `input`, returning the first unsuppressed
/// conversion's capture, or `None` on any literal mismatch, unknown
/// conversion, empty capture, or a format with no unsuppressed conversion.
pub fn match_format<'f>(input: &[u8], format: &'f [u8]) -> Option<FormatMatch<'f>> {
    let mut ip = 0usize;
    let mut fp = 0usize;

    while fp < format.len() {
        let f = format[fp];

        if f.is_ascii_whitespace() {
            fp += 1;
            ip = skip_whitespace(input, ip);
            continue;
        }

        if f != b'%' {
            if ip >= input.len() || input[ip] != f {
                return None;
            }
            ip += 1;
            fp += 1;
            continue;
        }

        // Directive: '%' [*] [digits] conversion
        fp += 1;
        if fp >= format.len() {
            return None;
        }
        if format[fp] == b'%' {
            if ip >= input.len() || input[ip] != b'%' {
                return None;
            }
            ip += 1;
            fp += 1;
            continue;
        }

        let mut suppress = false;
        if format[fp] == b'*' {
            suppress = true;
            fp += 1;
        }
        let mut width = 0usize;
        while fp < format.len() && format[fp].is_ascii_digit() {
            width = width * 10 + (format[fp] - b'0') as usize;
            fp += 1;
        }
        if fp >= format.len() {
            return None;
        }
        let conversion = format[fp];
        fp += 1;

        let (start, end) = match conversion {
            b'[' => {
                let (set, set_end) = parse_scan_set(format, fp)?;
                fp = set_end;
                scan_set(input, ip, width, &set)?
            }
            b'c' => scan_chars(input, ip, if width == 0 { 1 } else { width })?,
            b's' => scan_nonspace(input, ip, width)?,
            b'd' => scan_integer(input, ip, width, Base::Decimal, true)?,
            b'i' => scan_integer(input, ip, width, Base::Auto, true)?,
            b'u' => scan_integer(input, ip, width, Base::Decimal, false)?,
            b'o' => scan_integer(input, ip, width, Base::Octal, false)?,
            b'x' | b'X' | b'p' => scan_integer(input, ip, width, Base::Hex, false)?,
            b'f' | b'e' | b'g' | b'E' | b'a' => scan_float(input, ip, width)?,
            _ => return None,
        };

        ip = end;
        if !suppress {
            return Some(FormatMatch {
                start,
                end,
                conversion,
                rest: &format[fp..],
            });
        }
    }

    // Format exhausted without delivering an unsuppressed conversion
    None
}

/// Parse the textual capture of a numeric conversion into a double.
/// Integer conversions are widened; float conversions go through the
/// standard decimal parser.
pub fn parse_number(capture: &[u8], conversion: u8) -> Option<f64> {
    match conversion {
        b'f' | b'e' | b'g' | b'E' | b'a' => parse_float(capture),
        _ => {
            let (negative, magnitude) = parse_integer(capture, conversion)?;
            let value = magnitude as f64;
            Some(if negative { -value } else { value })
        }
    }
}

/// Parse the textual capture of a numeric conversion into an unsigned
/// 64-bit counter reading. Negative captures wrap, matching how kernel
/// counters roll through the unsigned domain.
pub fn parse_counter(capture: &[u8], conversion: u8) -> Option<u64> {
    match conversion {
        b'f' | b'e' | b'g' | b'E' | b'a' => parse_float(capture).map(|v| v as u64),
        _ => {
            let (negative, magnitude) = parse_integer(capture, conversion)?;
            Some(if negative {
                magnitude.wrapping_neg()
            } else {
                magnitude
            })
        }
    }
}

fn parse_float(capture: &[u8]) -> Option<f64> {
    std::str::from_utf8(capture).ok()?.parse::<f64>().ok()
}

/// Accumulate an integer capture as (sign, magnitude). The magnitude wraps
/// on overflow rather than erroring, like the C library scanners this
/// mirrors.
fn parse_integer(capture: &[u8], conversion: u8) -> Option<(bool, u64)> {
    let mut pos = 0usize;
    let negative = match capture.first() {
        Some(b'-') => {
            pos = 1;
            true
        }
        Some(b'+') => {
            pos = 1;
            false
        }
        _ => false,
    };

    let radix: u64 = match conversion {
        b'd' | b'u' => 10,
        b'o' => 8,
        b'x' | b'X' | b'p' => {
            if capture[pos..].starts_with(b"0x") || capture[pos..].starts_with(b"0X") {
                pos += 2;
            }
            16
        }
        b'i' => {
            if capture[pos..].starts_with(b"0x") || capture[pos..].starts_with(b"0X") {
                pos += 2;
                16
            } else if capture.get(pos) == Some(&b'0') {
                8
            } else {
                10
            }
        }
        _ => return None,
    };

    let digits = &capture[pos..];
    if digits.is_empty() {
        return None;
    }
    let mut value: u64 = 0;
    for &b in digits {
        let digit = (b as char).to_digit(radix as u32)? as u64;
        value = value.wrapping_mul(radix).wrapping_add(digit);
    }
    Some((negative, value))
}

fn skip_whitespace(input: &[u8], mut pos: usize) -> usize {
    while pos < input.len() && input[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// End of the field starting at `start`: the whole input, or `start + width`
/// when a width cap was given.
fn field_end(len: usize, start: usize, width: usize) -> usize {
    if width == 0 {
        len
    } else {
        len.min(start + width)
    }
}

/// `%c`: exactly `count` bytes, no whitespace skipping.
fn scan_chars(input: &[u8], pos: usize, count: usize) -> Option<(usize, usize)> {
    if input.len() - pos < count {
        return None;
    }
    Some((pos, pos + count))
}

/// `%s`: maximal non-whitespace run after skipping leading whitespace.
fn scan_nonspace(input: &[u8], pos: usize, width: usize) -> Option<(usize, usize)> {
    let start = skip_whitespace(input, pos);
    let limit = field_end(input.len(), start, width);
    let mut end = start;
    while end < limit && !input[end].is_ascii_whitespace() {
        end += 1;
    }
    (end > start).then_some((start, end))
}

/// Integer conversions: optional sign (signed conversions only), optional
/// base prefix, then a non-empty digit run. The capture spans the literal
/// text including sign and prefix.
fn scan_integer(
    input: &[u8],
    pos: usize,
    width: usize,
    base: Base,
    signed: bool,
) -> Option<(usize, usize)> {
    let start = skip_whitespace(input, pos);
    let limit = field_end(input.len(), start, width);
    let mut end = start;

    if signed && end < limit && matches!(input[end], b'+' | b'-') {
        end += 1;
    }

    let radix: u32 = match base {
        Base::Decimal => 10,
        Base::Octal => 8,
        Base::Hex => {
            if has_hex_prefix(input, end, limit) {
                end += 2;
            }
            16
        }
        Base::Auto => {
            if has_hex_prefix(input, end, limit) {
                end += 2;
                16
            } else if end < limit && input[end] == b'0' {
                8
            } else {
                10
            }
        }
    };

    let digits_start = end;
    while end < limit && (input[end] as char).to_digit(radix).is_some() {
        end += 1;
    }
    (end > digits_start).then_some((start, end))
}

/// A `0x`/`0X` prefix counts only when a hex digit follows it within the
/// field, otherwise the `0` is an ordinary digit.
fn has_hex_prefix(input: &[u8], pos: usize, limit: usize) -> bool {
    pos + 2 < limit
        && input[pos] == b'0'
        && matches!(input[pos + 1], b'x' | b'X')
        && input[pos + 2].is_ascii_hexdigit()
}

/// Float conversions: sign, digits, optional fraction, optional exponent.
/// The exponent is consumed only when at least one exponent digit exists.
fn scan_float(input: &[u8], pos: usize, width: usize) -> Option<(usize, usize)> {
    let start = skip_whitespace(input, pos);
    let limit = field_end(input.len(), start, width);
    let mut end = start;

    if end < limit && matches!(input[end], b'+' | b'-') {
        end += 1;
    }
    let mut saw_digit = false;
    while end < limit && input[end].is_ascii_digit() {
        end += 1;
        saw_digit = true;
    }
    if end < limit && input[end] == b'.' {
        end += 1;
        while end < limit && input[end].is_ascii_digit() {
            end += 1;
            saw_digit = true;
        }
    }
    if !saw_digit {
        return None;
    }
    if end < limit && matches!(input[end], b'e' | b'E') {
        let mut exp = end + 1;
        if exp < limit && matches!(input[exp], b'+' | b'-') {
            exp += 1;
        }
        let exp_digits = exp;
        while exp < limit && input[exp].is_ascii_digit() {
            exp += 1;
        }
        if exp > exp_digits {
            end = exp;
        }
    }
    Some((start, end))
}

/// Byte membership table for a `%[...]` scan-set.
struct ScanSet {
    table: [bool; 256],
    negated: bool,
}

impl ScanSet {
    fn contains(&self, b: u8) -> bool {
        self.table[b as usize] != self.negated
    }
}

/// Parse the scan-set body starting just after `[`. Returns the set and
/// the format offset one past the closing `]`. A `]` in the first position
/// is a member, and a `-` with no following range end is literal.
fn parse_scan_set(format: &[u8], mut pos: usize) -> Option<(ScanSet, usize)> {
    let mut table = [false; 256];
    let mut negated = false;

    if format.get(pos) == Some(&b'^') {
        negated = true;
        pos += 1;
    }

    let mut first = true;
    loop {
        let b = *format.get(pos)?;
        if b == b']' && !first {
            return Some((ScanSet { table, negated }, pos + 1));
        }
        first = false;
        if format.get(pos + 1) == Some(&b'-') && format.get(pos + 2).is_some_and(|&e| e != b']') {
            let hi = format[pos + 2];
            let (lo, hi) = if b <= hi { (b, hi) } else { (hi, b) };
            for c in lo..=hi {
                table[c as usize] = true;
            }
            pos += 3;
        } else {
            table[b as usize] = true;
            pos += 1;
        }
    }
}

/// `%[...]`: maximal run of member bytes, no whitespace skipping.
fn scan_set(input: &[u8], pos: usize, width: usize, set: &ScanSet) -> Option<(usize, usize)> {
    let limit = field_end(input.len(), pos, width);
    let mut end = pos;
    while end < limit && set.contains(input[end]) {
        end += 1;
    }
    (end > pos).then_some((pos, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture<'a>(input: &'a [u8], format: &[u8]) -> Option<(&'a [u8], u8)> {
        match_format(input, format).map(|m| (&input[m.start..m.end], m.conversion))
    }

    #[test]
    fn test_literal_prefix_then_decimal() {
        let m = match_format(b"value=42", b"value=%d").unwrap();
        assert_eq!((m.start, m.end), (6, 8));
        assert_eq!(m.conversion, b'd');
        assert!(m.rest.is_empty());
    }

    #[test]
    fn test_literal_mismatch_fails() {
        assert!(match_format(b"oops=42", b"value=%d").is_none());
    }

    #[test]
    fn test_format_whitespace_consumes_input_run() {
        assert_eq!(capture(b"cpu    42", b"cpu %d"), Some((&b"42"[..], b'd')));
        // Zero whitespace bytes in the input is fine too
        assert_eq!(capture(b"cpu42", b"cpu %d"), Some((&b"42"[..], b'd')));
    }

    #[test]
    fn test_percent_escape() {
        assert_eq!(capture(b"97% idle 3", b"97%% idle %d"), Some((&b"3"[..], b'd')));
        assert!(match_format(b"97 idle 3", b"97%% idle %d").is_none());
    }

    #[test]
    fn test_suppressed_conversion_advances_input() {
        assert_eq!(capture(b"cpu0 1234", b"%*s %d"), Some((&b"1234"[..], b'd')));
    }

    #[test]
    fn test_first_unsuppressed_conversion_ends_match() {
        let m = match_format(b"12 34", b"%d %d").unwrap();
        assert_eq!(&b"12 34"[m.start..m.end], b"12");
        assert_eq!(m.rest, b" %d");
    }

    #[test]
    fn test_width_caps_capture() {
        assert_eq!(capture(b"12345", b"%2d"), Some((&b"12"[..], b'd')));
    }

    #[test]
    fn test_signed_decimal() {
        assert_eq!(capture(b"-42", b"%d"), Some((&b"-42"[..], b'd')));
        assert_eq!(parse_number(b"-42", b'd'), Some(-42.0));
        assert_eq!(parse_number(b"+7", b'd'), Some(7.0));
    }

    #[test]
    fn test_auto_base_detection() {
        assert_eq!(capture(b"0x1A rest", b"%i"), Some((&b"0x1A"[..], b'i')));
        assert_eq!(parse_number(b"0x1A", b'i'), Some(26.0));
        assert_eq!(parse_number(b"017", b'i'), Some(15.0));
        assert_eq!(parse_number(b"42", b'i'), Some(42.0));
        assert_eq!(parse_number(b"0", b'i'), Some(0.0));
    }

    #[test]
    fn test_octal_and_hex() {
        assert_eq!(capture(b"755 x", b"%o"), Some((&b"755"[..], b'o')));
        assert_eq!(parse_number(b"755", b'o'), Some(493.0));
        assert_eq!(capture(b"0xff", b"%x"), Some((&b"0xff"[..], b'x')));
        assert_eq!(parse_number(b"0xff", b'x'), Some(255.0));
        assert_eq!(parse_number(b"ff", b'X'), Some(255.0));
    }

    #[test]
    fn test_octal_stops_at_non_octal_digit() {
        assert_eq!(capture(b"089", b"%o"), Some((&b"0"[..], b'o')));
    }

    #[test]
    fn test_float_forms() {
        assert_eq!(capture(b"3.14 rad", b"%f"), Some((&b"3.14"[..], b'f')));
        assert_eq!(parse_number(b"3.14", b'f'), Some(3.14));
        assert_eq!(capture(b"1.5e3xyz", b"%g"), Some((&b"1.5e3"[..], b'g')));
        assert_eq!(parse_number(b"1.5e3", b'g'), Some(1500.0));
        assert_eq!(capture(b"-.5", b"%e"), Some((&b"-.5"[..], b'e')));
        assert_eq!(parse_number(b"-.5", b'e'), Some(-0.5));
        // A bare 'e' with no exponent digits stays out of the capture
        assert_eq!(capture(b"2.5ev", b"%f"), Some((&b"2.5"[..], b'f')));
    }

    #[test]
    fn test_string_skips_leading_whitespace() {
        assert_eq!(capture(b"   abc def", b"%s"), Some((&b"abc"[..], b's')));
    }

    #[test]
    fn test_chars_exact_count_no_skip() {
        assert_eq!(capture(b" x", b"%c"), Some((&b" "[..], b'c')));
        assert_eq!(capture(b"abcde", b"%3c"), Some((&b"abc"[..], b'c')));
        // Not enough bytes for the requested count
        assert!(match_format(b"ab", b"%3c").is_none());
    }

    #[test]
    fn test_scan_set_basic() {
        assert_eq!(capture(b"123abc", b"%[0-9]"), Some((&b"123"[..], b'[')));
        assert_eq!(capture(b"ab:cd", b"%[^:]"), Some((&b"ab"[..], b'[')));
    }

    #[test]
    fn test_scan_set_leading_bracket_is_member() {
        assert_eq!(capture(b"]]x.", b"%[]x]"), Some((&b"]]x"[..], b'[')));
    }

    #[test]
    fn test_scan_set_empty_capture_fails() {
        assert!(match_format(b"abc", b"%[0-9]").is_none());
    }

    #[test]
    fn test_scan_set_width() {
        assert_eq!(capture(b"aaaa", b"%2[a]"), Some((&b"aa"[..], b'[')));
    }

    #[test]
    fn test_unknown_conversion_fails() {
        assert!(match_format(b"x", b"%q").is_none());
    }

    #[test]
    fn test_trailing_percent_fails() {
        assert!(match_format(b"x", b"x%").is_none());
    }

    #[test]
    fn test_no_conversion_in_format_fails() {
        assert!(match_format(b"plain text", b"plain text").is_none());
    }

    #[test]
    fn test_empty_numeric_capture_fails() {
        assert!(match_format(b"abc", b"%d").is_none());
        assert!(match_format(b"", b"%s").is_none());
    }

    #[test]
    fn test_remaining_format_returned() {
        let m = match_format(b"5%", b"%d%%").unwrap();
        assert_eq!(m.rest, b"%%");
    }

    #[test]
    fn test_counter_parse_and_wrap() {
        assert_eq!(parse_counter(b"18446744073709551615", b'u'), Some(u64::MAX));
        assert_eq!(parse_counter(b"-1", b'd'), Some(u64::MAX));
        assert_eq!(parse_counter(b"0xdead", b'x'), Some(0xdead));
        assert_eq!(parse_counter(b"12.9", b'f'), Some(12));
    }

    #[test]
    fn test_parse_rejects_non_numeric_conversion() {
        assert_eq!(parse_number(b"abc", b's'), None);
        assert_eq!(parse_counter(b"abc", b'c'), None);
    }
}
