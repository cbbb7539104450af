//! Byte-level scanning primitives shared by the message parser.
//!
//! These operate on plain byte slices with explicit offsets so the parser
//! can resume from any position after a partial read.

/// Find the absolute index of the next `\r\n` at or after `from`.
pub fn find_crlf(buf: &[u8], from: usize) -> Option<usize> {
    if from >= buf.len() {
        return None;
    }
    buf[from..]
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|p| from + p)
}

/// True if the bytes at `from` begin with `lit`.
pub fn starts_with_at(buf: &[u8], from: usize, lit: &[u8]) -> bool {
    buf.get(from..)
        .is_some_and(|rest| rest.starts_with(lit))
}

/// Split a slice into tokens separated by runs of SP or HT.
pub fn fields(slice: &[u8]) -> Vec<&[u8]> {
    slice
        .split(|&b| b == b' ' || b == b'\t')
        .filter(|t| !t.is_empty())
        .collect()
}

/// Parse a whole slice as an unsigned ASCII decimal integer.
///
/// Any failure — empty input, a sign, a non-digit anywhere, overflow —
/// yields zero. Callers that need to distinguish "zero" from "unparseable"
/// cannot, and the rest of the parser is written with that in mind.
pub fn parse_int_ascii(slice: &[u8]) -> usize {
    if slice.is_empty() {
        return 0;
    }
    let mut value: usize = 0;
    for &b in slice {
        if !b.is_ascii_digit() {
            return 0;
        }
        value = match value
            .checked_mul(10)
            .and_then(|v| v.checked_add((b - b'0') as usize))
        {
            Some(v) => v,
            None => return 0,
        };
    }
    value
}

/// Parse the leading run of ASCII hex digits, stopping at the first non-hex
/// byte (which is how chunk-size lines tolerate chunk extensions).
///
/// Returns `None` when the slice does not start with a hex digit or the
/// value overflows.
pub fn parse_hex_ascii(slice: &[u8]) -> Option<usize> {
    let mut value: usize = 0;
    let mut digits = 0usize;
    for &b in slice {
        let d = match b {
            b'0'..=b'9' => (b - b'0') as usize,
            b'a'..=b'f' => (b - b'a' + 10) as usize,
            b'A'..=b'F' => (b - b'A' + 10) as usize,
            _ => break,
        };
        value = value.checked_mul(16)?.checked_add(d)?;
        digits += 1;
    }
    if digits == 0 { None } else { Some(value) }
}

/// Trim leading and trailing SP/HT bytes.
pub fn trim_sp_ht(mut s: &[u8]) -> &[u8] {
    while let Some((&b, rest)) = s.split_first() {
        if b == b' ' || b == b'\t' {
            s = rest;
        } else {
            break;
        }
    }
    while let Some((&b, rest)) = s.split_last() {
        if b == b' ' || b == b'\t' {
            s = rest;
        } else {
            break;
        }
    }
    s
}
