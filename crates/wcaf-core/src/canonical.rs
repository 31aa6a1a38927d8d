//! Canonical JSON encoding for deterministic hashing.
//!
//! Every hash and signature in WCAF is computed over the output of this
//! module, so two implementations must agree on it byte for byte:
//! - Object keys sorted by byte comparison, no whitespace anywhere
//! - Arrays keep their order
//! - Scalars render exactly as `JSON.stringify` renders them
//!   (integral numbers without a fraction, `-0` as `0`, exponents with an
//!   explicit sign, otherwise the shortest round-trip digits)
//!
//! Absent fields are modelled with `Option` and
//! `#[serde(skip_serializing_if = "Option::is_none")]`: an absent key never
//! reaches the encoder, while an explicit `null` is kept as `null`.

use serde::Serialize;
use serde_json::{Number, Value};

use crate::error::{CoreError, Result};

/// Largest integer a double can hold exactly (2^53 - 1).
const MAX_SAFE_INTEGER: u64 = 9_007_199_254_740_991;

/// Encode a JSON value to its canonical string.
pub fn canonical_json(value: &Value) -> String {
    let mut buf = String::new();
    encode_value_to(&mut buf, value);
    buf
}

/// Serialize any value through serde, then canonicalize it.
///
/// Fails only for types serde_json cannot represent (for example maps with
/// non-string keys).
pub fn to_canonical_string<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let value = serde_json::to_value(value).map_err(|e| CoreError::Encoding(e.to_string()))?;
    Ok(canonical_json(&value))
}

/// Recursively encode a JSON value.
fn encode_value_to(buf: &mut String, value: &Value) {
    match value {
        Value::Null => buf.push_str("null"),
        Value::Bool(b) => buf.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => encode_number(buf, n),
        Value::String(s) => encode_str(buf, s),
        Value::Array(items) => {
            buf.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                encode_value_to(buf, item);
            }
            buf.push(']');
        }
        Value::Object(map) => {
            // Don't trust the map's iteration order: `preserve_order` may be
            // enabled somewhere in the dependency graph.
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            buf.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                encode_str(buf, key);
                buf.push(':');
                encode_value_to(buf, val);
            }
            buf.push('}');
        }
    }
}

/// Encode a number the way a double-based JSON encoder would.
fn encode_number(buf: &mut String, n: &Number) {
    if let Some(i) = n.as_i64() {
        if i.unsigned_abs() <= MAX_SAFE_INTEGER {
            buf.push_str(&i.to_string());
            return;
        }
    } else if let Some(u) = n.as_u64() {
        if u <= MAX_SAFE_INTEGER {
            buf.push_str(&u.to_string());
            return;
        }
    }

    match n.as_f64() {
        Some(f) => encode_f64(buf, f),
        None => buf.push_str("null"),
    }
}

/// ECMAScript Number::toString for finite doubles.
fn encode_f64(buf: &mut String, v: f64) {
    if !v.is_finite() {
        buf.push_str("null");
        return;
    }
    if v == 0.0 {
        buf.push('0');
        return;
    }
    if v < 0.0 {
        buf.push('-');
    }

    // `{:e}` yields the shortest round-trip digits as `d.ddddde<exp>`.
    let sci = format!("{:e}", v.abs());
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    let k = digits.len() as i32;
    let n = exp + 1;

    if k <= n && n <= 21 {
        buf.push_str(&digits);
        buf.extend(std::iter::repeat('0').take((n - k) as usize));
    } else if 0 < n && n <= 21 {
        let (int_part, frac_part) = digits.split_at(n as usize);
        buf.push_str(int_part);
        buf.push('.');
        buf.push_str(frac_part);
    } else if -6 < n && n <= 0 {
        buf.push_str("0.");
        buf.extend(std::iter::repeat('0').take((-n) as usize));
        buf.push_str(&digits);
    } else {
        let e = n - 1;
        buf.push_str(&digits[..1]);
        if k > 1 {
            buf.push('.');
            buf.push_str(&digits[1..]);
        }
        buf.push('e');
        buf.push(if e >= 0 { '+' } else { '-' });
        buf.push_str(&e.unsigned_abs().to_string());
    }
}

/// Encode a string with JSON escaping.
fn encode_str(buf: &mut String, s: &str) {
    buf.push('"');
    for c in s.chars() {
        match c {
            '"' => buf.push_str("\\\""),
            '\\' => buf.push_str("\\\\"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            '\t' => buf.push_str("\\t"),
            '\u{08}' => buf.push_str("\\b"),
            '\u{0c}' => buf.push_str("\\f"),
            c if (c as u32) < 0x20 => buf.push_str(&format!("\\u{:04x}", c as u32)),
            c => buf.push(c),
        }
    }
    buf.push('"');
}
