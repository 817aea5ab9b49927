//! Parse-with-fallback helpers for raw remote replies.

use serde_json::Value;

/// Interpret a reply as an integer.
///
/// Accepts JSON numbers (floats are floored) and numeric strings. Anything
/// else, including non-finite floats, yields `None`.
pub fn parse_integer(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.floor())
                .filter(|f| *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.parse::<i64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.floor() as i64)
            })
        }
        _ => None,
    }
}

/// Interpret a reply as a cache version. Versions start at 1, so zero and
/// negatives are rejected.
pub fn parse_version(raw: &Value) -> Option<u64> {
    parse_integer(raw)
        .filter(|v| *v > 0)
        .map(|v| v as u64)
}

/// Interpret a reply as a post-increment counter (always >= 1).
pub fn parse_counter(raw: &Value) -> Option<u64> {
    parse_version(raw)
}

/// Interpret a `PTTL` reply as a positive remaining lifetime in ms.
///
/// The -1 / -2 sentinels and zero all map to `None`.
pub fn parse_pttl_ms(raw: &Value) -> Option<u64> {
    parse_integer(raw).filter(|ms| *ms > 0).map(|ms| ms as u64)
}
