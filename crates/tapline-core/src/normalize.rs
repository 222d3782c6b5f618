//! Recursive identifier coercion over JSON records
//!
//! Any object key ending in `id` (ASCII case-insensitive) holds an
//! identifier. Its scalar value is coerced to an integer when possible and
//! to `null` otherwise; containers are walked recursively. Keys in the
//! exemption set are copied verbatim, nested content included.

use std::collections::BTreeSet;
use std::num::IntErrorKind;

use serde_json::{Map, Value};

/// Keys holding enumerated answer codes, never identifiers
pub const DEFAULT_EXEMPT_KEYS: &[&str] = &["pollanswers", "surveyanswers", "testanswers"];

#[derive(Clone, Debug)]
pub struct IdNormalizer {
    suffix: String,
    exempt: BTreeSet<String>,
}

impl Default for IdNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_EXEMPT_KEYS.iter().copied())
    }
}

impl IdNormalizer {
    pub fn new<'a>(exempt: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            suffix: "id".to_string(),
            exempt: exempt.into_iter().map(str::to_ascii_lowercase).collect(),
        }
    }

    pub fn is_exempt(&self, key: &str) -> bool {
        self.exempt.contains(&key.to_ascii_lowercase())
    }

    pub fn is_identifier(&self, key: &str) -> bool {
        key.len() >= self.suffix.len()
            && key.to_ascii_lowercase().ends_with(&self.suffix)
            && !self.is_exempt(key)
    }

    /// Normalize a whole record.
    pub fn normalize(&self, value: Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(self.normalize_map(map)),
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|v| self.normalize(v)).collect())
            }
            scalar => scalar,
        }
    }

    fn normalize_map(&self, map: Map<String, Value>) -> Map<String, Value> {
        map.into_iter()
            .map(|(key, value)| {
                let value = if self.is_exempt(&key) {
                    value
                } else if self.is_identifier(&key) {
                    match value {
                        Value::Object(_) | Value::Array(_) => self.normalize(value),
                        scalar => coerce_id(&scalar).map_or(Value::Null, Value::from),
                    }
                } else {
                    self.normalize(value)
                };
                (key, value)
            })
            .collect()
    }
}

/// Integer value of an identifier scalar, if it has one.
///
/// Values outside the `i64` range have none.
pub fn coerce_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(float_to_i64)),
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(v) => Some(v),
                Err(e)
                    if matches!(
                        e.kind(),
                        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow
                    ) =>
                {
                    None
                }
                Err(_) => s.parse::<f64>().ok().and_then(float_to_i64),
            }
        }
        _ => None,
    }
}

/// -2^63 and 2^63; the upper bound itself does not fit
const I64_LOWER: f64 = -9_223_372_036_854_775_808.0;
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

fn float_to_i64(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && (I64_LOWER..I64_UPPER).contains(&f)).then_some(f as i64)
}
