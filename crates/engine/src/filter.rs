//! Filter predicates over an event payload.
//!
//! A recipe's `filters` map a dotted payload path to a [`Condition`]:
//!
//! ```json
//! { "amount_cents": { "gte": 100000 }, "is_first_donation": true }
//! ```
//!
//! A bare literal means equality; an object of operators means every
//! operator must hold. A path that does not resolve fails the filter.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::template::lookup;

/// Operator names accepted inside a condition object.
pub const OPERATORS: [&str; 7] = ["eq", "ne", "gt", "gte", "lt", "lte", "in"];

/// Operator form of a condition.
///
/// An operand that is present but `null` stays `Some(Value::Null)`, so
/// `{"eq": null}` still constrains the field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Comparison {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub eq: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub ne: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub gt: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub lt: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
    #[serde(
        rename = "in",
        default,
        deserialize_with = "present_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub one_of: Option<Vec<Value>>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// `in` must be a list; `null` or a scalar is a decode error.
fn present_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<Value>>, D::Error> {
    Vec::<Value>::deserialize(deserializer).map(Some)
}

impl Comparison {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A per-field predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Compare(Comparison),
    Equals(Value),
}

impl Condition {
    pub fn gte(v: impl Into<Value>) -> Self {
        Self::Compare(Comparison { gte: Some(v.into()), ..Default::default() })
    }

    pub fn lte(v: impl Into<Value>) -> Self {
        Self::Compare(Comparison { lte: Some(v.into()), ..Default::default() })
    }

    pub fn one_of<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Compare(Comparison {
            one_of: Some(values.into_iter().map(Into::into).collect()),
            ..Default::default()
        })
    }

    pub fn equals(v: impl Into<Value>) -> Self {
        Self::Equals(v.into())
    }

    /// Why this condition cannot be what its author meant, if anything.
    ///
    /// An object that uses operator names but does not decode as a
    /// [`Comparison`] falls back to literal equality, which is almost never
    /// intended. An empty operator object constrains nothing.
    pub fn problem(&self) -> Option<String> {
        match self {
            Self::Compare(cmp) if cmp.is_empty() => Some("operator object is empty".into()),
            Self::Compare(_) => None,
            Self::Equals(Value::Object(map)) => {
                let used: Vec<&str> = map
                    .keys()
                    .map(String::as_str)
                    .filter(|k| OPERATORS.contains(k))
                    .collect();
                if used.is_empty() {
                    return None;
                }
                Some(format!(
                    "malformed operator object (uses {}); expected only {} with `in` as a list",
                    used.join(", "),
                    OPERATORS.join("/")
                ))
            }
            Self::Equals(_) => None,
        }
    }

    /// Evaluate against an already-resolved field value.
    pub fn holds(&self, actual: &Value) -> bool {
        match self {
            Self::Equals(expected) => values_equal(actual, expected),
            Self::Compare(cmp) => cmp.holds(actual),
        }
    }
}

impl Comparison {
    fn holds(&self, actual: &Value) -> bool {
        let ordered = |bound: &Option<Value>, accept: fn(Ordering) -> bool| match bound {
            None => true,
            Some(b) => compare(actual, b).is_some_and(accept),
        };

        self.eq.as_ref().map_or(true, |e| values_equal(actual, e))
            && self.ne.as_ref().map_or(true, |e| !values_equal(actual, e))
            && ordered(&self.gt, Ordering::is_gt)
            && ordered(&self.gte, Ordering::is_ge)
            && ordered(&self.lt, Ordering::is_lt)
            && ordered(&self.lte, Ordering::is_le)
            && self
                .one_of
                .as_ref()
                .map_or(true, |set| set.iter().any(|e| values_equal(actual, e)))
    }
}

/// Equality with numbers compared by value (`1` == `1.0`).
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering for numbers and strings; `None` for anything else or mixed types.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Evaluate a whole filter map. `None` (no filters) always passes.
pub fn passes(filters: Option<&BTreeMap<String, Condition>>, payload: &Value) -> bool {
    let Some(filters) = filters else {
        return true;
    };
    filters.iter().all(|(path, condition)| match lookup(payload, path) {
        Some(actual) => condition.holds(actual),
        None => false,
    })
}
