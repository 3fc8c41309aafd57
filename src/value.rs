use std::collections::HashMap;

use derive_more::From;
use serde::{Deserialize, Serialize};

/// Type alias for a map of attribute names to [`Value`].
///
/// # Examples
/// ```
/// # use eppo_client::{Attributes, Value};
/// let attributes = [
///     ("age".to_owned(), 30.0.into()),
///     ("is_premium_member".to_owned(), true.into()),
///     ("username".to_owned(), "john_doe".into()),
/// ].into_iter().collect::<Attributes>();
/// ```
pub type Attributes = HashMap<String, Value>;

/// A polymorphic scalar-or-array value used for subject attributes and rule condition operands.
///
/// Conveniently implements `From` conversions for `String`, `&str`, `f64`, `bool`, and
/// `Vec<String>`.
///
/// Array equality is order-insensitive but duplicate-sensitive.
#[derive(Debug, Serialize, Deserialize, From, Clone)]
#[serde(untagged)]
pub enum Value {
    /// A boolean value.
    Boolean(bool),
    /// A numerical value. Integers are represented as numbers with a zero fractional part.
    Number(f64),
    /// A string value.
    String(String),
    /// An array of strings.
    StringArray(Vec<String>),
    /// A null value or absence of value.
    Null,
}

impl Value {
    /// Returns the boolean if this is a `Boolean` value.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number if this is a `Number` value.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the value as `i64` if this is a `Number` that is finite and has no fractional
    /// part.
    pub fn as_integer(&self) -> Option<i64> {
        let f = self.as_number()?;
        let i = f as i64;
        if i as f64 == f {
            Some(i)
        } else {
            None
        }
    }

    /// Returns the string if this is a `String` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the array if this is a `StringArray` value.
    pub fn as_string_array(&self) -> Option<&[String]> {
        match self {
            Value::StringArray(v) => Some(v),
            _ => None,
        }
    }

    /// Returns `true` for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render the value the way rule operands see it: booleans as `true`/`false`, numbers in
    /// their shortest round-trippable form (integers without a decimal point), arrays joined by
    /// `", "`.
    ///
    /// Returns `None` for `Null` as there is no canonical string form for an absent value.
    pub(crate) fn to_display_string(&self) -> Option<String> {
        match self {
            Value::Boolean(b) => Some(if *b { "true" } else { "false" }.to_owned()),
            // f64's Display is the shortest representation that round-trips and renders
            // fractionless values without ".0".
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::StringArray(v) => Some(v.join(", ")),
            Value::Null => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::StringArray(a), Value::StringArray(b)) => multiset_eq(a, b),
            (Value::Null, Value::Null) => true,
            _ => false,
        }
    }
}

/// Order-insensitive, duplicate-sensitive comparison.
fn multiset_eq(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut counts = HashMap::<&str, isize>::with_capacity(a.len());
    for s in a {
        *counts.entry(s.as_str()).or_default() += 1;
    }
    for s in b {
        *counts.entry(s.as_str()).or_default() -= 1;
    }
    counts.values().all(|&count| count == 0)
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}
