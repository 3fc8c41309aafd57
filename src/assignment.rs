use serde::{Deserialize, Serialize};

use crate::assignment_logger::AssignmentEvent;

/// Result of assignment evaluation.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// Assignment value that should be returned to the user.
    pub value: AssignmentValue,
    /// Optional assignment event that should be logged to storage.
    pub event: Option<AssignmentEvent>,
}

/// Enum representing values assigned to a subject as a result of feature flag evaluation.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentValue {
    /// A string value.
    String(String),
    /// An integer value.
    Integer(i64),
    /// A numeric value (floating-point).
    Numeric(f64),
    /// A boolean value.
    Boolean(bool),
    /// Arbitrary JSON value.
    Json(serde_json::Value),
}

impl AssignmentValue {
    /// Returns the assignment value as a string if it is of type String.
    ///
    /// # Examples
    /// ```
    /// # use eppo_client::AssignmentValue;
    /// let value = AssignmentValue::String("example".into());
    /// assert_eq!(value.as_str(), Some("example"));
    /// ```
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AssignmentValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Extracts the assignment value as an owned string if it is of type String.
    pub fn to_string(self) -> Option<String> {
        match self {
            AssignmentValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the assignment value as an integer if it is of type Integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AssignmentValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the assignment value as a numeric value if it is of type Numeric.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            AssignmentValue::Numeric(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the assignment value as a boolean if it is of type Boolean.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            AssignmentValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the assignment value as a JSON value if it is of type Json.
    ///
    /// # Examples
    /// ```
    /// # use eppo_client::AssignmentValue;
    /// use serde_json::json;
    ///
    /// let value = AssignmentValue::Json(json!({ "key": "value" }));
    /// assert_eq!(value.as_json(), Some(&json!({ "key": "value" })));
    /// ```
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            AssignmentValue::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Extracts the assignment value as a JSON value if it is of type Json.
    pub fn to_json(self) -> Option<serde_json::Value> {
        match self {
            AssignmentValue::Json(v) => Some(v),
            _ => None,
        }
    }

    /// The variation type this value inhabits.
    pub fn variation_type(&self) -> crate::ufc::VariationType {
        use crate::ufc::VariationType;
        match self {
            AssignmentValue::String(_) => VariationType::String,
            AssignmentValue::Integer(_) => VariationType::Integer,
            AssignmentValue::Numeric(_) => VariationType::Numeric,
            AssignmentValue::Boolean(_) => VariationType::Boolean,
            AssignmentValue::Json(_) => VariationType::Json,
        }
    }
}
