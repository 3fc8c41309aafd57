//! Structured details about a single flag evaluation.

use serde::{Deserialize, Serialize};

use crate::error::{EvaluationError, EvaluationFailure};
use crate::ufc::{Rule, Timestamp};
use crate::value::{Attributes, Value};

/// Flag-level evaluation outcome code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagEvaluationCode {
    /// An allocation configured for this flag was matched.
    Match,
    /// Configuration has not been fetched yet.
    ConfigurationMissing,
    /// Flag does not exist or is not enabled for the environment in use.
    FlagUnrecognizedOrDisabled,
    /// No allocation matched, resulting in the default value being assigned.
    DefaultAllocationNull,
    /// Variation value does not match the type of the assignment function called.
    TypeMismatch,
    /// The matched variation's value is incompatible with the flag's declared type, or the flag
    /// configuration could not be parsed.
    AssignmentError,
}

/// Result of an evaluation together with its details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResultWithDetails<T> {
    /// Assigned variation value, or the supplied default if no variation was assigned.
    pub variation: T,
    /// Details of the evaluation.
    pub evaluation_details: EvaluationDetails,
}

impl<T> EvaluationResultWithDetails<T> {
    /// Map `EvaluationResultWithDetails.variation` using the `f` function.
    pub fn map<T2, F: FnOnce(T) -> T2>(self, f: F) -> EvaluationResultWithDetails<T2> {
        EvaluationResultWithDetails {
            variation: f(self.variation),
            evaluation_details: self.evaluation_details,
        }
    }
}

/// Details about a feature flag evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationDetails {
    /// Key of the evaluated flag.
    pub flag_key: String,
    /// Key of the subject the flag was evaluated for.
    pub subject_key: String,
    /// Attributes the flag was evaluated against.
    pub subject_attributes: Attributes,
    /// Timestamp when the flag was evaluated.
    pub timestamp: Timestamp,

    /// Timestamp when the configuration was fetched by the SDK. None if configuration hasn't
    /// been fetched yet.
    pub config_fetched_at: Option<Timestamp>,
    /// Timestamp when the configuration was published by the server. None if configuration
    /// hasn't been fetched yet.
    pub config_published_at: Option<Timestamp>,
    /// Environment the configuration belongs to. None if configuration hasn't been fetched yet.
    pub environment_name: Option<String>,

    /// Overall evaluation outcome.
    pub flag_evaluation_code: FlagEvaluationCode,
    /// Human-readable description of the outcome.
    pub flag_evaluation_description: String,

    /// Key of the selected variation.
    pub variation_key: Option<String>,
    /// Value of the selected variation. Could be `None` if no variation is selected, or the
    /// selected value is absent in configuration (configuration error).
    pub variation_value: Option<Value>,

    /// The first rule that matched in the matched allocation, if any.
    pub matched_rule: Option<Rule>,

    /// Evaluation details for all allocations, in configuration order.
    pub allocations: Vec<AllocationEvaluationDetails>,
}

/// Evaluation outcome of a single allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationEvaluationDetails {
    /// Key of the allocation.
    pub key: String,
    /// Order position of the allocation as seen in the Web UI (1-based).
    pub order_position: usize,
    /// Outcome of this allocation.
    pub allocation_evaluation_code: AllocationEvaluationCode,
}

/// Per-allocation evaluation outcome code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationEvaluationCode {
    /// The allocation was not evaluated because a previous allocation matched.
    Unevaluated,
    /// The subject matched all conditions and this allocation was selected.
    Match,
    /// Evaluation happened before the allocation's start time.
    BeforeStart,
    /// Evaluation happened after the allocation's end time.
    AfterEnd,
    /// Subject failed all allocation rules.
    FailingRule,
    /// Subject matched all rules but no split matched its traffic shard.
    Empty,
}

impl From<&EvaluationFailure> for FlagEvaluationCode {
    fn from(value: &EvaluationFailure) -> Self {
        match value {
            EvaluationFailure::ConfigurationMissing => Self::ConfigurationMissing,
            EvaluationFailure::FlagUnrecognizedOrDisabled => Self::FlagUnrecognizedOrDisabled,
            EvaluationFailure::DefaultAllocationNull => Self::DefaultAllocationNull,
            EvaluationFailure::Error(err) => match err {
                EvaluationError::TypeMismatch { .. } => Self::TypeMismatch,
                EvaluationError::AssignmentError { .. } => Self::AssignmentError,
                EvaluationError::UnexpectedConfigurationError => Self::AssignmentError,
            },
        }
    }
}
