use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::value::Attributes;

/// Represents an event capturing the assignment of a feature flag to a subject and its logging
/// details.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentEvent {
    /// The key of the feature flag being assigned.
    pub feature_flag: String,
    /// The key of the allocation that the subject was assigned to.
    pub allocation: String,
    /// The key of the experiment associated with the assignment
    /// (`"<flag_key>-<allocation_key>"`).
    pub experiment: String,
    /// The specific variation assigned to the subject.
    pub variation: String,
    /// The key identifying the subject receiving the assignment.
    pub subject: String,
    /// Custom attributes of the subject relevant to the assignment.
    pub subject_attributes: Attributes,
    /// The timestamp indicating when the assignment event occurred (ISO-8601 with milliseconds).
    pub timestamp: String,
    /// Entity the flag or allocation is associated with, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<i64>,
    /// Additional metadata such as SDK language and version.
    pub meta_data: HashMap<String, String>,
    /// Additional user-defined logging fields for capturing extra information related to the
    /// assignment.
    #[serde(flatten)]
    pub extra_logging: HashMap<String, String>,
}

/// A trait for logging assignment events to your storage system. Implementations should handle
/// persisting assignment events for analytics and tracking purposes.
///
/// # Examples
///
/// ```no_run
/// # use eppo_client::{AssignmentLogger, AssignmentEvent};
/// struct MyAssignmentLogger;
///
/// impl AssignmentLogger for MyAssignmentLogger {
///     fn log_assignment(&self, event: AssignmentEvent) {
///         // Deliver the event to your data warehouse.
///     }
/// }
/// ```
///
/// # Notes
///
/// This method is called before returning the assignment to the caller, so it is important that
/// `log_assignment` does not block the calling thread. It should not panic; errors that occur
/// during logging should be handled internally.
pub trait AssignmentLogger {
    /// Logs the assignment event to the storage system.
    fn log_assignment(&self, event: AssignmentEvent);
}

pub(crate) struct NoopAssignmentLogger;
impl AssignmentLogger for NoopAssignmentLogger {
    fn log_assignment(&self, _event: AssignmentEvent) {}
}

impl<T: Fn(AssignmentEvent)> AssignmentLogger for T {
    fn log_assignment(&self, event: AssignmentEvent) {
        self(event);
    }
}
