//! De-duplication of assignment logging.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Mutex;

/// Identity of an assignment for de-duplication purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssignmentCacheKey {
    /// Key of the subject that received the assignment.
    pub subject_key: String,
    /// Key of the assigned flag.
    pub flag_key: String,
}

/// The last-logged assignment for a cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentCacheValue {
    /// Key of the matched allocation.
    pub allocation_key: String,
    /// Key of the served variation.
    pub variation_key: String,
}

/// Tracks the last logged `(allocation, variation)` pair per `(subject, flag)` so that a stable
/// assignment is logged only once. An assignment oscillating between two values is logged on
/// every transition.
///
/// The cache is unbounded: its key space is the product of active subjects and flags within one
/// SDK-key session, and it is dropped whenever the client is rebuilt with a different SDK key.
#[derive(Debug, Default)]
pub struct AssignmentCache {
    entries: Mutex<HashMap<AssignmentCacheKey, AssignmentCacheValue>>,
}

impl AssignmentCache {
    pub fn new() -> AssignmentCache {
        AssignmentCache::default()
    }

    /// Returns `true` iff the given assignment differs from the last logged one, and records it
    /// as last-logged in the same step.
    ///
    /// The check-and-set is a single atomic operation: two concurrent calls with identical
    /// arguments produce at most one `true`.
    pub fn should_log(&self, key: AssignmentCacheKey, value: AssignmentCacheValue) -> bool {
        let mut entries = self
            .entries
            .lock()
            .expect("thread holding assignment cache lock should not panic");
        match entries.entry(key) {
            Entry::Occupied(mut entry) => {
                if *entry.get() == value {
                    false
                } else {
                    entry.insert(value);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(value);
                true
            }
        }
    }

    /// Forget all recorded assignments.
    pub fn clear(&self) {
        self.entries
            .lock()
            .expect("thread holding assignment cache lock should not panic")
            .clear();
    }
}
