//! Eppo client-side SDK for Rust.
//!
//! # Overview
//!
//! The SDK revolves around an [`EppoClient`] that evaluates feature flag values for "subjects",
//! where each subject has a unique key and key-value attributes associated with it. The client
//! consults a configuration document fetched from the Eppo CDN (and refreshed by background
//! polling) and deterministically resolves each flag to a variation.
//!
//! # Typed assignments
//!
//! Every Eppo flag has a return type that is set once on creation in the dashboard. Once a flag
//! is created, assignments in code should be made using the corresponding typed function:
//! - [`EppoClient::get_string_assignment()`]
//! - [`EppoClient::get_integer_assignment()`]
//! - [`EppoClient::get_numeric_assignment()`]
//! - [`EppoClient::get_boolean_assignment()`]
//! - [`EppoClient::get_json_assignment()`]
//!
//! Every typed function takes the default value to serve when the flag cannot be resolved —
//! assignment functions never fail. The `_details` variants additionally return the evaluation
//! trace ([`EvaluationResultWithDetails`]), which explains how each allocation was considered.
//!
//! # Assignment logger
//!
//! An [`AssignmentLogger`] should be provided to save assignment events to your storage,
//! facilitating tracking of which user received which feature flag values. Events for a stable
//! assignment are de-duplicated (see [`AssignmentCache`]).
//!
//! ```
//! # use eppo_client::ClientConfig;
//! let config = ClientConfig::from_sdk_key("sdk-key").assignment_logger(|assignment| {
//!   println!("{:?}", assignment);
//! });
//! ```
//!
//! # Error handling
//!
//! Errors are represented by the [`Error`] enum. Assignment functions never return errors (they
//! serve the supplied default); errors are surfaced from initialization and explicit
//! configuration loads, where developer attention is warranted.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate for logging
//! messages. Consider integrating a `log`-compatible logger implementation for better visibility
//! into SDK operations.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

mod assignment;
mod assignment_cache;
mod assignment_logger;
mod client;
mod config;
mod configuration;
mod configuration_fetcher;
mod configuration_store;
mod error;
mod eval;
mod eval_details;
mod obfuscation;
mod persistent_cache;
mod poller;
mod rules;
mod sdk_key;
mod sharder;
pub mod ufc;
mod value;

pub use assignment::{Assignment, AssignmentValue};
pub use assignment_cache::{AssignmentCache, AssignmentCacheKey, AssignmentCacheValue};
pub use assignment_logger::{AssignmentEvent, AssignmentLogger};
pub use client::EppoClient;
pub use config::ClientConfig;
pub use configuration::Configuration;
pub use configuration_fetcher::SdkMetadata;
pub use error::{Error, EvaluationError, Result};
pub use eval_details::{
    AllocationEvaluationCode, AllocationEvaluationDetails, EvaluationDetails,
    EvaluationResultWithDetails, FlagEvaluationCode,
};
pub use persistent_cache::{PersistTelemetry, PersistentConfigurationCache};
pub use poller::{PollerThread, PollerThreadConfig};
pub use sdk_key::DEFAULT_BASE_URL;
pub use value::{Attributes, Value};
