use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use crate::assignment::AssignmentValue;
use crate::assignment_cache::{AssignmentCache, AssignmentCacheKey, AssignmentCacheValue};
use crate::assignment_logger::{AssignmentEvent, AssignmentLogger};
use crate::config::{ClientConfig, ConfigurationChangeCallback};
use crate::configuration::Configuration;
use crate::configuration_fetcher::{
    ConfigurationFetcher, ConfigurationFetcherConfig, SDK_METADATA,
};
use crate::configuration_store::ConfigurationStore;
use crate::error::Result;
use crate::eval;
use crate::eval_details::EvaluationResultWithDetails;
use crate::persistent_cache::PersistentConfigurationCache;
use crate::poller::{PollerThread, PollerThreadConfig};
use crate::sdk_key::resolve_base_url;
use crate::ufc::VariationType;
use crate::value::Attributes;

/// Number of HTTP attempts for explicit fetches (`initialize`/`load`). The poller performs one
/// attempt per tick, relying on its own backoff instead.
const FETCH_MAX_RETRIES: u32 = 3;

/// The process-wide client instance managed by [`EppoClient::initialize`].
static SHARED_INSTANCE: Mutex<Option<Arc<EppoClient>>> = Mutex::new(None);

/// Applies a new configuration: replaces the store content, schedules the persistent snapshot
/// write, and notifies the change callback.
///
/// Shared between the client and its poller thread.
struct ConfigurationInstaller {
    store: Arc<ConfigurationStore>,
    persistent_cache: Option<Arc<PersistentConfigurationCache>>,
    change_callback: Mutex<Option<ConfigurationChangeCallback>>,
}

impl ConfigurationInstaller {
    fn install(&self, configuration: Arc<Configuration>, notify: bool) {
        self.store.set_configuration(configuration.clone());
        self.persist(configuration.clone());
        if notify {
            let callback = self
                .change_callback
                .lock()
                .expect("thread holding callback lock should not panic");
            if let Some(callback) = &*callback {
                callback(configuration);
            }
        }
    }

    /// Snapshot writes happen on a background thread: persistence failures are non-fatal and
    /// must not delay assignment serving.
    fn persist(&self, configuration: Arc<Configuration>) {
        let Some(cache) = &self.persistent_cache else {
            return;
        };
        let cache = Arc::clone(cache);
        std::thread::spawn(move || {
            if let Err(err) = cache.store(&configuration) {
                log::warn!(target: "eppo", "failed to persist configuration: {err}");
            }
        });
    }
}

/// A client for the Eppo API.
///
/// In order to create a client instance, first create [`ClientConfig`].
///
/// The client is usually managed as a process-wide shared instance through
/// [`EppoClient::initialize`], but it can also be constructed directly with
/// [`ClientConfig::to_client`].
///
/// # Examples
/// ```no_run
/// # use eppo_client::{ClientConfig, EppoClient};
/// let client = EppoClient::initialize(ClientConfig::from_sdk_key("sdk-key")).unwrap();
/// ```
pub struct EppoClient {
    sdk_key: String,
    configuration_store: Arc<ConfigurationStore>,
    installer: Arc<ConfigurationInstaller>,
    fetcher_config: ConfigurationFetcherConfig,
    fetcher: Mutex<ConfigurationFetcher>,
    assignment_logger: Box<dyn AssignmentLogger + Send + Sync>,
    assignment_cache: Option<AssignmentCache>,
    poller_config: PollerThreadConfig,
    polling_enabled: bool,
    poller: Mutex<Option<PollerThread>>,
}

impl EppoClient {
    /// Create a new client without registering it as the shared instance.
    ///
    /// The client is seeded from `initial_configuration` when supplied, falling back to the
    /// persistent snapshot of a previous session. No network request is made until
    /// [`EppoClient::load`] or polling.
    pub fn new(config: ClientConfig) -> EppoClient {
        let base_url = resolve_base_url(config.base_url.as_deref(), &config.sdk_key);
        let fetcher_config = ConfigurationFetcherConfig {
            base_url,
            sdk_key: config.sdk_key.clone(),
            sdk_metadata: SDK_METADATA,
        };

        let store = Arc::new(ConfigurationStore::new());
        let persistent_cache = if config.with_persistent_cache {
            PersistentConfigurationCache::for_sdk_key(&config.sdk_key).map(Arc::new)
        } else {
            None
        };

        if let Some(seed) = config.initial_configuration {
            store.set_configuration(seed);
        } else if let Some(cache) = &persistent_cache {
            if let Some(cached) = cache.load() {
                log::debug!(target: "eppo", "seeding configuration from persistent cache");
                store.set_configuration(Arc::new(cached));
            }
        }

        let installer = Arc::new(ConfigurationInstaller {
            store: store.clone(),
            persistent_cache,
            change_callback: Mutex::new(config.configuration_change_callback),
        });

        EppoClient {
            sdk_key: config.sdk_key,
            configuration_store: store,
            installer,
            fetcher: Mutex::new(ConfigurationFetcher::new(fetcher_config.clone())),
            fetcher_config,
            assignment_logger: config.assignment_logger,
            assignment_cache: config.assignment_cache,
            poller_config: config.poller_config,
            polling_enabled: config.polling_enabled,
            poller: Mutex::new(None),
        }
    }

    /// Initialize the process-wide shared instance.
    ///
    /// At most one instance is active per process:
    /// - called again with the same SDK key, returns the existing instance untouched (the
    ///   assignment de-duplication state is kept);
    /// - called with a different SDK key, stops and replaces the active instance, discarding its
    ///   assignment de-duplication state.
    ///
    /// Performs one configuration fetch, fires the change callback, and starts polling if
    /// enabled; the poller's first refresh follows one interval later, as the initial fetch has
    /// already happened. The fetch error (if any) is returned after the instance is registered,
    /// so the client stays usable with the seeded or previously cached configuration.
    pub fn initialize(config: ClientConfig) -> Result<Arc<EppoClient>> {
        let mut shared = SHARED_INSTANCE
            .lock()
            .expect("thread holding shared instance lock should not panic");

        if let Some(existing) = &*shared {
            if existing.sdk_key == config.sdk_key {
                return Ok(Arc::clone(existing));
            }
            existing.retire();
        }

        let client = Arc::new(EppoClient::new(config));
        *shared = Some(Arc::clone(&client));
        drop(shared);

        let fetched = client.load();
        if client.polling_enabled {
            // The initial fetch already happened above; the poller's first refresh comes one
            // interval later.
            client.start_polling_inner(client.poller_config, false)?;
        }
        fetched?;

        Ok(client)
    }

    /// Initialize the shared instance without a network fetch, serving assignments from
    /// `initial_configuration` (see [`ClientConfig::initial_configuration`]).
    ///
    /// Unlike [`EppoClient::initialize`], the configuration-change callback is not invoked.
    pub fn initialize_offline(config: ClientConfig) -> Result<Arc<EppoClient>> {
        let mut shared = SHARED_INSTANCE
            .lock()
            .expect("thread holding shared instance lock should not panic");

        if let Some(existing) = &*shared {
            if existing.sdk_key == config.sdk_key {
                return Ok(Arc::clone(existing));
            }
            existing.retire();
        }

        let client = Arc::new(EppoClient::new(config));
        *shared = Some(Arc::clone(&client));
        drop(shared);

        // Snapshot the seeded configuration so the next session can start from it.
        if let Some(configuration) = client.configuration_store.get_configuration() {
            client.installer.persist(configuration);
        }
        if client.polling_enabled {
            // Offline init performs no fetch of its own, so the poller's immediate first tick
            // is the initial fetch. Like any refresh, it fires the change callback.
            client.start_polling()?;
        }

        Ok(client)
    }

    /// Returns the active shared instance, if any.
    pub fn shared_instance() -> Option<Arc<EppoClient>> {
        SHARED_INSTANCE
            .lock()
            .expect("thread holding shared instance lock should not panic")
            .clone()
    }

    /// Drop the shared instance and stop its poller. Intended for tests.
    pub fn reset_shared_instance() {
        let client = SHARED_INSTANCE
            .lock()
            .expect("thread holding shared instance lock should not panic")
            .take();
        if let Some(client) = client {
            client.retire();
        }
    }

    /// Stop background work before this instance is replaced or dropped.
    fn retire(&self) {
        self.stop_polling();
        if let Some(cache) = &self.assignment_cache {
            cache.clear();
        }
    }

    /// Fetch a fresh configuration, install it, and notify the change callback.
    ///
    /// On failure the current in-memory configuration (if any) stays in place.
    pub fn load(&self) -> Result<()> {
        let configuration = {
            let mut fetcher = self
                .fetcher
                .lock()
                .expect("thread holding fetcher lock should not panic");
            fetcher.fetch_configuration(FETCH_MAX_RETRIES)?
        };
        self.installer.install(Arc::new(configuration), true);
        Ok(())
    }

    /// Returns the currently active configuration, if any.
    pub fn configuration(&self) -> Option<Arc<Configuration>> {
        self.configuration_store.get_configuration()
    }

    /// Install (replace) a callback fired whenever the active configuration is replaced.
    pub fn on_configuration_change(
        &self,
        callback: impl Fn(Arc<Configuration>) + Send + Sync + 'static,
    ) {
        *self
            .installer
            .change_callback
            .lock()
            .expect("thread holding callback lock should not panic") = Some(Box::new(callback));
    }

    /// Start background polling with the configured interval, refreshing once immediately. Does
    /// nothing if polling is already active.
    pub fn start_polling(&self) -> Result<()> {
        self.start_polling_inner(self.poller_config, true)
    }

    /// Start background polling with an explicit base interval.
    pub fn start_polling_with_interval(&self, interval: Duration) -> Result<()> {
        self.start_polling_inner(
            PollerThreadConfig {
                interval,
                ..self.poller_config
            },
            true,
        )
    }

    fn start_polling_inner(
        &self,
        poller_config: PollerThreadConfig,
        immediate: bool,
    ) -> Result<()> {
        let mut poller_slot = self
            .poller
            .lock()
            .expect("thread holding poller lock should not panic");
        if poller_slot.is_some() {
            return Ok(());
        }

        let mut fetcher = ConfigurationFetcher::new(self.fetcher_config.clone());
        let installer = Arc::clone(&self.installer);
        let refresh = move || {
            let configuration = fetcher.fetch_configuration(1)?;
            installer.install(Arc::new(configuration), true);
            Ok(())
        };
        let poller = if immediate {
            PollerThread::start(poller_config, refresh)?
        } else {
            PollerThread::start_delayed(poller_config, refresh)?
        };
        *poller_slot = Some(poller);
        Ok(())
    }

    /// Stop background polling. Idempotent; pending work is cancelled cooperatively (an
    /// in-flight refresh completes).
    pub fn stop_polling(&self) {
        let poller = self
            .poller
            .lock()
            .expect("thread holding poller lock should not panic")
            .take();
        if let Some(poller) = poller {
            poller.stop();
        }
    }

    /// Remove the persistent configuration snapshot for this client's SDK key.
    pub fn clear_persistent_cache(&self) -> Result<()> {
        match &self.installer.persistent_cache {
            Some(cache) => cache.clear(),
            None => Ok(()),
        }
    }

    /// Retrieves the assignment value for a given feature flag and subject as a string.
    ///
    /// Never fails: on any evaluation error (including a flag of a different type), returns
    /// `default`.
    ///
    /// # Examples
    /// ```no_run
    /// # fn test(client: &eppo_client::EppoClient) {
    /// let assignment = client.get_string_assignment(
    ///     "a-string-flag",
    ///     "user-id",
    ///     &[("language".into(), "en".into())].into_iter().collect(),
    ///     "default_value".to_owned(),
    /// );
    /// # }
    /// ```
    pub fn get_string_assignment(
        &self,
        flag_key: &str,
        subject_key: &str,
        subject_attributes: &Attributes,
        default: String,
    ) -> String {
        self.typed_assignment(
            flag_key,
            subject_key,
            subject_attributes,
            VariationType::String,
            default,
            AssignmentValue::to_string,
        )
    }

    /// Retrieves the assignment value for a given feature flag and subject as an integer.
    ///
    /// Never fails: on any evaluation error, returns `default`.
    pub fn get_integer_assignment(
        &self,
        flag_key: &str,
        subject_key: &str,
        subject_attributes: &Attributes,
        default: i64,
    ) -> i64 {
        self.typed_assignment(
            flag_key,
            subject_key,
            subject_attributes,
            VariationType::Integer,
            default,
            |value| value.as_integer(),
        )
    }

    /// Retrieves the assignment value for a given feature flag and subject as a numeric value.
    ///
    /// Never fails: on any evaluation error, returns `default`.
    pub fn get_numeric_assignment(
        &self,
        flag_key: &str,
        subject_key: &str,
        subject_attributes: &Attributes,
        default: f64,
    ) -> f64 {
        self.typed_assignment(
            flag_key,
            subject_key,
            subject_attributes,
            VariationType::Numeric,
            default,
            |value| value.as_numeric(),
        )
    }

    /// Retrieves the assignment value for a given feature flag and subject as a boolean.
    ///
    /// Never fails: on any evaluation error, returns `default`.
    ///
    /// # Examples
    /// ```no_run
    /// # fn test(client: &eppo_client::EppoClient) {
    /// let enabled = client.get_boolean_assignment(
    ///     "a-boolean-flag",
    ///     "user-id",
    ///     &[("age".to_owned(), 42.0.into())].into_iter().collect(),
    ///     false,
    /// );
    /// # }
    /// ```
    pub fn get_boolean_assignment(
        &self,
        flag_key: &str,
        subject_key: &str,
        subject_attributes: &Attributes,
        default: bool,
    ) -> bool {
        self.typed_assignment(
            flag_key,
            subject_key,
            subject_attributes,
            VariationType::Boolean,
            default,
            |value| value.as_boolean(),
        )
    }

    /// Retrieves the assignment value for a given feature flag and subject as a JSON value.
    ///
    /// Never fails: on any evaluation error, returns `default`.
    pub fn get_json_assignment(
        &self,
        flag_key: &str,
        subject_key: &str,
        subject_attributes: &Attributes,
        default: serde_json::Value,
    ) -> serde_json::Value {
        self.typed_assignment(
            flag_key,
            subject_key,
            subject_attributes,
            VariationType::Json,
            default,
            AssignmentValue::to_json,
        )
    }

    /// Same as [`EppoClient::get_string_assignment`], but additionally returns the evaluation
    /// trace.
    pub fn get_string_assignment_details(
        &self,
        flag_key: &str,
        subject_key: &str,
        subject_attributes: &Attributes,
        default: String,
    ) -> EvaluationResultWithDetails<String> {
        self.typed_assignment_details(
            flag_key,
            subject_key,
            subject_attributes,
            VariationType::String,
            default,
            AssignmentValue::to_string,
        )
    }

    /// Same as [`EppoClient::get_integer_assignment`], but additionally returns the evaluation
    /// trace.
    pub fn get_integer_assignment_details(
        &self,
        flag_key: &str,
        subject_key: &str,
        subject_attributes: &Attributes,
        default: i64,
    ) -> EvaluationResultWithDetails<i64> {
        self.typed_assignment_details(
            flag_key,
            subject_key,
            subject_attributes,
            VariationType::Integer,
            default,
            |value| value.as_integer(),
        )
    }

    /// Same as [`EppoClient::get_numeric_assignment`], but additionally returns the evaluation
    /// trace.
    pub fn get_numeric_assignment_details(
        &self,
        flag_key: &str,
        subject_key: &str,
        subject_attributes: &Attributes,
        default: f64,
    ) -> EvaluationResultWithDetails<f64> {
        self.typed_assignment_details(
            flag_key,
            subject_key,
            subject_attributes,
            VariationType::Numeric,
            default,
            |value| value.as_numeric(),
        )
    }

    /// Same as [`EppoClient::get_boolean_assignment`], but additionally returns the evaluation
    /// trace.
    pub fn get_boolean_assignment_details(
        &self,
        flag_key: &str,
        subject_key: &str,
        subject_attributes: &Attributes,
        default: bool,
    ) -> EvaluationResultWithDetails<bool> {
        self.typed_assignment_details(
            flag_key,
            subject_key,
            subject_attributes,
            VariationType::Boolean,
            default,
            |value| value.as_boolean(),
        )
    }

    /// Same as [`EppoClient::get_json_assignment`], but additionally returns the evaluation
    /// trace.
    pub fn get_json_assignment_details(
        &self,
        flag_key: &str,
        subject_key: &str,
        subject_attributes: &Attributes,
        default: serde_json::Value,
    ) -> EvaluationResultWithDetails<serde_json::Value> {
        self.typed_assignment_details(
            flag_key,
            subject_key,
            subject_attributes,
            VariationType::Json,
            default,
            AssignmentValue::to_json,
        )
    }

    fn typed_assignment<T>(
        &self,
        flag_key: &str,
        subject_key: &str,
        subject_attributes: &Attributes,
        expected_type: VariationType,
        default: T,
        convert: impl FnOnce(AssignmentValue) -> Option<T>,
    ) -> T {
        let configuration = self.configuration_store.get_configuration();
        let result = eval::get_assignment(
            configuration.as_deref(),
            flag_key,
            subject_key,
            subject_attributes,
            Some(expected_type),
            Utc::now(),
        );
        match result {
            Ok(Some(assignment)) => {
                self.log_event(assignment.event);
                // The conversion cannot fail because the type is checked during evaluation.
                convert(assignment.value).unwrap_or(default)
            }
            Ok(None) => default,
            // The failure has already been logged by the evaluator.
            Err(_) => default,
        }
    }

    fn typed_assignment_details<T>(
        &self,
        flag_key: &str,
        subject_key: &str,
        subject_attributes: &Attributes,
        expected_type: VariationType,
        default: T,
        convert: impl FnOnce(AssignmentValue) -> Option<T>,
    ) -> EvaluationResultWithDetails<T> {
        let configuration = self.configuration_store.get_configuration();
        let (result, event) = eval::get_assignment_details(
            configuration.as_deref(),
            flag_key,
            subject_key,
            subject_attributes,
            Some(expected_type),
            Utc::now(),
        );
        self.log_event(event);
        result.map(|value| value.and_then(convert).unwrap_or(default))
    }

    /// Deliver the event to the assignment logger unless the de-duplication cache has already
    /// seen this exact assignment.
    fn log_event(&self, event: Option<AssignmentEvent>) {
        let Some(event) = event else {
            return;
        };

        if let Some(cache) = &self.assignment_cache {
            let admitted = cache.should_log(
                AssignmentCacheKey {
                    subject_key: event.subject.clone(),
                    flag_key: event.feature_flag.clone(),
                },
                AssignmentCacheValue {
                    allocation_key: event.allocation.clone(),
                    variation_key: event.variation.clone(),
                },
            );
            if !admitted {
                return;
            }
        }

        log::trace!(target: "eppo",
                    event:serde;
                    "logging assignment");
        self.assignment_logger.log_assignment(event);
    }
}

impl Drop for EppoClient {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use chrono::Utc;

    use crate::assignment_logger::AssignmentEvent;
    use crate::configuration::Configuration;
    use crate::eval_details::FlagEvaluationCode;
    use crate::ufc::{
        Allocation, ConfigurationFormat, Environment, Flag, Split, TryParse,
        UniversalFlagConfig, Variation, VariationType,
    };
    use crate::{ClientConfig, EppoClient};

    fn test_configuration() -> Configuration {
        let boolean_flag = Flag {
            key: "a-boolean-flag".to_owned(),
            enabled: true,
            variation_type: VariationType::Boolean,
            variations: [(
                "on".to_owned(),
                Variation {
                    key: "on".to_owned(),
                    value: true.into(),
                },
            )]
            .into(),
            allocations: vec![Allocation {
                key: "rollout".to_owned(),
                rules: vec![],
                start_at: None,
                end_at: None,
                splits: vec![Split {
                    shards: vec![],
                    variation_key: "on".to_owned(),
                    extra_logging: HashMap::new(),
                }],
                do_log: true,
                entity_id: None,
            }],
            total_shards: 10_000,
            entity_id: None,
        };
        let integer_flag = Flag {
            key: "an-integer-flag".to_owned(),
            enabled: true,
            variation_type: VariationType::Integer,
            variations: [(
                "three".to_owned(),
                Variation {
                    key: "three".to_owned(),
                    value: 3.0.into(),
                },
            )]
            .into(),
            allocations: vec![Allocation {
                key: "rollout".to_owned(),
                rules: vec![],
                start_at: None,
                end_at: None,
                splits: vec![Split {
                    shards: vec![],
                    variation_key: "three".to_owned(),
                    extra_logging: HashMap::new(),
                }],
                do_log: true,
                entity_id: None,
            }],
            total_shards: 10_000,
            entity_id: None,
        };

        Configuration::from_server_response(
            UniversalFlagConfig {
                created_at: Utc::now(),
                format: ConfigurationFormat::Server,
                environment: Environment {
                    name: "Test".to_owned(),
                },
                flags: [
                    (
                        "a-boolean-flag".to_owned(),
                        TryParse::Parsed(boolean_flag),
                    ),
                    (
                        "an-integer-flag".to_owned(),
                        TryParse::Parsed(integer_flag),
                    ),
                ]
                .into(),
            },
            Utc::now(),
        )
    }

    fn test_client() -> EppoClient {
        ClientConfig::from_sdk_key("test-key")
            .persistent_cache(false)
            .initial_configuration(test_configuration())
            .to_client()
    }

    /// Tests touching the process-wide shared instance must not run concurrently.
    static SHARED_INSTANCE_TEST_LOCK: Mutex<()> = Mutex::new(());

    /// A single-purpose configuration endpoint that counts the requests it serves.
    fn serve_configuration() -> (String, Arc<AtomicU32>) {
        let body =
            r#"{"createdAt":"2024-07-18T00:00:00Z","environment":{"name":"Served"},"flags":{}}"#;
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}/api", listener.local_addr().unwrap());
        let requests = Arc::new(AtomicU32::new(0));
        {
            let requests = Arc::clone(&requests);
            std::thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(mut stream) = stream else { continue };
                    let mut buf = [0u8; 1024];
                    let mut head = Vec::new();
                    while !head.windows(4).any(|window| window == b"\r\n\r\n") {
                        match stream.read(&mut buf) {
                            Ok(0) | Err(_) => break,
                            Ok(n) => head.extend_from_slice(&buf[..n]),
                        }
                    }
                    if head.is_empty() {
                        continue;
                    }
                    requests.fetch_add(1, Ordering::SeqCst);
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
                         Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = stream.write_all(response.as_bytes());
                }
            });
        }
        (base_url, requests)
    }

    #[derive(Clone, Default)]
    struct RecordingLogger {
        events: Arc<Mutex<Vec<AssignmentEvent>>>,
    }
    impl crate::AssignmentLogger for RecordingLogger {
        fn log_assignment(&self, event: AssignmentEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[test]
    fn returns_default_while_no_configuration() {
        let client = ClientConfig::from_sdk_key("test-key")
            .persistent_cache(false)
            .to_client();

        assert!(client.get_boolean_assignment("a-boolean-flag", "subject", &HashMap::new(), true));
        let details = client.get_boolean_assignment_details(
            "a-boolean-flag",
            "subject",
            &HashMap::new(),
            false,
        );
        assert!(!details.variation);
        assert_eq!(
            details.evaluation_details.flag_evaluation_code,
            FlagEvaluationCode::ConfigurationMissing
        );
    }

    #[test]
    fn serves_typed_assignments_from_configuration() {
        let client = test_client();

        assert!(client.get_boolean_assignment("a-boolean-flag", "subject", &HashMap::new(), false));
        assert_eq!(
            client.get_integer_assignment("an-integer-flag", "subject", &HashMap::new(), 0),
            3
        );
        // Unknown flag serves the default.
        assert_eq!(
            client.get_string_assignment(
                "missing-flag",
                "subject",
                &HashMap::new(),
                "fallback".to_owned()
            ),
            "fallback"
        );
    }

    #[test]
    fn type_mismatch_serves_default_and_skips_logging() {
        let logger = RecordingLogger::default();
        let client = ClientConfig::from_sdk_key("test-key")
            .persistent_cache(false)
            .initial_configuration(test_configuration())
            .assignment_logger(logger.clone())
            .to_client();

        // An integer flag queried as boolean.
        assert!(client.get_boolean_assignment(
            "an-integer-flag",
            "subject",
            &HashMap::new(),
            true
        ));
        let details = client.get_boolean_assignment_details(
            "an-integer-flag",
            "subject",
            &HashMap::new(),
            true,
        );
        assert!(details.variation);
        assert_eq!(
            details.evaluation_details.flag_evaluation_code,
            FlagEvaluationCode::TypeMismatch
        );

        assert!(logger.events.lock().unwrap().is_empty());
    }

    #[test]
    fn repeated_assignments_are_logged_once() {
        let logger = RecordingLogger::default();
        let client = ClientConfig::from_sdk_key("test-key")
            .persistent_cache(false)
            .initial_configuration(test_configuration())
            .assignment_logger(logger.clone())
            .to_client();

        for _ in 0..3 {
            client.get_boolean_assignment("a-boolean-flag", "subject", &HashMap::new(), false);
        }
        assert_eq!(logger.events.lock().unwrap().len(), 1);

        // A different subject is a separate cache entry.
        client.get_boolean_assignment("a-boolean-flag", "another", &HashMap::new(), false);
        assert_eq!(logger.events.lock().unwrap().len(), 2);
    }

    #[test]
    fn disabled_assignment_cache_logs_every_assignment() {
        let logger = RecordingLogger::default();
        let client = ClientConfig::from_sdk_key("test-key")
            .persistent_cache(false)
            .initial_configuration(test_configuration())
            .assignment_logger(logger.clone())
            .assignment_cache(None)
            .to_client();

        for _ in 0..3 {
            client.get_boolean_assignment("a-boolean-flag", "subject", &HashMap::new(), false);
        }
        assert_eq!(logger.events.lock().unwrap().len(), 3);
    }

    #[test]
    fn change_callback_fires_on_install() {
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let client = ClientConfig::from_sdk_key("test-key")
            .persistent_cache(false)
            .on_configuration_change({
                let seen = Arc::clone(&seen);
                move |configuration| {
                    seen.lock()
                        .unwrap()
                        .push(configuration.environment_name().to_owned());
                }
            })
            .to_client();

        client
            .installer
            .install(Arc::new(test_configuration()), true);
        assert_eq!(seen.lock().unwrap().as_slice(), ["Test".to_owned()]);

        // Install without notification (offline seeding path).
        client
            .installer
            .install(Arc::new(test_configuration()), false);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn initialize_with_polling_fetches_and_notifies_once() {
        let _guard = SHARED_INSTANCE_TEST_LOCK
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        EppoClient::reset_shared_instance();

        let (base_url, requests) = serve_configuration();
        let notifications = Arc::new(AtomicU32::new(0));
        let client = EppoClient::initialize(
            ClientConfig::from_sdk_key("polling-key")
                .base_url(base_url)
                .persistent_cache(false)
                .polling_enabled(true)
                .poll_interval(Duration::from_secs(600))
                .poll_jitter(Duration::ZERO)
                .on_configuration_change({
                    let notifications = Arc::clone(&notifications);
                    move |_configuration| {
                        notifications.fetch_add(1, Ordering::SeqCst);
                    }
                }),
        )
        .unwrap();

        assert_eq!(
            client.configuration().unwrap().environment_name(),
            "Served"
        );

        // Give a redundant poller tick a chance to surface before asserting there was none:
        // initialization must perform exactly one fetch and one change notification.
        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(requests.load(Ordering::SeqCst), 1);
        assert_eq!(notifications.load(Ordering::SeqCst), 1);

        EppoClient::reset_shared_instance();
    }

    #[test]
    fn initialize_offline_with_polling_refreshes_immediately() {
        let _guard = SHARED_INSTANCE_TEST_LOCK
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        EppoClient::reset_shared_instance();

        let (base_url, requests) = serve_configuration();
        let notifications = Arc::new(AtomicU32::new(0));
        let client = EppoClient::initialize_offline(
            ClientConfig::from_sdk_key("offline-polling-key")
                .base_url(base_url)
                .persistent_cache(false)
                .polling_enabled(true)
                .poll_interval(Duration::from_secs(600))
                .poll_jitter(Duration::ZERO)
                .initial_configuration(test_configuration())
                .on_configuration_change({
                    let notifications = Arc::clone(&notifications);
                    move |_configuration| {
                        notifications.fetch_add(1, Ordering::SeqCst);
                    }
                }),
        )
        .unwrap();

        // Seeding does not fire the callback. The poller's immediate first tick performs the
        // initial fetch and, like any refresh, installs and notifies.
        let deadline = Instant::now() + Duration::from_secs(5);
        while notifications.load(Ordering::SeqCst) < 1 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(requests.load(Ordering::SeqCst), 1);
        assert_eq!(notifications.load(Ordering::SeqCst), 1);
        assert_eq!(
            client.configuration().unwrap().environment_name(),
            "Served"
        );

        EppoClient::reset_shared_instance();
    }

    #[test]
    fn shared_instance_lifecycle() {
        let _guard = SHARED_INSTANCE_TEST_LOCK
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        EppoClient::reset_shared_instance();
        assert!(EppoClient::shared_instance().is_none());

        let first = EppoClient::initialize_offline(
            ClientConfig::from_sdk_key("key-one")
                .persistent_cache(false)
                .initial_configuration(test_configuration()),
        )
        .unwrap();

        // Same SDK key returns the same instance.
        let again = EppoClient::initialize_offline(
            ClientConfig::from_sdk_key("key-one").persistent_cache(false),
        )
        .unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        // A different SDK key replaces the active instance.
        let second = EppoClient::initialize_offline(
            ClientConfig::from_sdk_key("key-two").persistent_cache(false),
        )
        .unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(
            &second,
            &EppoClient::shared_instance().unwrap()
        ));

        EppoClient::reset_shared_instance();
        assert!(EppoClient::shared_instance().is_none());
    }
}
