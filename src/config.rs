use std::sync::Arc;
use std::time::Duration;

use crate::assignment_cache::AssignmentCache;
use crate::assignment_logger::{AssignmentLogger, NoopAssignmentLogger};
use crate::client::EppoClient;
use crate::configuration::Configuration;
use crate::poller::PollerThreadConfig;

pub(crate) type ConfigurationChangeCallback = Box<dyn Fn(Arc<Configuration>) + Send + Sync>;

/// Configuration for [`EppoClient`].
///
/// # Examples
/// ```
/// # use eppo_client::ClientConfig;
/// let client = ClientConfig::from_sdk_key("sdk-key")
///     .assignment_logger(|event| {
///         println!("{:?}", event);
///     })
///     .to_client();
/// ```
pub struct ClientConfig {
    pub(crate) sdk_key: String,
    pub(crate) base_url: Option<String>,
    pub(crate) assignment_logger: Box<dyn AssignmentLogger + Send + Sync>,
    pub(crate) assignment_cache: Option<AssignmentCache>,
    pub(crate) with_persistent_cache: bool,
    pub(crate) polling_enabled: bool,
    pub(crate) poller_config: PollerThreadConfig,
    pub(crate) initial_configuration: Option<Arc<Configuration>>,
    pub(crate) configuration_change_callback: Option<ConfigurationChangeCallback>,
}

impl ClientConfig {
    /// Create a default Eppo configuration using the specified SDK key.
    ///
    /// ```
    /// # use eppo_client::ClientConfig;
    /// ClientConfig::from_sdk_key("sdk-key");
    /// ```
    pub fn from_sdk_key(sdk_key: impl Into<String>) -> Self {
        ClientConfig {
            sdk_key: sdk_key.into(),
            base_url: None,
            assignment_logger: Box::new(NoopAssignmentLogger),
            assignment_cache: Some(AssignmentCache::new()),
            with_persistent_cache: true,
            polling_enabled: false,
            poller_config: PollerThreadConfig::default(),
            initial_configuration: None,
            configuration_change_callback: None,
        }
    }

    /// Set assignment logger to store variation assignments to your data warehouse.
    ///
    /// ```
    /// # use eppo_client::ClientConfig;
    /// let config = ClientConfig::from_sdk_key("sdk-key").assignment_logger(|event| {
    ///   println!("{:?}", event);
    /// });
    /// ```
    pub fn assignment_logger(
        mut self,
        assignment_logger: impl AssignmentLogger + Send + Sync + 'static,
    ) -> Self {
        self.assignment_logger = Box::new(assignment_logger);
        self
    }

    /// Override base URL for API calls. Clients should use the default setting in most cases:
    /// when unset (or set to the default URL), the endpoint is derived from the SDK key.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Replace or disable the assignment de-duplication cache. Passing `None` makes every
    /// assignment loggable.
    pub fn assignment_cache(mut self, assignment_cache: Option<AssignmentCache>) -> Self {
        self.assignment_cache = assignment_cache;
        self
    }

    /// Enable or disable the on-disk configuration snapshot (enabled by default).
    pub fn persistent_cache(mut self, enabled: bool) -> Self {
        self.with_persistent_cache = enabled;
        self
    }

    /// Enable or disable background polling (disabled by default).
    pub fn polling_enabled(mut self, enabled: bool) -> Self {
        self.polling_enabled = enabled;
        self
    }

    /// Set the base interval between configuration refreshes.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poller_config.interval = interval;
        self
    }

    /// Set the upper bound of the random jitter added to each poll delay.
    pub fn poll_jitter(mut self, jitter: Duration) -> Self {
        self.poller_config.jitter = jitter;
        self
    }

    /// Seed the client with a configuration before the first fetch.
    pub fn initial_configuration(mut self, configuration: Configuration) -> Self {
        self.initial_configuration = Some(Arc::new(configuration));
        self
    }

    /// Install a callback fired whenever the active configuration is replaced. Last writer wins.
    pub fn on_configuration_change(
        mut self,
        callback: impl Fn(Arc<Configuration>) + Send + Sync + 'static,
    ) -> Self {
        self.configuration_change_callback = Some(Box::new(callback));
        self
    }

    /// Create a new [`EppoClient`] using the specified configuration.
    ///
    /// ```
    /// # use eppo_client::{ClientConfig, EppoClient};
    /// let client: EppoClient = ClientConfig::from_sdk_key("sdk-key").to_client();
    /// ```
    pub fn to_client(self) -> EppoClient {
        EppoClient::new(self)
    }
}
