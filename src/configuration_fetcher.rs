//! An HTTP client that fetches configuration from the server.

use chrono::Utc;
use reqwest::{StatusCode, Url};

use crate::configuration::Configuration;
use crate::error::{Error, Result};
use crate::ufc::UniversalFlagConfig;

/// SDK identification sent along with configuration requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdkMetadata {
    /// SDK name.
    pub name: &'static str,
    /// SDK version.
    pub version: &'static str,
}

pub(crate) const SDK_METADATA: SdkMetadata = SdkMetadata {
    name: "rust-client",
    version: env!("CARGO_PKG_VERSION"),
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationFetcherConfig {
    pub base_url: String,
    pub sdk_key: String,
    pub sdk_metadata: SdkMetadata,
}

const UFC_ENDPOINT: &str = "/flag-config/v1/config";

/// A client that fetches Eppo configuration from the server.
pub struct ConfigurationFetcher {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    // The blocking client applies a 30-second timeout to each request by default.
    client: reqwest::blocking::Client,
    config: ConfigurationFetcherConfig,
    /// If we receive a 401 Unauthorized error during a request, it means the SDK key is not
    /// valid. We cache this error so we don't issue additional requests to the server.
    unauthorized: bool,
}

impl ConfigurationFetcher {
    pub fn new(config: ConfigurationFetcherConfig) -> ConfigurationFetcher {
        ConfigurationFetcher {
            client: reqwest::blocking::Client::new(),
            config,
            unauthorized: false,
        }
    }

    /// Fetch and parse a fresh configuration, issuing up to `max(1, max_retries)` HTTP attempts.
    ///
    /// Failed attempts are retried immediately; unauthorized and invalid-URL errors are not
    /// retried. A response that fails to parse is a fatal error for that attempt.
    pub fn fetch_configuration(&mut self, max_retries: u32) -> Result<Configuration> {
        if self.unauthorized {
            return Err(Error::Unauthorized);
        }

        let attempts = max_retries.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_once() {
                Ok(configuration) => return Ok(configuration),
                Err(err @ (Error::Unauthorized | Error::InvalidBaseUrl(_))) => return Err(err),
                Err(err) if attempt >= attempts => return Err(err),
                Err(err) => {
                    log::debug!(target: "eppo",
                                attempt,
                                attempts;
                                "retrying configuration fetch after error: {err}");
                }
            }
        }
    }

    fn fetch_once(&mut self) -> Result<Configuration> {
        let url = self.build_url()?;

        log::debug!(target: "eppo", "fetching flags configuration");
        let response = self.client.get(url).send()?;

        let response = response.error_for_status().map_err(|err| {
            if err.status() == Some(StatusCode::UNAUTHORIZED) {
                log::warn!(target: "eppo", "client is not authorized. Check your SDK key");
                self.unauthorized = true;
                Error::Unauthorized
            } else {
                log::warn!(target: "eppo",
                           "received non-200 response while fetching new configuration: {:?}", err);
                Error::from(err)
            }
        })?;

        let document: UniversalFlagConfig = serde_json::from_slice(&response.bytes()?)
            .map_err(|err| {
                log::warn!(target: "eppo", "failed to parse configuration response: {err}");
                Error::ConfigurationParseError
            })?;

        log::debug!(target: "eppo", "successfully fetched flags configuration");

        Ok(Configuration::from_server_response(document, Utc::now()))
    }

    fn build_url(&self) -> Result<Url> {
        Url::parse_with_params(
            &format!("{}{}", self.config.base_url, UFC_ENDPOINT),
            &[
                ("apiKey", &*self.config.sdk_key),
                ("sdkName", self.config.sdk_metadata.name),
                ("sdkVersion", self.config.sdk_metadata.version),
            ],
        )
        .map_err(Error::InvalidBaseUrl)
    }
}
