use crate::obfuscation::md5_hex;
use crate::ufc::{ConfigurationFormat, Flag, Timestamp, TryParse, UniversalFlagConfig};

/// Remote configuration for the Eppo client. It's a central piece that defines client behavior.
///
/// `Configuration` is immutable: an update replaces the whole object.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Flags configuration document.
    pub flags: UniversalFlagConfig,
    /// Whether flag keys and values are obfuscated (CLIENT-format documents).
    pub obfuscated: bool,
    /// When this configuration was fetched by the SDK.
    pub fetched_at: Timestamp,
}

impl Configuration {
    /// Create a configuration from a server response. The document is treated as obfuscated iff
    /// it is in the CLIENT format.
    pub fn from_server_response(flags: UniversalFlagConfig, fetched_at: Timestamp) -> Self {
        let obfuscated = flags.format == ConfigurationFormat::Client;
        Configuration {
            flags,
            obfuscated,
            fetched_at,
        }
    }

    /// Create a configuration from an already-parsed document (e.g., one supplied by the host
    /// application for offline initialization).
    pub fn new(flags: UniversalFlagConfig, obfuscated: bool, fetched_at: Timestamp) -> Self {
        Configuration {
            flags,
            obfuscated,
            fetched_at,
        }
    }

    /// When the configuration was published by the server.
    pub fn published_at(&self) -> Timestamp {
        self.flags.created_at
    }

    /// Name of the environment this configuration belongs to.
    pub fn environment_name(&self) -> &str {
        &self.flags.environment.name
    }

    /// Look up a flag by its plain key, hashing the key first for obfuscated documents.
    pub(crate) fn get_flag(&self, flag_key: &str) -> Option<&TryParse<Flag>> {
        if self.obfuscated {
            self.flags.flags.get(&md5_hex(flag_key))
        } else {
            self.flags.flags.get(flag_key)
        }
    }
}
