//! On-disk snapshot of the latest configuration, one file per SDK key.
//!
//! The snapshot lets a freshly initialized client serve assignments before the first fetch
//! completes. Files for different SDK keys (i.e., environments) never alias: the file name is
//! derived from a stable MD5 digest of the SDK key.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::configuration::Configuration;
use crate::error::Result;
use crate::sharder::md5_hex;
use crate::ufc::{Timestamp, UniversalFlagConfig};

/// Serialized form of the snapshot file.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedConfiguration {
    flags_configuration: UniversalFlagConfig,
    obfuscated: bool,
    fetched_at: Timestamp,
    published_at: Timestamp,
}

/// Persist timestamps, for telemetry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PersistTelemetry {
    /// When the last write was started.
    pub last_persist_started_at: Option<Timestamp>,
    /// When the last write completed successfully.
    pub last_persist_completed_at: Option<Timestamp>,
}

/// Environment-keyed persistent configuration cache.
#[derive(Debug)]
pub struct PersistentConfigurationCache {
    file_path: PathBuf,
    telemetry: Mutex<PersistTelemetry>,
}

impl PersistentConfigurationCache {
    /// Create a cache rooted in the OS cache directory. Returns `None` on platforms without a
    /// known cache location.
    pub fn for_sdk_key(sdk_key: &str) -> Option<PersistentConfigurationCache> {
        let directory = dirs::cache_dir()?.join("eppo");
        Some(PersistentConfigurationCache::in_directory(
            &directory, sdk_key,
        ))
    }

    /// Create a cache rooted in an explicit directory.
    pub fn in_directory(directory: &Path, sdk_key: &str) -> PersistentConfigurationCache {
        let file_name = format!("eppo-configuration-{}.json", md5_hex(sdk_key));
        PersistentConfigurationCache {
            file_path: directory.join(file_name),
            telemetry: Mutex::new(PersistTelemetry::default()),
        }
    }

    /// Path of the snapshot file.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Load the previously persisted configuration.
    ///
    /// A missing, truncated, or otherwise corrupted file is non-fatal and yields `None`.
    pub fn load(&self) -> Option<Configuration> {
        let bytes = fs::read(&self.file_path).ok()?;
        let cached: CachedConfiguration = serde_json::from_slice(&bytes)
            .map_err(|err| {
                log::warn!(target: "eppo",
                           file:display = self.file_path.display();
                           "failed to decode cached configuration: {err}");
            })
            .ok()?;
        Some(Configuration::new(
            cached.flags_configuration,
            cached.obfuscated,
            cached.fetched_at,
        ))
    }

    /// Persist the configuration, replacing any previous snapshot.
    ///
    /// The write goes to a temporary file in the same directory which is fsynced and renamed
    /// over the target, so concurrent readers observe either the old or the new snapshot in its
    /// entirety (last writer wins).
    pub fn store(&self, configuration: &Configuration) -> Result<()> {
        self.telemetry
            .lock()
            .expect("thread holding telemetry lock should not panic")
            .last_persist_started_at = Some(chrono::Utc::now());

        let cached = CachedConfiguration {
            flags_configuration: configuration.flags.clone(),
            obfuscated: configuration.obfuscated,
            fetched_at: configuration.fetched_at,
            published_at: configuration.published_at(),
        };
        let encoded = serde_json::to_vec(&cached).map_err(std::io::Error::other)?;

        if let Some(directory) = self.file_path.parent() {
            fs::create_dir_all(directory)?;
        }
        let tmp_path = self.file_path.with_extension(format!("tmp.{}", std::process::id()));
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&encoded)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.file_path)?;

        self.telemetry
            .lock()
            .expect("thread holding telemetry lock should not panic")
            .last_persist_completed_at = Some(chrono::Utc::now());

        Ok(())
    }

    /// Remove the snapshot file. Succeeds if the file does not exist.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.file_path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Timestamps of the last persist attempt.
    pub fn telemetry(&self) -> PersistTelemetry {
        *self
            .telemetry
            .lock()
            .expect("thread holding telemetry lock should not panic")
    }
}
