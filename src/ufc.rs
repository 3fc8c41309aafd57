//! Configuration wire format.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::value::Value;

#[allow(missing_docs)]
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Universal flag configuration. This is the response format from the configuration endpoint.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UniversalFlagConfig {
    /// When the configuration was published by the server.
    pub created_at: Timestamp,
    /// Which representation the document uses.
    #[serde(default)]
    pub format: ConfigurationFormat,
    /// Environment this configuration belongs to.
    pub environment: Environment,
    /// Flags configuration.
    ///
    /// Value is wrapped in `TryParse` so that if we fail to parse one flag (e.g., new server
    /// format), we can still serve other flags.
    pub flags: HashMap<String, TryParse<Flag>>,
}

/// Wire representation of the configuration document.
///
/// `Client`-format documents are served to client SDK keys and have their keys and values
/// obfuscated (MD5-hashed flag keys, base64-encoded strings).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigurationFormat {
    /// Plain representation served to server SDKs.
    #[default]
    Server,
    /// Client representation, subject to obfuscation.
    Client,
}

/// Environment a configuration document belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Name of the environment.
    pub name: String,
}

/// `TryParse` allows the subfield to fail parsing without failing the parsing of the whole
/// structure.
///
/// This can be helpful to isolate errors in a subtree. e.g., if configuration for one flag
/// parses, the rest of the flags are still usable.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum TryParse<T> {
    /// Successfully parsed.
    Parsed(T),
    /// Parsing failed.
    ParseFailed(serde_json::Value),
}

impl<'a, T> From<&'a TryParse<T>> for Option<&'a T> {
    fn from(value: &TryParse<T>) -> Option<&T> {
        match value {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(_) => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct Flag {
    pub key: String,
    pub enabled: bool,
    pub variation_type: VariationType,
    pub variations: HashMap<String, Variation>,
    pub allocations: Vec<Allocation>,
    pub total_shards: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<i64>,
}

/// Type of the variation.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum VariationType {
    String,
    Integer,
    Numeric,
    Boolean,
    Json,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct Variation {
    pub key: String,
    /// Value served when this variation is matched. The type is untagged on the wire; it is
    /// interpreted against the flag-level [`VariationType`] at evaluation time.
    #[serde(deserialize_with = "deserialize_variation_value")]
    pub value: Value,
}

/// Variation values appear on the wire either bare or wrapped as `{"value": ...}`. Any other
/// object shape is rejected.
fn deserialize_variation_value<'de, D>(deserializer: D) -> Result<Value, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MaybeWrapped {
        Wrapped { value: Value },
        Bare(Value),
    }
    Ok(match MaybeWrapped::deserialize(deserializer)? {
        MaybeWrapped::Wrapped { value } => value,
        MaybeWrapped::Bare(value) => value,
    })
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct Allocation {
    pub key: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Inclusive lower bound of the allocation's active window. In obfuscated configurations the
    /// wire value is base64(ISO-8601); it is decoded at parse time.
    #[serde(default, with = "wire_timestamp", skip_serializing_if = "Option::is_none")]
    pub start_at: Option<Timestamp>,
    /// Inclusive upper bound of the allocation's active window.
    #[serde(default, with = "wire_timestamp", skip_serializing_if = "Option::is_none")]
    pub end_at: Option<Timestamp>,
    pub splits: Vec<Split>,
    #[serde(default = "default_do_log")]
    pub do_log: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<i64>,
}

fn default_do_log() -> bool {
    true
}

/// `startAt`/`endAt` arrive as ISO-8601 strings in plain configurations and as base64(ISO-8601)
/// in obfuscated ones. Serialization always produces the plain form.
mod wire_timestamp {
    use chrono::SecondsFormat;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Timestamp;
    use crate::obfuscation::parse_timestamp;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(s) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        parse_timestamp(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {s:?}")))
    }

    pub fn serialize<S>(value: &Option<Timestamp>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(t) => {
                serializer.serialize_str(&t.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            None => serializer.serialize_none(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct Split {
    pub shards: Vec<Shard>,
    pub variation_key: String,
    /// Operational metadata (e.g., holdouts) carried through to the assignment log record.
    /// Opaque to evaluation.
    #[serde(default)]
    pub extra_logging: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct Shard {
    pub salt: String,
    pub ranges: Vec<ShardRange>,
}

/// Half-open interval `[start, end)` of shard indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct ShardRange {
    pub start: u64,
    pub end: u64,
}

impl ShardRange {
    pub(crate) fn contains(&self, v: u64) -> bool {
        self.start <= v && v < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_more::From)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct Rule {
    pub conditions: Vec<Condition>,
}

/// `Condition` is a check that a given subject `attribute` matches the condition `value` under
/// the given `operator`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct Condition {
    pub operator: ConditionOperator,
    pub attribute: String,
    pub value: Value,
}

/// Possible condition operators.
///
/// Operators are never obfuscated: they appear in plaintext even in CLIENT-format documents.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionOperator {
    /// Matches regex. Condition value must be a regex string.
    Matches,
    /// Regex does not match. Condition value must be a regex string.
    NotMatches,
    /// Greater than or equal. Attribute and condition value must either be numbers or semver
    /// strings.
    Gte,
    /// Greater than. Attribute and condition value must either be numbers or semver strings.
    Gt,
    /// Less than or equal. Attribute and condition value must either be numbers or semver
    /// strings.
    Lte,
    /// Less than. Attribute and condition value must either be numbers or semver strings.
    Lt,
    /// One of values. Condition value must be a list of strings. Match is case-sensitive.
    OneOf,
    /// Not one of values. Condition value must be a list of strings. Match is case-sensitive.
    ///
    /// Null/absent attributes fail this condition automatically. (i.e., `null NOT_ONE_OF
    /// ["hello"]` is `false`)
    NotOneOf,
    /// Null check.
    ///
    /// Condition value must be a boolean. If it's `true`, this is a null check. If it's `false`,
    /// this is a not-null check.
    IsNull,
}
