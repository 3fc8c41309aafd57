//! Helpers for the CLIENT-format (obfuscated) configuration encoding.
//!
//! Obfuscated configurations hash flag keys with MD5 and base64-encode most other strings. The
//! evaluator stays oblivious: values are translated here, at the point of use.

use base64::prelude::*;
use chrono::{DateTime, Utc};

use crate::ufc::Timestamp;

pub(crate) use crate::sharder::md5_hex;

/// Encode a plain string the way obfuscated configurations store it. Production code only ever
/// decodes; this direction is used to build CLIENT-format fixtures.
#[cfg(test)]
pub(crate) fn encode_base64(input: impl AsRef<[u8]>) -> String {
    BASE64_STANDARD.encode(input)
}

/// Decode a base64 string to UTF-8. Returns `None` if the input is not valid base64 or does not
/// decode to valid UTF-8.
pub(crate) fn decode_base64_str(input: &str) -> Option<String> {
    let bytes = BASE64_STANDARD.decode(input).ok()?;
    String::from_utf8(bytes).ok()
}

/// Best-effort translation of an obfuscated string: the decoded form if `input` is valid base64
/// of valid UTF-8, the original otherwise.
pub(crate) fn str_obf_to_plain(input: &str) -> String {
    decode_base64_str(input).unwrap_or_else(|| input.to_owned())
}

/// Parse a timestamp that may be stored either as base64(ISO-8601) (obfuscated configurations) or
/// as plaintext ISO-8601.
pub(crate) fn parse_timestamp(input: &str) -> Option<Timestamp> {
    let parse = |s: &str| {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    };
    decode_base64_str(input).and_then(|s| parse(&s)).or_else(|| parse(input))
}

/// Decode the payload segment of an SDK key, which may use either the standard or the URL-safe
/// alphabet, with or without padding.
pub(crate) fn decode_base64_lenient(input: &str) -> Option<Vec<u8>> {
    const ENGINES: [base64::engine::GeneralPurpose; 4] = [
        BASE64_STANDARD,
        BASE64_STANDARD_NO_PAD,
        BASE64_URL_SAFE,
        BASE64_URL_SAFE_NO_PAD,
    ];
    ENGINES.iter().find_map(|engine| engine.decode(input).ok())
}
