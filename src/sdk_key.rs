//! SDK key payload parsing and endpoint resolution.
//!
//! SDK keys have the form `<signature>.<base64(query-string)>`. The payload carries routing
//! parameters; `cs` names the customer-specific subdomain of the configuration CDN.

use crate::obfuscation::decode_base64_lenient;

/// Default base URL for API calls.
pub const DEFAULT_BASE_URL: &str = "https://fscdn.eppo.cloud/api";

/// Extract the `cs` (configuration subdomain) parameter from the SDK key payload, if present.
///
/// Returns `None` for keys that don't follow the signed-payload format.
pub(crate) fn subdomain(sdk_key: &str) -> Option<String> {
    let (_signature, payload) = sdk_key.split_once('.')?;
    let decoded = decode_base64_lenient(payload)?;
    let params = String::from_utf8(decoded).ok()?;
    params.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "cs" && !value.is_empty()).then(|| value.to_owned())
    })
}

/// Resolve the effective base URL for configuration requests.
///
/// A missing, empty, or default `base_url` enables subdomain-derived routing from the SDK key;
/// any other value is used verbatim.
pub(crate) fn resolve_base_url(base_url: Option<&str>, sdk_key: &str) -> String {
    match base_url {
        Some(url) if !url.is_empty() && url != DEFAULT_BASE_URL => url.to_owned(),
        _ => match subdomain(sdk_key) {
            Some(subdomain) => format!("https://{subdomain}.fscdn.eppo.cloud/api"),
            None => DEFAULT_BASE_URL.to_owned(),
        },
    }
}
