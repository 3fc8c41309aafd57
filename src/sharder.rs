//! MD5-based deterministic sharding.

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Compute an MD5 shard in `[0, total_shards)` for the set of inputs.
///
/// This function accepts an array of inputs to allow the caller to avoid allocating memory when
/// the input is compound from multiple segments (e.g., shard salt followed by subject key).
pub(crate) fn get_md5_shard(input: &[impl AsRef<[u8]>], total_shards: u64) -> u64 {
    let hash = {
        let mut hasher = md5::Context::new();
        for i in input {
            hasher.consume(i);
        }
        hasher.compute()
    };
    let value = u32::from_be_bytes(hash[0..4].try_into().unwrap());
    u64::from(value) % total_shards
}

/// MD5 digest of `input` rendered as 32 lowercase hex characters.
///
/// Renders into a single pre-sized buffer as this sits on the hot path for obfuscated
/// configurations.
pub(crate) fn md5_hex(input: impl AsRef<[u8]>) -> String {
    let digest = md5::compute(input);
    let mut out = String::with_capacity(32);
    for byte in digest.0 {
        out.push(HEX_DIGITS[(byte >> 4) as usize] as char);
        out.push(HEX_DIGITS[(byte & 0x0f) as usize] as char);
    }
    out
}
