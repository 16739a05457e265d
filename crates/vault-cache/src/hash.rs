//! A small deterministic hash used for two unrelated purposes in this
//! crate: mixing extra bits into a generated secret identity
//! ([`crate::url::generate_dynamic_url_secret_name`]), and computing
//! [`crate::cache::CacheEntry::content_hash`]. Both need "changes iff the
//! input changes" and "identical across processes" — not cryptographic
//! strength — so a single FNV-1a-style function covers both call sites.

const FNV_SEED: u32 = 0x811C_9DC5;
const FNV_PRIME: u32 = 16_777_619;

/// Folds `bytes` into `seed` using xor-then-multiply-by-FNV-prime per
/// octet, matching the byte-exact algorithm spec.md §4.B pins down.
#[must_use]
pub fn fnv32_fold(seed: u32, bytes: &[u8]) -> u32 {
    let mut h = seed;
    for &b in bytes {
        h ^= u32::from(b);
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// Hashes `bytes` starting from the crate-wide seed (`0x811C9DC5`).
#[must_use]
pub fn fnv32(bytes: &[u8]) -> u32 {
    fnv32_fold(FNV_SEED, bytes)
}
