//! Random tokens and correlation identifiers
//!
//! All values come from the operating system CSPRNG. If the OS source is
//! unavailable the functions degrade to a time-seeded PRNG and log a warning:
//! the output is still unique enough for correlation, but it is NOT
//! unpredictable and must be treated as a weakened token.

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

/// Fill `buf` from the OS CSPRNG, falling back to a seeded PRNG.
///
/// Returns `false` when the fallback was used.
fn fill_random(buf: &mut [u8]) -> bool {
    match OsRng.try_fill_bytes(buf) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "OS random source unavailable, falling back to non-cryptographic PRNG"
            );
            fallback_rng().fill_bytes(buf);
            false
        }
    }
}

fn fallback_rng() -> StdRng {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    StdRng::seed_from_u64(nanos ^ (u64::from(std::process::id()) << 32))
}

/// Generate `bytes` random bytes encoded as lowercase hex (`2 * bytes` chars).
pub fn random_token_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    fill_random(&mut buf);
    hex::encode(buf)
}

/// Generate a correlation ID linking a client-facing error to its log entry.
///
/// Normally a UUID v4. When the OS random source is unavailable the ID is a
/// `<unix-millis>-<16 hex>` composite instead.
pub fn correlation_id() -> String {
    let mut bytes = [0u8; 16];
    if fill_random(&mut bytes) {
        return uuid::Builder::from_random_bytes(bytes)
            .into_uuid()
            .to_string();
    }

    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("{}-{}", millis, hex::encode(&bytes[..8]))
}
