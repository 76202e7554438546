//! Constant-time string comparison

use subtle::ConstantTimeEq;

/// Compare two secrets without leaking the position of the first mismatch.
///
/// Strings of different length are rejected immediately without looking at
/// their content. Equal-length inputs are always scanned in full.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
