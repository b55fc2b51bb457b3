//! # Hashing Utilities
//!
//! SHA-256 is the only hash in the engine. It is not our first choice for
//! speed, but derived addresses must match what external clients compute,
//! and those clients hash with SHA-256. Compatibility wins.
//!
//! [`hashv`] hashes a list of byte slices as one concatenated preimage
//! without allocating the concatenation. Derivation feeds it a dozen small
//! slices per bump attempt, so this matters more than it looks.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data as a `Vec<u8>`.
///
/// # Example
///
/// ```
/// use reit_protocol::crypto::sha256;
///
/// let hash = sha256(b"investment-trust-scheme");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> Vec<u8> {
    sha256_array(data).to_vec()
}

/// Compute the SHA-256 hash and return a fixed-size array.
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash the concatenation of `parts` with SHA-256.
///
/// `hashv(&[a, b])` equals `sha256_array(&[a, b].concat())`.
pub fn hashv(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // SHA-256("abc"), FIPS 180-2 appendix B.1.
        let hash = sha256(b"abc");
        assert_eq!(
            hex::encode(hash),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn sha256_array_matches_vec_variant() {
        let data = b"treasury-vault";
        assert_eq!(sha256(data).as_slice(), &sha256_array(data));
    }

    #[test]
    fn hashv_equals_hash_of_concatenation() {
        let parts: [&[u8]; 3] = [b"auth", b"", &[0xFF]];
        assert_eq!(hashv(&parts), sha256_array(&parts.concat()));
    }

    #[test]
    fn hashv_is_order_sensitive() {
        assert_ne!(hashv(&[b"a", b"b"]), hashv(&[b"b", b"a"]));
    }
}
