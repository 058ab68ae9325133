//! Scoped secret buffers.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Owned key material that is wiped when dropped.
///
/// Holds private keys, shared secrets and codec entropy. Not `Clone`:
/// there is exactly one copy and it dies with its owner, on every exit path.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    /// Take ownership of a buffer.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Copy from a fixed array, wiping the source.
    pub fn from_array<const N: usize>(mut bytes: [u8; N]) -> Self {
        let secret = Self(bytes.to_vec());
        bytes.zeroize();
        secret
    }

    /// Borrow the secret bytes.
    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes([REDACTED; {}])", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts() {
        let secret = SecretBytes::new(vec![0xAB; 4]);
        let shown = format!("{:?}", secret);
        assert_eq!(shown, "SecretBytes([REDACTED; 4])");
        assert!(!shown.contains("171"));
    }

    #[test]
    fn test_explicit_zeroize() {
        let mut secret = SecretBytes::from_array([7u8; 32]);
        assert_eq!(secret.len(), 32);
        secret.zeroize();
        assert!(secret.is_empty());
    }
}
