//! Zeroizing payload wrapper.
//!
//! Decoded echoes are short-lived by construction. Callers must opt in to copying.

use zeroize::Zeroizing;

/// A verified echo that zeroizes on Drop.
///
/// This type does not implement `Clone` to prevent accidental plaintext duplication.
#[derive(Debug)]
pub struct Message(Zeroizing<Vec<u8>>);

impl Message {
    /// Get message as raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Render for display, replacing invalid UTF-8.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    /// Get message length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if message is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Zeroizing<Vec<u8>>> for Message {
    fn from(bytes: Zeroizing<Vec<u8>>) -> Self {
        Self(bytes)
    }
}

impl PartialEq<[u8]> for Message {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}
