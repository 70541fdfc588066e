//! Caller-supplied decryption for encrypted documents
//! Author: kartik4091
//!
//! Key derivation and cipher handling stay with the embedding application.
//! The engine only needs decrypted bytes for the object streams it has to
//! open in order to resolve compressed objects.

use std::fmt;

use crate::types::ObjectId;

pub trait StreamDecryptor: Send + Sync {
    /// Returns the decrypted payload of the stream belonging to `id`
    fn decrypt_stream(&self, id: ObjectId, data: &[u8]) -> Result<Vec<u8>, String>;
}

/// How the analysis should treat encrypted content
#[derive(Clone, Copy, Default)]
pub enum Decryption<'a> {
    /// The caller expects an unencrypted document. An encrypted one is
    /// handled as [`Decryption::Unavailable`].
    #[default]
    NotRequired,
    Decryptor(&'a dyn StreamDecryptor),
    /// The document is encrypted and the caller cannot decrypt it
    Unavailable,
}

impl Decryption<'_> {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Decryption::Unavailable)
    }
}

impl fmt::Debug for Decryption<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decryption::NotRequired => write!(f, "NotRequired"),
            Decryption::Decryptor(_) => write!(f, "Decryptor(..)"),
            Decryption::Unavailable => write!(f, "Unavailable"),
        }
    }
}
