//! # Secure Envelopes for Vercre
//!
//! This crate produces and consumes JSON Web Encryption ([RFC7516]) envelopes
//! in Compact Serialization. The cryptography itself is supplied by pluggable
//! [`CryptoSuite`] implementations, merged into a read-only [`Registry`]. The
//! crate is responsible for the envelope protocol: algorithm negotiation,
//! header construction and validation, `crit` enforcement, and key-identity
//! matching.
//!
//! # Example
//!
//! ```rust,ignore
//! let registry = Registry::new([&suite as &dyn CryptoSuite])?;
//!
//! let token = JweToken::new("hello", &registry).encrypt(&public_key, None).await?;
//! let plaintext = JweToken::new(token, &registry).decrypt(&private_key).await?;
//! ```
//!
//! [RFC7516]: https://www.rfc-editor.org/rfc/rfc7516

pub mod did;
mod error;
pub mod jose;
pub mod registry;
pub mod test_utils;

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;

pub use crate::did::{DidPublicKey, KeyConstructor};
pub use crate::error::Error;
pub use crate::jose::header::Header;
pub use crate::jose::jwe::{Encrypted, JweToken, Options};
pub use crate::jose::jwk::{PrivateKey, PublicKey};
pub use crate::registry::{DuplicatePolicy, Registry};

/// Result type for envelope operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A `CryptoSuite` is a plugin supplying named cryptographic capabilities.
///
/// Suites are only consulted while a [`Registry`] is being built: the registry
/// copies the returned entries and does not retain the suite.
pub trait CryptoSuite {
    /// Encrypters supplied by the suite, keyed by the `alg` name they
    /// implement.
    fn encrypters(&self) -> HashMap<String, Arc<dyn Encrypter>>;

    /// Signers supplied by the suite, keyed by the `alg` name they implement.
    fn signers(&self) -> HashMap<String, Arc<dyn Signer>>;

    /// Public key constructors, keyed by DID document verification method
    /// type.
    fn key_constructors(&self) -> HashMap<String, KeyConstructor>;
}

/// `Encrypter` provides authenticated encryption for one key management
/// algorithm.
///
/// An encrypter owns everything below the envelope: content encryption key
/// generation and wrapping, initialization vector generation, and tag
/// computation. It exchanges exactly four byte strings with the envelope
/// (see [`Encrypted`]).
pub trait Encrypter: Send + Sync {
    /// The content encryption (`enc`) identifier written to, and expected in,
    /// the protected header. For example, "A128GCM".
    fn content_encryption(&self) -> &str;

    /// Encrypt the plaintext for the recipient's public key, authenticating
    /// `aad` alongside the ciphertext.
    fn encrypt<'a>(
        &'a self, plaintext: &'a [u8], aad: &'a [u8], recipient: &'a PublicKey,
    ) -> BoxFuture<'a, anyhow::Result<Encrypted>>;

    /// Decrypt the segments using the recipient's private key. MUST fail when
    /// the tag does not authenticate both the ciphertext and `aad`.
    fn decrypt<'a>(
        &'a self, encrypted: &'a Encrypted, aad: &'a [u8], key: &'a PrivateKey,
    ) -> BoxFuture<'a, anyhow::Result<Vec<u8>>>;
}

/// `Signer` provides signing and signature verification for one algorithm.
pub trait Signer: Send + Sync {
    /// Sign the content with the private key.
    fn sign<'a>(
        &'a self, content: &'a [u8], key: &'a PrivateKey,
    ) -> BoxFuture<'a, anyhow::Result<Vec<u8>>>;

    /// Verify the signature over content using the public key.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature does not verify.
    fn verify(&self, content: &[u8], signature: &[u8], key: &PublicKey) -> anyhow::Result<()>;
}
