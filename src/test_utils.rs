//! # Test Utilities for Vercre Envelope
//!
//! A hard-coded crypto suite and keys that can be used for testing and
//! examples. The suite performs no encryption at all: it MUST NOT be used to
//! protect real data.

#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use anyhow::{anyhow, bail};
use futures::future::BoxFuture;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::did::{DidPublicKey, KeyConstructor};
use crate::jose::jwe::Encrypted;
use crate::jose::jwk::{PrivateKey, PublicKey};
use crate::{CryptoSuite, Encrypter, Signer};

/// Key management algorithm implemented by [`TestEncrypter`] and
/// [`TestSigner`].
pub const ALGORITHM: &str = "test";

/// Content encryption identifier written by [`TestEncrypter`].
pub const CONTENT_ENCRYPTION: &str = "A128GCM";

/// Verification method type understood by the suite's key constructor.
pub const KEY_TYPE: &str = "JsonWebKey2020";

/// Identifier of the key returned by [`private_key`].
pub const KEY_ID: &str = "did:example:123456789abcdefghi#keys-1";

const IV_LENGTH: usize = 12;
const TAG_LENGTH: usize = 16;

// initalise tracing once for all tests
static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// # Panics
///
/// Panics if the tracing subscriber cannot be set.
pub fn init_tracer() {
    INIT.call_once(|| {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::ERROR).finish();
        tracing::subscriber::set_global_default(subscriber).expect("subscriber set");
    });
}

/// A private key registered to the [`ALGORITHM`] algorithm.
#[must_use]
pub fn private_key() -> PrivateKey {
    let Value::Object(material) = json!({"d": "c2VjcmV0", "x": "cHVibGlj"}) else {
        unreachable!("object literal")
    };

    PrivateKey {
        kty: "RSA".into(),
        kid: KEY_ID.into(),
        default_encryption_algorithm: Some(ALGORITHM.into()),
        default_sign_algorithm: Some(ALGORITHM.into()),
        material,
    }
}

/// Crypto suite providing the [`ALGORITHM`] encrypter and signer, and a
/// `JsonWebKey2020` key constructor.
#[derive(Clone, Default)]
pub struct TestCryptoSuite {
    encrypter: Arc<TestEncrypter>,
    signer: Arc<TestSigner>,
}

impl TestCryptoSuite {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the encrypter's `encrypt` has been called.
    #[must_use]
    pub fn encrypt_calls(&self) -> usize {
        self.encrypter.encrypt_calls.load(Ordering::SeqCst)
    }

    /// Number of times the encrypter's `decrypt` has been called.
    #[must_use]
    pub fn decrypt_calls(&self) -> usize {
        self.encrypter.decrypt_calls.load(Ordering::SeqCst)
    }

    /// Reset call counters.
    pub fn reset(&self) {
        self.encrypter.encrypt_calls.store(0, Ordering::SeqCst);
        self.encrypter.decrypt_calls.store(0, Ordering::SeqCst);
    }
}

impl CryptoSuite for TestCryptoSuite {
    fn encrypters(&self) -> HashMap<String, Arc<dyn Encrypter>> {
        let encrypter: Arc<dyn Encrypter> = self.encrypter.clone();
        HashMap::from([(ALGORITHM.to_string(), encrypter)])
    }

    fn signers(&self) -> HashMap<String, Arc<dyn Signer>> {
        let signer: Arc<dyn Signer> = self.signer.clone();
        HashMap::from([(ALGORITHM.to_string(), signer)])
    }

    fn key_constructors(&self) -> HashMap<String, KeyConstructor> {
        let ctor: KeyConstructor = Arc::new(json_web_key);
        HashMap::from([(KEY_TYPE.to_string(), ctor)])
    }
}

/// Identity "encryption": the ciphertext is the plaintext, and the tag is a
/// SHA-256 digest over the header, IV and ciphertext, so any change to them
/// is detected on decrypt.
#[derive(Debug, Default)]
pub struct TestEncrypter {
    encrypt_calls: AtomicUsize,
    decrypt_calls: AtomicUsize,
}

impl Encrypter for TestEncrypter {
    fn content_encryption(&self) -> &str {
        CONTENT_ENCRYPTION
    }

    fn encrypt<'a>(
        &'a self, plaintext: &'a [u8], aad: &'a [u8], recipient: &'a PublicKey,
    ) -> BoxFuture<'a, anyhow::Result<Encrypted>> {
        Box::pin(async move {
            self.encrypt_calls.fetch_add(1, Ordering::SeqCst);

            let iv = rand::random::<[u8; IV_LENGTH]>().to_vec();
            let ciphertext = plaintext.to_vec();
            let tag = tag(aad, &iv, &ciphertext);

            Ok(Encrypted {
                encrypted_key: recipient.kid.as_bytes().to_vec(),
                iv,
                ciphertext,
                tag,
            })
        })
    }

    fn decrypt<'a>(
        &'a self, encrypted: &'a Encrypted, aad: &'a [u8], key: &'a PrivateKey,
    ) -> BoxFuture<'a, anyhow::Result<Vec<u8>>> {
        Box::pin(async move {
            self.decrypt_calls.fetch_add(1, Ordering::SeqCst);

            if encrypted.encrypted_key != key.kid.as_bytes() {
                bail!("content encryption key was not wrapped for this key");
            }
            if tag(aad, &encrypted.iv, &encrypted.ciphertext) != encrypted.tag {
                bail!("tag mismatch");
            }
            Ok(encrypted.ciphertext.clone())
        })
    }
}

fn tag(aad: &[u8], iv: &[u8], ciphertext: &[u8]) -> Vec<u8> {
    let digest =
        Sha256::new().chain_update(aad).chain_update(iv).chain_update(ciphertext).finalize();
    digest[..TAG_LENGTH].to_vec()
}

/// Keyed-digest "signatures" bound to the key identifier.
#[derive(Debug, Default)]
pub struct TestSigner;

impl Signer for TestSigner {
    fn sign<'a>(
        &'a self, content: &'a [u8], key: &'a PrivateKey,
    ) -> BoxFuture<'a, anyhow::Result<Vec<u8>>> {
        Box::pin(async move { Ok(signature(&key.kid, content)) })
    }

    fn verify(&self, content: &[u8], signature: &[u8], key: &PublicKey) -> anyhow::Result<()> {
        if self::signature(&key.kid, content) != signature {
            bail!("signature does not verify");
        }
        Ok(())
    }
}

fn signature(kid: &str, content: &[u8]) -> Vec<u8> {
    Sha256::new().chain_update(kid).chain_update(content).finalize().to_vec()
}

// Builds a public key from the verification method's `publicKeyJwk`, using the
// verification method id when the JWK has no `kid`.
fn json_web_key(did_key: &DidPublicKey) -> anyhow::Result<PublicKey> {
    let mut jwk = did_key
        .public_key_jwk()
        .cloned()
        .ok_or_else(|| anyhow!("verification method `{}` has no `publicKeyJwk`", did_key.id))?;
    jwk.entry("kid").or_insert_with(|| Value::String(did_key.id.clone()));
    jwk.entry("defaultEncryptionAlgorithm").or_insert_with(|| json!(ALGORITHM));
    jwk.entry("defaultSignAlgorithm").or_insert_with(|| json!(ALGORITHM));

    Ok(serde_json::from_value(Value::Object(jwk))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_and_verify() {
        let suite = TestCryptoSuite::new();
        let signer = suite.signers().remove(ALGORITHM).expect("should have signer");
        let key = private_key();

        let sig = signer.sign(b"hello", &key).await.expect("should sign");
        signer.verify(b"hello", &sig, &key.public_key()).expect("should verify");
        assert!(signer.verify(b"goodbye", &sig, &key.public_key()).is_err());
    }

    #[test]
    fn construct_key() {
        let did_key: DidPublicKey = serde_json::from_value(json!({
            "id": KEY_ID,
            "type": KEY_TYPE,
            "controller": "did:example:123456789abcdefghi",
            "publicKeyJwk": {"kty": "RSA", "n": "bW9kdWx1cw", "e": "AQAB"}
        }))
        .expect("should deserialize");

        let key = json_web_key(&did_key).expect("should construct");
        assert_eq!(key.kid, KEY_ID);
        assert_eq!(key.kty, "RSA");
        assert_eq!(key.default_encryption_algorithm.as_deref(), Some(ALGORITHM));
        assert_eq!(key.material.get("e"), Some(&json!("AQAB")));
    }
}
