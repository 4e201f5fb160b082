//! # Algorithm Registry
//!
//! The registry merges the capabilities of a set of [`CryptoSuite`]s into
//! three lookup tables: key management algorithm to [`Encrypter`], signing
//! algorithm to [`Signer`], and DID key type to [`KeyConstructor`].
//!
//! A registry is built once and never changes afterwards. It is `Send + Sync`
//! and is shared by reference between any number of concurrent envelope
//! operations.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::did::{DidPublicKey, KeyConstructor};
use crate::jose::jwk::PublicKey;
use crate::{CryptoSuite, Encrypter, Error, Result, Signer};

/// How to resolve two suites registering the same name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Fail registry construction.
    #[default]
    Reject,

    /// The suite appearing later in the argument order replaces the earlier
    /// registration. Each replacement is logged.
    LastWins,
}

/// Read-only lookup tables for registered capabilities.
#[derive(Clone, Default)]
pub struct Registry {
    encrypters: HashMap<String, Arc<dyn Encrypter>>,
    signers: HashMap<String, Arc<dyn Signer>>,
    key_constructors: HashMap<String, KeyConstructor>,
}

impl Registry {
    /// Build a registry from the suites, rejecting conflicting registrations.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateAlgorithm` if two suites register different
    /// capabilities under the same name.
    pub fn new<'a>(suites: impl IntoIterator<Item = &'a dyn CryptoSuite>) -> Result<Self> {
        Self::with_policy(suites, DuplicatePolicy::Reject)
    }

    /// Build a registry from the suites, resolving conflicting registrations
    /// according to `policy`.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateAlgorithm` on conflict when `policy` is
    /// [`DuplicatePolicy::Reject`].
    pub fn with_policy<'a>(
        suites: impl IntoIterator<Item = &'a dyn CryptoSuite>, policy: DuplicatePolicy,
    ) -> Result<Self> {
        let mut registry = Self::default();

        for suite in suites {
            for (name, encrypter) in suite.encrypters() {
                merge(&mut registry.encrypters, name, encrypter, policy, "encryption algorithm")?;
            }
            for (name, signer) in suite.signers() {
                merge(&mut registry.signers, name, signer, policy, "signing algorithm")?;
            }
            for (key_type, ctor) in suite.key_constructors() {
                merge(&mut registry.key_constructors, key_type, ctor, policy, "key type")?;
            }
        }

        tracing::debug!(
            encrypters = registry.encrypters.len(),
            signers = registry.signers.len(),
            key_constructors = registry.key_constructors.len(),
            "registry built"
        );

        Ok(registry)
    }

    /// The encrypter registered for the key management algorithm.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedAlgorithm` if no encrypter is registered.
    pub fn encrypter(&self, algorithm: &str) -> Result<Arc<dyn Encrypter>> {
        self.encrypters.get(algorithm).cloned().ok_or_else(|| {
            Error::UnsupportedAlgorithm(format!("unsupported encryption algorithm: {algorithm}"))
        })
    }

    /// The signer registered for the signing algorithm.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedAlgorithm` if no signer is registered.
    pub fn signer(&self, algorithm: &str) -> Result<Arc<dyn Signer>> {
        self.signers.get(algorithm).cloned().ok_or_else(|| {
            Error::UnsupportedAlgorithm(format!("unsupported signing algorithm: {algorithm}"))
        })
    }

    /// The public key constructor registered for the DID key type.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedKeyType` if no constructor is registered.
    pub fn key_constructor(&self, key_type: &str) -> Result<&KeyConstructor> {
        self.key_constructors
            .get(key_type)
            .ok_or_else(|| Error::UnsupportedKeyType(format!("unsupported key type: {key_type}")))
    }

    /// Construct the public key for a DID document verification method.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedKeyType` if no constructor is registered for the
    /// verification method type, or the constructor's own error.
    pub fn public_key(&self, did_key: &DidPublicKey) -> Result<PublicKey> {
        let ctor = self.key_constructor(&did_key.type_)?;
        Ok(ctor(did_key)?)
    }

    /// Names of the registered encryption algorithms, sorted.
    #[must_use]
    pub fn encryption_algorithms(&self) -> Vec<&str> {
        sorted_names(&self.encrypters)
    }

    /// Names of the registered signing algorithms, sorted.
    #[must_use]
    pub fn signing_algorithms(&self) -> Vec<&str> {
        sorted_names(&self.signers)
    }
}

impl Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("encrypters", &self.encryption_algorithms())
            .field("signers", &self.signing_algorithms())
            .field("key_constructors", &sorted_names(&self.key_constructors))
            .finish()
    }
}

// Registering the same `Arc` twice is not a conflict.
fn merge<T: ?Sized>(
    table: &mut HashMap<String, Arc<T>>, name: String, value: Arc<T>, policy: DuplicatePolicy,
    kind: &str,
) -> Result<()> {
    match table.entry(name) {
        Entry::Vacant(entry) => {
            entry.insert(value);
        }
        Entry::Occupied(mut entry) => {
            if Arc::ptr_eq(entry.get(), &value) {
                return Ok(());
            }
            match policy {
                DuplicatePolicy::Reject => {
                    return Err(Error::DuplicateAlgorithm(format!(
                        "{kind} `{}` is registered more than once",
                        entry.key()
                    )));
                }
                DuplicatePolicy::LastWins => {
                    tracing::warn!("{kind} `{}` replaced by a later registration", entry.key());
                    entry.insert(value);
                }
            }
        }
    }
    Ok(())
}

fn sorted_names<T>(table: &HashMap<String, T>) -> Vec<&str> {
    let mut names = table.keys().map(String::as_str).collect::<Vec<_>>();
    names.sort_unstable();
    names
}
