//! # DID Public Keys
//!
//! A DID document lists the keys of its subject as verification methods. Each
//! crypto suite knows how to turn the verification method types it supports
//! into a [`PublicKey`] the envelope can address.
//!
//! See [DID Core](https://www.w3.org/TR/did-core/#verification-methods).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::jose::jwk::PublicKey;

/// Builds a [`PublicKey`] from a DID document verification method.
pub type KeyConstructor = Arc<dyn Fn(&DidPublicKey) -> anyhow::Result<PublicKey> + Send + Sync>;

/// A verification method as it appears in a DID document.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DidPublicKey {
    /// A DID URL identifying the verification method. For example,
    /// "did:example:123456789abcdefghi#keys-1".
    pub id: String,

    /// The verification method type. SHOULD be registered in the DID
    /// Specification Registries. For example, "`JsonWebKey2020`".
    #[serde(rename = "type")]
    pub type_: String,

    /// The DID of the controller of the verification method.
    pub controller: String,

    /// Key material, in whichever representation `type_` calls for
    /// (`publicKeyJwk`, `publicKeyMultibase`, ...).
    #[serde(flatten)]
    pub material: Map<String, Value>,
}

impl DidPublicKey {
    /// The `publicKeyJwk` member, if the verification method carries one.
    #[must_use]
    pub fn public_key_jwk(&self) -> Option<&Map<String, Value>> {
        self.material.get("publicKeyJwk").and_then(Value::as_object)
    }
}
