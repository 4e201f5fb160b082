//! # JSON Web Key (JWK)
//!
//! A JWK ([RFC7517]) is a JSON representation of a cryptographic key. The
//! envelope only reads a key's identity: its type, its identifier and the
//! algorithms it defaults to. Everything else is algorithm-specific material
//! kept verbatim for the crypto suite that understands it.
//!
//! [RFC7517]: https://www.rfc-editor.org/rfc/rfc7517

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JWK parameters that hold private key material ([RFC7518] section 6).
///
/// [RFC7518]: https://www.rfc-editor.org/rfc/rfc7518#section-6
const PRIVATE_PARAMETERS: [&str; 8] = ["d", "p", "q", "dp", "dq", "qi", "oth", "k"];

/// A recipient's public key.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicKey {
    /// Key type. For example, "RSA", "EC", or "OKP".
    pub kty: String,

    /// Key identifier. Typically a DID URL to the verification method.
    pub kid: String,

    /// The key management algorithm used when encrypting to this key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_encryption_algorithm: Option<String>,

    /// The algorithm used when verifying signatures made with this key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_sign_algorithm: Option<String>,

    /// Algorithm-specific key material (`n`, `e`, `crv`, `x`, ...).
    #[serde(flatten)]
    pub material: Map<String, Value>,
}

/// A recipient's private key.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PrivateKey {
    /// Key type.
    pub kty: String,

    /// Key identifier. The envelope treats this as the key's true identity.
    pub kid: String,

    /// The key management algorithm used when encrypting to this key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_encryption_algorithm: Option<String>,

    /// The algorithm used when signing with this key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_sign_algorithm: Option<String>,

    /// Public and private key material.
    #[serde(flatten)]
    pub material: Map<String, Value>,
}

impl PrivateKey {
    /// The public half of this key: identical identity, with private
    /// parameters removed from the material.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        let material = self
            .material
            .iter()
            .filter(|(name, _)| !PRIVATE_PARAMETERS.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        PublicKey {
            kty: self.kty.clone(),
            kid: self.kid.clone(),
            default_encryption_algorithm: self.default_encryption_algorithm.clone(),
            default_sign_algorithm: self.default_sign_algorithm.clone(),
            material,
        }
    }
}
