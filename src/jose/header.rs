//! # JOSE Header
//!
//! The JOSE header ([RFC7516] section 4) describes how an envelope was
//! produced. It is kept as an ordered JSON object so that fields the envelope
//! does not interpret survive a round trip unchanged.
//!
//! [RFC7516]: https://www.rfc-editor.org/rfc/rfc7516#section-4

use std::fmt::{self, Display};
use std::str::FromStr;

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Key management algorithm.
pub const ALG: &str = "alg";

/// Content encryption algorithm.
pub const ENC: &str = "enc";

/// Recipient key identifier.
pub const KID: &str = "kid";

/// Critical extensions.
pub const CRIT: &str = "crit";

// Header parameters registered by RFC 7515, RFC 7516 and RFC 7518. These are
// understood by definition and MUST NOT be listed in `crit`.
const REGISTERED: [&str; 20] = [
    "alg", "enc", "zip", "jku", "jwk", "kid", "x5u", "x5c", "x5t", "x5t#S256", "typ", "cty",
    "crit", "epk", "apu", "apv", "iv", "tag", "p2s", "p2c",
];

/// JOSE header: an ordered map of header parameter names to JSON values.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Header(Map<String, Value>);

impl Header {
    /// An empty header.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header parameter, returning the value it replaced.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    /// The value of a header parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Whether the header contains the parameter.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Header parameters in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// The `alg` parameter, if set to a string.
    #[must_use]
    pub fn alg(&self) -> Option<&str> {
        self.0.get(ALG).and_then(Value::as_str)
    }

    /// The `enc` parameter, if set to a string.
    #[must_use]
    pub fn enc(&self) -> Option<&str> {
        self.0.get(ENC).and_then(Value::as_str)
    }

    /// The `kid` parameter, if set to a string.
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.0.get(KID).and_then(Value::as_str)
    }

    /// A header parameter the protocol cannot do without.
    ///
    /// # Errors
    ///
    /// Returns `MissingHeader` when the parameter is absent and
    /// `MalformedHeader` when it is not a string.
    pub fn require(&self, name: &str) -> Result<&str> {
        let Some(value) = self.0.get(name) else {
            return Err(Error::MissingHeader(format!("missing required `{name}` header")));
        };
        value
            .as_str()
            .ok_or_else(|| Error::MalformedHeader(format!("`{name}` header is malformed")))
    }

    /// The `crit` parameter as a list of header names.
    ///
    /// # Errors
    ///
    /// Returns `MalformedHeader` when `crit` is not an array of strings.
    pub fn crit(&self) -> Result<Option<Vec<&str>>> {
        let Some(value) = self.0.get(CRIT) else {
            return Ok(None);
        };
        let malformed = || {
            Error::MalformedHeader(
                "`crit` header is malformed: expected an array of strings".into(),
            )
        };

        let names = value.as_array().ok_or_else(malformed)?;
        let names =
            names.iter().map(Value::as_str).collect::<Option<Vec<_>>>().ok_or_else(malformed)?;
        Ok(Some(names))
    }

    /// Check the critical extensions listed in `crit` against RFC 7516
    /// section 5.2.5 and RFC 7515 section 4.1.11. `understood` reports whether
    /// a given extension is supported.
    ///
    /// # Errors
    ///
    /// Returns `MalformedHeader` if `crit` is malformed or lists a registered
    /// header parameter, `UnsupportedCriticalExtension` if it lists an
    /// extension that is not understood, and `MissingHeader` if a listed
    /// extension is absent from the header.
    pub fn check_critical(&self, understood: impl Fn(&str) -> bool) -> Result<()> {
        let Some(names) = self.crit()? else {
            return Ok(());
        };

        for name in names {
            if REGISTERED.contains(&name) {
                return Err(Error::MalformedHeader(format!(
                    "`crit` header is malformed: `{name}` is a registered header parameter"
                )));
            }
            if !understood(name) {
                return Err(Error::UnsupportedCriticalExtension(format!(
                    "critical extension `{name}` is not supported"
                )));
            }
            if !self.0.contains_key(name) {
                return Err(Error::MissingHeader(format!(
                    "critical extension `{name}` is listed in `crit` but missing"
                )));
            }
        }

        Ok(())
    }
}

impl From<Map<String, Value>> for Header {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Serialize Header to a base64url encoded string.
impl Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = serde_json::to_vec(&self).map_err(|_| fmt::Error)?;
        write!(f, "{}", Base64UrlUnpadded::encode_string(&bytes))
    }
}

impl FromStr for Header {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = Base64UrlUnpadded::decode_vec(s)
            .map_err(|e| Error::MalformedToken(format!("issue decoding header: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::MalformedToken(format!("issue deserializing header: {e}")))
    }
}
