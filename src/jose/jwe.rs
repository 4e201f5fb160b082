//! # JSON Web Encryption (JWE)
//!
//! JWE ([RFC7516]) specifies how encrypted content can be represented using
//! JSON. See JWA ([RFC7518]) for more on the cryptographic algorithms and
//! identifiers used.
//!
//! The envelope is algorithm-agnostic: the key management algorithm named by
//! the recipient key (`alg`) selects an [`Encrypter`] from the [`Registry`],
//! and that encrypter produces every cryptographic segment of the token. The
//! envelope builds and validates the protected header, binds it to the
//! ciphertext as Additional Authenticated Data, and checks that the token is
//! addressed to the key attempting to open it.
//!
//! # Example
//!
//! Protected header produced for a recipient key registered under the `test`
//! algorithm:
//!
//!```json
//! {
//!     "alg": "test",
//!     "enc": "A128GCM",
//!     "kid": "did:example:123456789abcdefghi#keys-1"
//! }
//! ```
//!
//! [RFC7516]: https://www.rfc-editor.org/rfc/rfc7516
//! [RFC7518]: https://www.rfc-editor.org/rfc/rfc7518

use std::fmt::{self, Display};
use std::str::FromStr;

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::instrument;

use crate::jose::header::{Header, ALG, ENC, KID};
use crate::jose::jwk::{PrivateKey, PublicKey};
use crate::registry::Registry;
use crate::{Encrypter, Error, Result};

/// Return the protected header of a compact JWE without decrypting it.
///
/// The header is integrity protected but not encrypted, so it can be read by
/// anyone holding the token. Do not trust its contents until the token has
/// been decrypted.
///
/// # Errors
///
/// Returns `MalformedToken` if the token is not a well-formed compact JWE.
pub fn header(token: &str) -> Result<Header> {
    Ok(Jwe::from_str(token)?.protected)
}

/// Envelope configuration.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    /// Extension header parameters this envelope understands, and will
    /// therefore accept when listed in `crit`.
    #[serde(default)]
    pub critical_extensions: Vec<String>,
}

/// Ciphertext segments exchanged between the envelope and an [`Encrypter`].
///
/// An encrypter returns exactly these four byte strings from `encrypt`, and
/// receives them, unchanged, in `decrypt`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Encrypted {
    /// The content encryption key, encrypted to the recipient. Empty when the
    /// key management mode does not transport a key.
    pub encrypted_key: Vec<u8>,

    /// Initialization vector (nonce).
    pub iv: Vec<u8>,

    /// The encrypted plaintext.
    pub ciphertext: Vec<u8>,

    /// Authentication tag over the ciphertext and the protected header.
    pub tag: Vec<u8>,
}

/// JWE in Compact Serialization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Jwe {
    protected: Header,

    /// Protected header exactly as it appears in the token. Used as the
    /// Additional Authenticated Data.
    encoded: String,

    /// Decoded ciphertext segments.
    pub encrypted: Encrypted,
}

impl Jwe {
    /// JWE protected header. Read-only: the token is serialized from the
    /// header as received.
    #[must_use]
    pub const fn protected(&self) -> &Header {
        &self.protected
    }

    /// The Additional Authenticated Data: ASCII(BASE64URL(UTF8(JWE Protected
    /// Header))).
    #[must_use]
    pub fn aad(&self) -> &[u8] {
        self.encoded.as_bytes()
    }
}

/// Compact Serialization
///     base64(JWE Protected Header) + '.'
///     + base64(JWE Encrypted Key) + '.'
///     + base64(JWE Initialization Vector) + '.'
///     + base64(JWE Ciphertext) + '.'
///     + base64(JWE Authentication Tag)
impl Display for Jwe {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let protected = &self.encoded;
        let encrypted_key = Base64UrlUnpadded::encode_string(&self.encrypted.encrypted_key);
        let iv = Base64UrlUnpadded::encode_string(&self.encrypted.iv);
        let ciphertext = Base64UrlUnpadded::encode_string(&self.encrypted.ciphertext);
        let tag = Base64UrlUnpadded::encode_string(&self.encrypted.tag);

        write!(f, "{protected}.{encrypted_key}.{iv}.{ciphertext}.{tag}")
    }
}

impl FromStr for Jwe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s.split('.').collect::<Vec<&str>>();
        let [protected, encrypted_key, iv, ciphertext, tag] = parts.as_slice() else {
            return Err(Error::MalformedToken(format!(
                "invalid JWE: expected 5 segments, found {}",
                parts.len()
            )));
        };

        // the encrypted key is empty for direct key agreement and the
        // ciphertext is empty for an empty plaintext
        for (name, segment) in [("header", protected), ("iv", iv), ("tag", tag)] {
            if segment.is_empty() {
                return Err(Error::MalformedToken(format!(
                    "invalid JWE: `{name}` segment is empty"
                )));
            }
        }

        Ok(Self {
            protected: Header::from_str(protected)?,
            encoded: (*protected).to_string(),
            encrypted: Encrypted {
                encrypted_key: decode("encrypted_key", encrypted_key)?,
                iv: decode("iv", iv)?,
                ciphertext: decode("ciphertext", ciphertext)?,
                tag: decode("tag", tag)?,
            },
        })
    }
}

fn decode(name: &str, segment: &str) -> Result<Vec<u8>> {
    Base64UrlUnpadded::decode_vec(segment)
        .map_err(|e| Error::MalformedToken(format!("issue decoding `{name}`: {e}")))
}

/// A single message, to be encrypted to a recipient or decrypted by one.
///
/// The token holds either the plaintext (for [`JweToken::encrypt`]) or the
/// compact JWE (for [`JweToken::decrypt`]) and borrows the registry that
/// supplies its cryptography.
pub struct JweToken<'a> {
    content: Vec<u8>,
    registry: &'a Registry,
    options: Options,
}

impl<'a> JweToken<'a> {
    /// Create a token over `content` using capabilities from `registry`.
    pub fn new(content: impl Into<Vec<u8>>, registry: &'a Registry) -> Self {
        Self {
            content: content.into(),
            registry,
            options: Options::default(),
        }
    }

    /// Replace the envelope configuration.
    #[must_use]
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Accept `name` when it is listed as a critical extension.
    #[must_use]
    pub fn understand(mut self, name: impl Into<String>) -> Self {
        self.options.critical_extensions.push(name.into());
        self
    }

    /// Encrypt the content to the recipient's public key, returning the JWE in
    /// Compact Serialization.
    ///
    /// Extra `headers` are added to the protected header after `alg`, `enc`
    /// and `kid`. Those three are always set by the envelope: a caller-supplied
    /// value for any of them is ignored.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedAlgorithm` if the key has no default encryption
    /// algorithm or it is not registered, `MalformedHeader` if a supplied
    /// `crit` header is malformed, and the encrypter's error if encryption
    /// fails.
    #[instrument(level = "debug", skip_all, fields(kid = %key.kid))]
    pub async fn encrypt(
        &self, key: &PublicKey, headers: Option<Map<String, Value>>,
    ) -> Result<String> {
        tracing::debug!("encrypt");

        let Some(alg) = key.default_encryption_algorithm.as_deref() else {
            return Err(Error::UnsupportedAlgorithm(format!(
                "unsupported encryption algorithm: key `{}` has no default encryption algorithm",
                key.kid
            )));
        };
        let encrypter = self.registry.encrypter(alg)?;

        // envelope-managed parameters come first and cannot be overridden
        let mut protected = Header::new();
        protected.insert(ALG, alg);
        protected.insert(ENC, encrypter.content_encryption());
        protected.insert(KID, key.kid.as_str());

        for (name, value) in headers.unwrap_or_default() {
            if protected.contains(&name) {
                tracing::debug!("ignoring caller-supplied `{name}` header");
                continue;
            }
            protected.insert(name, value);
        }
        protected.check_critical(|_| true)?;

        let encoded = protected.to_string();
        let encrypted = encrypter.encrypt(&self.content, encoded.as_bytes(), key).await?;

        let jwe = Jwe {
            protected,
            encoded,
            encrypted,
        };
        Ok(jwe.to_string())
    }

    /// Decrypt the compact JWE with the recipient's private key, returning the
    /// plaintext as a string.
    ///
    /// # Errors
    ///
    /// See [`JweToken::decrypt_bytes`]. Additionally returns `MalformedToken`
    /// if the plaintext is not valid UTF-8.
    pub async fn decrypt(&self, key: &PrivateKey) -> Result<String> {
        let plaintext = self.decrypt_bytes(key).await?;
        String::from_utf8(plaintext)
            .map_err(|_| Error::MalformedToken("plaintext is not valid UTF-8".into()))
    }

    /// Decrypt the compact JWE with the recipient's private key, returning the
    /// plaintext bytes.
    ///
    /// No plaintext is returned unless the encrypter has authenticated both
    /// the ciphertext and the protected header.
    ///
    /// # Errors
    ///
    /// - `MalformedToken` if the token is not a well-formed compact JWE.
    /// - `MissingHeader` if `alg`, `enc` or `kid` is absent.
    /// - `MalformedHeader` if a header has the wrong shape (e.g. `crit`).
    /// - `UnsupportedCriticalExtension` if `crit` lists an extension that is
    ///   not understood.
    /// - `UnsupportedAlgorithm` if `alg` or `enc` is not supported.
    /// - `KeyMismatch` if `kid` does not identify `key`.
    /// - `AuthenticationFailure` if the encrypter cannot authenticate the
    ///   token.
    #[instrument(level = "debug", skip_all, fields(kid = %key.kid))]
    pub async fn decrypt_bytes(&self, key: &PrivateKey) -> Result<Vec<u8>> {
        tracing::debug!("decrypt");

        self.open(key).await.inspect_err(|e| {
            tracing::warn!(code = e.code(), "rejected JWE: {e}");
        })
    }

    async fn open(&self, key: &PrivateKey) -> Result<Vec<u8>> {
        let token = std::str::from_utf8(&self.content)
            .map_err(|_| Error::MalformedToken("invalid JWE: not valid UTF-8".into()))?;
        let jwe = Jwe::from_str(token)?;
        let header = jwe.protected();

        let alg = header.require(ALG)?;
        let enc = header.require(ENC)?;
        let kid = header.require(KID)?;

        header.check_critical(|name| self.understands(name))?;

        let encrypter = self.registry.encrypter(alg)?;
        check_enc(encrypter.as_ref(), enc)?;

        // never attempt decryption with a key the token is not addressed to
        if kid != key.kid {
            return Err(Error::KeyMismatch(format!(
                "header `kid` {kid} does not match private key `kid` {}",
                key.kid
            )));
        }

        tracing::debug!(alg, enc, "authenticating");
        encrypter
            .decrypt(&jwe.encrypted, jwe.aad(), key)
            .await
            .map_err(|e| Error::AuthenticationFailure(format!("authentication failed: {e}")))
    }

    fn understands(&self, name: &str) -> bool {
        self.options.critical_extensions.iter().any(|ext| ext == name)
    }
}

fn check_enc(encrypter: &dyn Encrypter, enc: &str) -> Result<()> {
    if enc == encrypter.content_encryption() {
        return Ok(());
    }
    Err(Error::UnsupportedAlgorithm(format!("unsupported content encryption algorithm: {enc}")))
}

#[cfg(test)]
mod tests {
    use assert_let_bind::assert_let;
    use rstest::rstest;
    use serde_json::json;

    use std::collections::HashMap;
    use std::sync::Arc;

    use futures::future::BoxFuture;

    use super::*;
    use crate::did::KeyConstructor;
    use crate::test_utils::{self, TestCryptoSuite};
    use crate::{CryptoSuite, Encrypter, Signer};

    // Fails to encrypt, and "decrypts" every token to bytes that are not
    // UTF-8.
    struct Faulty;

    impl Encrypter for Faulty {
        fn content_encryption(&self) -> &str {
            "A128GCM"
        }

        fn encrypt<'a>(
            &'a self, _: &'a [u8], _: &'a [u8], _: &'a PublicKey,
        ) -> BoxFuture<'a, anyhow::Result<Encrypted>> {
            Box::pin(async { Err(anyhow::anyhow!("hsm offline")) })
        }

        fn decrypt<'a>(
            &'a self, _: &'a Encrypted, _: &'a [u8], _: &'a PrivateKey,
        ) -> BoxFuture<'a, anyhow::Result<Vec<u8>>> {
            Box::pin(async { Ok(vec![0xff, 0xfe]) })
        }
    }

    impl CryptoSuite for Faulty {
        fn encrypters(&self) -> HashMap<String, Arc<dyn Encrypter>> {
            HashMap::from([("faulty".to_string(), Arc::new(Self) as Arc<dyn Encrypter>)])
        }

        fn signers(&self) -> HashMap<String, Arc<dyn Signer>> {
            HashMap::new()
        }

        fn key_constructors(&self) -> HashMap<String, KeyConstructor> {
            HashMap::new()
        }
    }

    #[test]
    fn parse_compact() {
        let token = "eyJhbGciOiJ0ZXN0In0.a2V5.aXY.Y2lwaGVy.dGFn";
        let jwe = Jwe::from_str(token).expect("should parse");

        assert_eq!(jwe.protected().alg(), Some("test"));
        assert_eq!(jwe.encrypted.encrypted_key, b"key");
        assert_eq!(jwe.encrypted.iv, b"iv");
        assert_eq!(jwe.encrypted.ciphertext, b"cipher");
        assert_eq!(jwe.encrypted.tag, b"tag");
        assert_eq!(jwe.aad(), b"eyJhbGciOiJ0ZXN0In0");
        assert_eq!(jwe.to_string(), token);
    }

    #[rstest]
    #[case::too_few("eyJhbGciOiJ0ZXN0In0.a2V5.aXY.Y2lwaGVy")]
    #[case::too_many("eyJhbGciOiJ0ZXN0In0.a2V5.aXY.Y2lwaGVy.dGFn.dGFn")]
    #[case::empty_header(".a2V5.aXY.Y2lwaGVy.dGFn")]
    #[case::empty_iv("eyJhbGciOiJ0ZXN0In0.a2V5..Y2lwaGVy.dGFn")]
    #[case::empty_tag("eyJhbGciOiJ0ZXN0In0.a2V5.aXY.Y2lwaGVy.")]
    #[case::padded("eyJhbGciOiJ0ZXN0In0.a2V5.aXY=.Y2lwaGVy.dGFn")]
    #[case::not_base64("eyJhbGciOiJ0ZXN0In0.a2V5.aXY.Y2lw*GVy.dGFn")]
    #[case::not_json("bm90IGpzb24.a2V5.aXY.Y2lwaGVy.dGFn")]
    fn malformed(#[case] token: &str) {
        assert_let!(Err(Error::MalformedToken(_)), Jwe::from_str(token));
    }

    #[test]
    fn empty_key_and_ciphertext() {
        let jwe = Jwe::from_str("eyJhbGciOiJ0ZXN0In0..aXY..dGFn").expect("should parse");
        assert!(jwe.encrypted.encrypted_key.is_empty());
        assert!(jwe.encrypted.ciphertext.is_empty());
    }

    #[tokio::test]
    async fn round_trip() {
        test_utils::init_tracer();

        let suite = TestCryptoSuite::new();
        let registry = Registry::new([&suite as &dyn CryptoSuite]).expect("should build");
        let private_key = test_utils::private_key();

        let token = JweToken::new("deadbeef", &registry)
            .encrypt(&private_key.public_key(), None)
            .await
            .expect("should encrypt");
        let plaintext =
            JweToken::new(token, &registry).decrypt(&private_key).await.expect("should decrypt");

        assert_eq!(plaintext, "deadbeef");
    }

    #[tokio::test]
    async fn managed_headers_win() {
        let suite = TestCryptoSuite::new();
        let registry = Registry::new([&suite as &dyn CryptoSuite]).expect("should build");
        let private_key = test_utils::private_key();

        let extra = json!({"kid": "attacker", "alg": "none", "purpose": "test"});
        let Value::Object(extra) = extra else { unreachable!() };

        let token = JweToken::new("deadbeef", &registry)
            .encrypt(&private_key.public_key(), Some(extra))
            .await
            .expect("should encrypt");

        let protected = header(&token).expect("should read header");
        assert_eq!(protected.alg(), Some(test_utils::ALGORITHM));
        assert_eq!(protected.enc(), Some(test_utils::CONTENT_ENCRYPTION));
        assert_eq!(protected.kid(), Some(private_key.kid.as_str()));
        assert_eq!(protected.get("purpose"), Some(&json!("test")));

        let names = protected.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["alg", "enc", "kid", "purpose"]);
    }

    #[tokio::test]
    async fn malformed_crit_on_encrypt() {
        let suite = TestCryptoSuite::new();
        let registry = Registry::new([&suite as &dyn CryptoSuite]).expect("should build");
        let public_key = test_utils::private_key().public_key();

        let Value::Object(extra) = json!({"crit": "exp"}) else { unreachable!() };
        let result = JweToken::new("deadbeef", &registry).encrypt(&public_key, Some(extra)).await;
        assert_let!(Err(Error::MalformedHeader(_)), result);
        assert_eq!(suite.encrypt_calls(), 0);
    }

    #[tokio::test]
    async fn understood_critical_extension() {
        let suite = TestCryptoSuite::new();
        let registry = Registry::new([&suite as &dyn CryptoSuite]).expect("should build");
        let private_key = test_utils::private_key();

        let Value::Object(extra) = json!({"exp": 1_700_000_000, "crit": ["exp"]}) else {
            unreachable!()
        };
        let token = JweToken::new("deadbeef", &registry)
            .encrypt(&private_key.public_key(), Some(extra))
            .await
            .expect("should encrypt");

        let result = JweToken::new(token.as_str(), &registry).decrypt(&private_key).await;
        assert_let!(Err(Error::UnsupportedCriticalExtension(_)), result);

        let options = Options {
            critical_extensions: vec!["exp".into()],
        };
        let plaintext = JweToken::new(token, &registry)
            .with_options(options)
            .decrypt(&private_key)
            .await
            .expect("should decrypt");
        assert_eq!(plaintext, "deadbeef");
    }

    #[tokio::test]
    async fn content_encryption_mismatch() {
        let suite = TestCryptoSuite::new();
        let registry = Registry::new([&suite as &dyn CryptoSuite]).expect("should build");
        let private_key = test_utils::private_key();

        let protected = Header::from(Map::from_iter([
            ("alg".to_string(), json!("test")),
            ("enc".to_string(), json!("A256CBC-HS512")),
            ("kid".to_string(), json!(private_key.kid)),
        ]));
        let token = format!("{protected}.a2V5.aXY.Y2lwaGVy.dGFn");

        let result = JweToken::new(token, &registry).decrypt(&private_key).await;
        assert_let!(Err(Error::UnsupportedAlgorithm(msg)), result);
        assert!(msg.contains("content encryption"));
        assert_eq!(suite.decrypt_calls(), 0);
    }

    #[tokio::test]
    async fn encrypter_failure() {
        let registry = Registry::new([&Faulty as &dyn CryptoSuite]).expect("should build");
        let public_key = PublicKey {
            kty: "RSA".into(),
            kid: "k1".into(),
            default_encryption_algorithm: Some("faulty".into()),
            ..PublicKey::default()
        };

        let result = JweToken::new("deadbeef", &registry).encrypt(&public_key, None).await;
        assert_let!(Err(err @ Error::Other(_)), result);
        assert_eq!(err.code(), "other");
        assert!(err.to_string().contains("hsm offline"));
    }

    #[tokio::test]
    async fn plaintext_not_utf8() {
        let registry = Registry::new([&Faulty as &dyn CryptoSuite]).expect("should build");
        let private_key = PrivateKey {
            kty: "RSA".into(),
            kid: "k1".into(),
            ..PrivateKey::default()
        };

        let protected = Header::from(Map::from_iter([
            ("alg".to_string(), json!("faulty")),
            ("enc".to_string(), json!("A128GCM")),
            ("kid".to_string(), json!("k1")),
        ]));
        let token = format!("{protected}.a2V5.aXY.Y2lwaGVy.dGFn");

        let result = JweToken::new(token.as_str(), &registry).decrypt(&private_key).await;
        assert_let!(Err(Error::MalformedToken(msg)), result);
        assert!(msg.contains("UTF-8"));

        let bytes = JweToken::new(token, &registry)
            .decrypt_bytes(&private_key)
            .await
            .expect("should decrypt");
        assert_eq!(bytes, [0xff, 0xfe]);
    }

    #[test]
    fn options_from_json() {
        let options: Options =
            serde_json::from_value(json!({"criticalExtensions": ["b64"]})).expect("should parse");
        assert_eq!(options.critical_extensions, ["b64"]);

        let options: Options = serde_json::from_value(json!({})).expect("should parse");
        assert!(options.critical_extensions.is_empty());
    }
}
