#![allow(missing_docs)]
#![allow(dead_code)]

use base64ct::{Base64UrlUnpadded, Encoding};
use rstest::fixture;
use serde_json::Value;
use vercre_envelope::test_utils::TestCryptoSuite;
use vercre_envelope::{CryptoSuite, Registry};

#[fixture]
pub fn suite() -> TestCryptoSuite {
    TestCryptoSuite::new()
}

/// Registry over the given suite.
pub fn registry(suite: &TestCryptoSuite) -> Registry {
    Registry::new([suite as &dyn CryptoSuite]).expect("should build registry")
}

/// Replace the protected header of a compact JWE, keeping the remaining
/// segments (and therefore the original authentication tag).
pub fn using_headers(token: &str, headers: &Value) -> String {
    let encoded = Base64UrlUnpadded::encode_string(&serde_json::to_vec(headers).expect("json"));
    let (_, rest) = token.split_once('.').expect("should have segments");
    format!("{encoded}.{rest}")
}

/// Decode the protected header of a compact JWE by hand.
pub fn decode_headers(token: &str) -> Value {
    let (encoded, _) = token.split_once('.').expect("should have segments");
    let bytes = Base64UrlUnpadded::decode_vec(encoded).expect("should decode");
    serde_json::from_slice(&bytes).expect("should deserialize")
}
