//! # JSON Object Signing and Encryption (JOSE)
//!
//! [JOSE] is a framework for securely transferring claims between parties.
//! This module implements the parts of it the envelope needs: the JWE Compact
//! Serialization, the JOSE header, and the JWK representation of recipient
//! keys.
//!
//! [JOSE]: https://datatracker.ietf.org/wg/jose/about

pub mod header;
pub mod jwe;
pub mod jwk;
