use secrecy::ExposeSecret as _;

use crate::{
    credentials::{Consumer, Token},
    signature::{SignatureMethod, signing_key},
};

/// The `PLAINTEXT` method (RFC 5849 §3.4.4).
///
/// The signature is the signing key itself, so it must only be used over
/// TLS.
#[derive(Debug, Clone, Copy, Default)]
pub struct Plaintext;

impl SignatureMethod for Plaintext {
    fn name(&self) -> &'static str {
        "PLAINTEXT"
    }

    fn sign(&self, _base_string: &str, consumer: &Consumer, token: Option<&Token>) -> String {
        signing_key(consumer, token).expose_secret().to_owned()
    }
}
