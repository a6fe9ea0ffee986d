//! OAuth 1.0 signature methods (RFC 5849 §3.4).
//!
//! A [`SignatureMethod`] turns a request's signature base string into the
//! `oauth_signature` value, and checks a received value against a freshly
//! computed one. [`HmacSha1`] and [`Plaintext`] are provided; further
//! methods such as RSA-SHA1 only need to implement the trait.

mod hmac_sha1;
mod plaintext;

use secrecy::{ExposeSecret as _, SecretString};
use subtle::ConstantTimeEq as _;

use crate::{
    credentials::{Consumer, Token},
    encoding::percent_encode,
    platform::MaybeSendSync,
    request::Request,
};

pub use hmac_sha1::HmacSha1;
pub use plaintext::Plaintext;

/// An algorithm for signing OAuth requests.
pub trait SignatureMethod: MaybeSendSync {
    /// The value sent as `oauth_signature_method`.
    fn name(&self) -> &'static str;

    /// Signs a signature base string.
    fn sign(&self, base_string: &str, consumer: &Consumer, token: Option<&Token>) -> String;

    /// Computes the signature of a request.
    fn build_signature(
        &self,
        request: &Request,
        consumer: &Consumer,
        token: Option<&Token>,
    ) -> String {
        self.sign(&request.signature_base_string(), consumer, token)
    }

    /// Checks `candidate` against the signature of `base_string`.
    ///
    /// The comparison takes the same time wherever the first mismatching
    /// byte is.
    fn verify(
        &self,
        base_string: &str,
        consumer: &Consumer,
        token: Option<&Token>,
        candidate: &str,
    ) -> bool {
        let expected = self.sign(base_string, consumer, token);
        expected.as_bytes().ct_eq(candidate.as_bytes()).into()
    }

    /// Checks `candidate` against the signature of a request.
    fn check_signature(
        &self,
        request: &Request,
        consumer: &Consumer,
        token: Option<&Token>,
        candidate: &str,
    ) -> bool {
        self.verify(&request.signature_base_string(), consumer, token, candidate)
    }
}

/// Builds the shared signing key: `enc(consumer secret)&enc(token secret)`.
///
/// Without a token the key still ends in `&`.
pub(crate) fn signing_key(consumer: &Consumer, token: Option<&Token>) -> SecretString {
    let token_secret = token.map_or("", |t| t.secret().expose_secret());
    SecretString::from(format!(
        "{}&{}",
        percent_encode(consumer.secret().expose_secret()),
        percent_encode(token_secret)
    ))
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret as _;

    use super::*;

    #[test]
    fn test_signing_key_without_token() {
        let consumer = Consumer::new("__unused__", "cs");
        assert_eq!(signing_key(&consumer, None).expose_secret(), "cs&");
    }

    #[test]
    fn test_signing_key_encodes_both_secrets() {
        let consumer = Consumer::new("__unused__", "c&s");
        let token = Token::new("__unused__", "t s");
        assert_eq!(
            signing_key(&consumer, Some(&token)).expose_secret(),
            "c%26s&t%20s"
        );
    }
}
