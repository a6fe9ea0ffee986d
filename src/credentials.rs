//! Consumer and token credentials.
//!
//! Both are a public key plus a shared secret. Secrets are held in
//! [`SecretString`] so they are redacted from `Debug` output and zeroized on
//! drop.

use std::fmt;

use secrecy::{ExposeSecret as _, SecretString};
use snafu::prelude::*;

use crate::encoding::{parse_parameters, percent_encode};

/// The registered identity of the calling application.
#[derive(Debug, Clone)]
pub struct Consumer {
    key: String,
    secret: SecretString,
}

impl Consumer {
    /// Creates a consumer from its key and secret.
    pub fn new(key: impl Into<String>, secret: impl Into<SecretString>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    /// The public consumer key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The consumer secret.
    #[must_use]
    pub fn secret(&self) -> &SecretString {
        &self.secret
    }
}

/// A request token or access token issued by the provider.
///
/// OAuth 1.0a tokens do not expire; an access token stays valid until the
/// user revokes it. Storing the token between the steps of the handshake
/// is the caller's job.
#[derive(Debug, Clone)]
pub struct Token {
    key: String,
    secret: SecretString,
}

impl Token {
    /// Creates a token from its key and secret.
    pub fn new(key: impl Into<String>, secret: impl Into<SecretString>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    /// The public token key, sent as `oauth_token`.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The token secret.
    #[must_use]
    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// Parses `oauth_token=...&oauth_token_secret=...` as returned by token
    /// endpoints that answer with a form body.
    ///
    /// # Errors
    ///
    /// Returns an error if either parameter is missing or repeated.
    pub fn from_form(form: &str) -> Result<Self, TokenParseError> {
        let params = parse_parameters(form);

        let field = |name: &'static str| {
            params
                .get(name)
                .and_then(|v| v.as_single())
                .map(str::to_owned)
                .context(MissingFieldSnafu { name })
        };

        Ok(Self::new(field("oauth_token")?, field("oauth_token_secret")?))
    }
}

/// Serializes as `oauth_token=<key>&oauth_token_secret=<secret>`.
///
/// This exposes the secret; only use it to hand the token to storage.
impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "oauth_token={}&oauth_token_secret={}",
            percent_encode(&self.key),
            percent_encode(self.secret.expose_secret())
        )
    }
}

/// Errors that occur when parsing a form-encoded token.
#[derive(Debug, Snafu)]
pub enum TokenParseError {
    /// A required field was missing or held more than one value.
    #[snafu(display("Token response is missing '{name}'"))]
    MissingField {
        /// The name of the missing field.
        name: &'static str,
    },
}

impl crate::Error for TokenParseError {
    fn is_retryable(&self) -> bool {
        false
    }
}
