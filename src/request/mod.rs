//! OAuth requests: parameter collection, normalization and serialization.
//!
//! A [`Request`] is a method, a URL and an ordered parameter map. It can
//! produce its signature base string (RFC 5849 §3.4.1), carry the resulting
//! signature, and serialize itself as an `Authorization` header, a form body
//! or a URL.

mod incoming;
mod params;

use std::fmt;

use rand::TryRng as _;
use snafu::prelude::*;
use url::Url;

use crate::{
    credentials::{Consumer, Token},
    encoding::{build_http_query, parse_parameters, percent_encode},
    platform::unix_now,
    signature::SignatureMethod,
};

pub use incoming::IncomingRequest;
pub use params::{ParamValue, Parameters};

/// The protocol version sent as `oauth_version`.
pub const OAUTH_VERSION: &str = "1.0";

const NONCE_BYTES: usize = 16;

/// An OAuth request.
#[derive(Debug, Clone)]
pub struct Request {
    method: String,
    url: Url,
    explicit_path: bool,
    parameters: Parameters,
}

impl Request {
    /// Creates a request.
    ///
    /// The parameters in the URL's query string seed the map; entries in
    /// `parameters` override them.
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not an absolute URL.
    pub fn new(
        method: impl Into<String>,
        url: &str,
        parameters: Parameters,
    ) -> Result<Self, RequestError> {
        let parsed = Url::parse(url).context(InvalidUrlSnafu { url })?;

        let mut seeded = parsed.query().map(parse_parameters).unwrap_or_default();
        seeded.merge(parameters);

        Ok(Self {
            method: method.into(),
            explicit_path: has_explicit_path(url),
            url: parsed,
            parameters: seeded,
        })
    }

    /// Creates a request carrying the protocol parameters for `consumer` and
    /// an optional `token`.
    ///
    /// `oauth_version`, `oauth_nonce`, `oauth_timestamp` and
    /// `oauth_consumer_key` are filled in, plus `oauth_token` when a token is
    /// given. Entries in `extra` override these defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not an absolute URL.
    pub fn from_consumer_and_token(
        consumer: &Consumer,
        token: Option<&Token>,
        method: impl Into<String>,
        url: &str,
        extra: Parameters,
    ) -> Result<Self, RequestError> {
        let mut parameters = Parameters::new();
        parameters.set("oauth_version", OAUTH_VERSION);
        parameters.set("oauth_nonce", generate_nonce());
        parameters.set("oauth_timestamp", unix_now().to_string());
        parameters.set("oauth_consumer_key", consumer.key());
        if let Some(token) = token {
            parameters.set("oauth_token", token.key());
        }
        parameters.merge(extra);

        Self::new(method, url, parameters)
    }

    /// Returns the value of a parameter.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ParamValue> {
        self.parameters.get(name)
    }

    /// Returns all parameters.
    #[must_use]
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Sets a parameter.
    ///
    /// With `allow_duplicates`, an existing value is kept and `value` is
    /// added after it. Otherwise any existing value is replaced.
    pub fn set_parameter(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        allow_duplicates: bool,
    ) {
        if allow_duplicates {
            self.parameters.append(name, value);
        } else {
            self.parameters.set(name, value.into());
        }
    }

    /// Removes a parameter.
    pub fn unset_parameter(&mut self, name: &str) {
        self.parameters.remove(name);
    }

    /// The normalized parameter string: every parameter except
    /// `oauth_signature`, encoded and sorted.
    #[must_use]
    pub fn signable_parameters(&self) -> String {
        build_http_query(
            self.parameters
                .iter()
                .filter(|(name, _)| *name != "oauth_signature"),
        )
    }

    /// The upper-cased HTTP method.
    #[must_use]
    pub fn normalized_method(&self) -> String {
        self.method.to_ascii_uppercase()
    }

    /// The base string URI (RFC 5849 §3.4.1.2).
    ///
    /// The scheme and host are lowercase, the port is only kept when it is
    /// not the default for the scheme, and the query and fragment are
    /// dropped. A URL written without a path stays without one.
    #[must_use]
    pub fn normalized_url(&self) -> String {
        let mut out = format!(
            "{}://{}",
            self.url.scheme(),
            self.url.host_str().unwrap_or_default()
        );
        if let Some(port) = self.url.port() {
            out.push(':');
            out.push_str(&port.to_string());
        }
        if self.explicit_path || self.url.path() != "/" {
            out.push_str(self.url.path());
        }
        out
    }

    /// The signature base string: method, URL and parameters, each encoded
    /// and joined with `&`.
    #[must_use]
    pub fn signature_base_string(&self) -> String {
        [
            self.normalized_method(),
            self.normalized_url(),
            self.signable_parameters(),
        ]
        .iter()
        .map(|part| percent_encode(part))
        .collect::<Vec<_>>()
        .join("&")
    }

    /// Builds the full `Authorization: OAuth ...` header line.
    ///
    /// Only parameters whose name starts with `oauth` are included, in the
    /// order they were added.
    ///
    /// # Errors
    ///
    /// Returns an error if one of those parameters has more than one value.
    pub fn to_header(&self, realm: Option<&str>) -> Result<String, RequestError> {
        Ok(format!("Authorization: {}", self.authorization_header_value(realm)?))
    }

    /// Builds the value of the `Authorization` header, without the header
    /// name.
    ///
    /// # Errors
    ///
    /// Returns an error if an `oauth` parameter has more than one value.
    pub fn authorization_header_value(&self, realm: Option<&str>) -> Result<String, RequestError> {
        let mut entries = Vec::new();

        if let Some(realm) = realm.filter(|r| !r.is_empty()) {
            entries.push(format!("realm=\"{}\"", percent_encode(realm)));
        }

        for (name, value) in self.parameters.iter() {
            if !name.starts_with("oauth") {
                continue;
            }
            let value = value
                .as_single()
                .context(MultiValuedHeaderParameterSnafu { name })?;
            entries.push(format!(
                "{}=\"{}\"",
                percent_encode(name),
                percent_encode(value)
            ));
        }

        if entries.is_empty() {
            Ok("OAuth".to_owned())
        } else {
            Ok(format!("OAuth {}", entries.join(",")))
        }
    }

    /// All parameters as a normalized form body.
    #[must_use]
    pub fn to_post_data(&self) -> String {
        build_http_query(self.parameters.iter())
    }

    /// The normalized URL with every parameter in the query string.
    #[must_use]
    pub fn to_url(&self) -> String {
        let post_data = self.to_post_data();
        let mut out = self.normalized_url();
        if !post_data.is_empty() {
            out.push('?');
            out.push_str(&post_data);
        }
        out
    }

    /// Signs the request, replacing any previous `oauth_signature_method`
    /// and `oauth_signature`.
    pub fn sign_request<M: SignatureMethod + ?Sized>(
        &mut self,
        method: &M,
        consumer: &Consumer,
        token: Option<&Token>,
    ) {
        self.set_parameter("oauth_signature_method", method.name(), false);
        let signature = self.build_signature(method, consumer, token);
        self.set_parameter("oauth_signature", signature, false);
    }

    /// Computes the signature of the request without storing it.
    #[must_use]
    pub fn build_signature<M: SignatureMethod + ?Sized>(
        &self,
        method: &M,
        consumer: &Consumer,
        token: Option<&Token>,
    ) -> String {
        method.build_signature(self, consumer, token)
    }

    /// Verifies the request's `oauth_signature` parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature is absent or does not match.
    pub fn check_signature<M: SignatureMethod + ?Sized>(
        &self,
        method: &M,
        consumer: &Consumer,
        token: Option<&Token>,
    ) -> Result<(), RequestError> {
        let candidate = self
            .parameter("oauth_signature")
            .and_then(ParamValue::as_single)
            .context(MissingSignatureSnafu)?;

        ensure!(
            method.check_signature(self, consumer, token, candidate),
            SignatureMismatchSnafu {
                method: method.name()
            }
        );
        Ok(())
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_url())
    }
}

/// Errors produced while building, serializing or verifying a request.
#[derive(Debug, Snafu)]
pub enum RequestError {
    /// The request URL could not be parsed.
    #[snafu(display("Invalid request URL '{url}'"))]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// The underlying parse error.
        source: url::ParseError,
    },
    /// An `oauth` parameter has several values and cannot go in a header.
    #[snafu(display("Parameter '{name}' has multiple values, which headers cannot carry"))]
    MultiValuedHeaderParameter {
        /// The parameter name.
        name: String,
    },
    /// The request has no single `oauth_signature` to check.
    #[snafu(display("Request is not signed"))]
    MissingSignature,
    /// The received signature does not match the computed one.
    #[snafu(display("Invalid {method} signature"))]
    SignatureMismatch {
        /// The signature method that was checked.
        method: &'static str,
    },
}

impl crate::Error for RequestError {
    fn is_retryable(&self) -> bool {
        false
    }
}

/// Generates a nonce of 32 lowercase hex digits.
fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::rng()
        .try_fill_bytes(&mut bytes)
        .unwrap_or_else(|e: std::convert::Infallible| match e {});
    hex::encode(bytes)
}

/// Whether the authority of `url` is followed by a path.
///
/// `http://example.com` and `http://example.com/` parse to the same [`Url`],
/// but only the latter is signed with a trailing slash.
fn has_explicit_path(url: &str) -> bool {
    let Some((_, rest)) = url.split_once("://") else {
        return true;
    };
    rest.find(['/', '?', '#'])
        .is_some_and(|i| rest.as_bytes()[i] == b'/')
}
