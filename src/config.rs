//! Client configuration.

use bon::bon;
use snafu::prelude::*;
use url::Url;

use crate::{credentials::Consumer, platform::Duration};

/// The `oauth_callback` value for out-of-band verification.
pub const OUT_OF_BAND_CALLBACK: &str = "oob";

/// Configuration for a [`Client`](crate::Client).
///
/// The endpoint URL is the provider's OAuth entry point, such as
/// `https://meta.wikimedia.org/w/index.php?title=Special:OAuth`. The
/// handshake endpoints are formed by appending `/initiate`, `/token` and so
/// on to it as plain text, so an endpoint that routes through a query
/// parameter works too.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    endpoint_url: String,
    canonical_server_url: String,
    redirect_url: Option<String>,
    callback_url: String,
    verify_tls: bool,
    consumer: Consumer,
    user_agent: Option<String>,
    authenticate_only: bool,
    identity_leeway: Duration,
}

#[bon]
impl ClientConfig {
    /// Creates a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not an absolute `http` or `https`
    /// URL with a host.
    #[builder]
    pub fn new(
        /// The provider's OAuth endpoint.
        #[builder(start_fn, into)]
        endpoint_url: String,
        /// The registered consumer.
        consumer: Consumer,
        /// Where to send the user to authorize, instead of the endpoint's
        /// `/authorize` page.
        #[builder(into)]
        redirect_url: Option<String>,
        /// Sent as `oauth_callback` when initiating.
        #[builder(into, default = OUT_OF_BAND_CALLBACK.to_owned())]
        callback_url: String,
        /// Verify the provider's TLS certificate. Only disable this against
        /// test servers.
        #[builder(default = true)]
        verify_tls: bool,
        /// Sent as `User-Agent` on every call.
        #[builder(into)]
        user_agent: Option<String>,
        /// Send the user to `/authenticate`, which skips the prompt for
        /// consumers that only request identity. Has no effect with a
        /// `redirect_url`.
        #[builder(default = false)]
        authenticate_only: bool,
        /// Allowed clock skew when checking identity token lifetimes.
        #[builder(default)]
        identity_leeway: Duration,
    ) -> Result<Self, ConfigError> {
        let canonical_server_url = canonical_server_url(&endpoint_url)?;

        Ok(Self {
            endpoint_url,
            canonical_server_url,
            redirect_url,
            callback_url,
            verify_tls,
            consumer,
            user_agent,
            authenticate_only,
            identity_leeway,
        })
    }
}

impl ClientConfig {
    /// The provider's OAuth endpoint.
    #[must_use]
    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    /// `scheme://host[:port]` of the endpoint; the issuer of identity tokens.
    #[must_use]
    pub fn canonical_server_url(&self) -> &str {
        &self.canonical_server_url
    }

    /// The authorization redirect, if one was configured.
    #[must_use]
    pub fn redirect_url(&self) -> Option<&str> {
        self.redirect_url.as_deref()
    }

    /// The `oauth_callback` value.
    #[must_use]
    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    /// Whether TLS certificates are verified.
    #[must_use]
    pub fn verify_tls(&self) -> bool {
        self.verify_tls
    }

    /// The registered consumer.
    #[must_use]
    pub fn consumer(&self) -> &Consumer {
        &self.consumer
    }

    /// The `User-Agent` header value, if any.
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Whether users are sent to `/authenticate` rather than `/authorize`.
    #[must_use]
    pub fn authenticate_only(&self) -> bool {
        self.authenticate_only
    }

    /// Allowed clock skew for identity tokens.
    #[must_use]
    pub fn identity_leeway(&self) -> Duration {
        self.identity_leeway
    }

    /// Appends `path` to the endpoint URL.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.endpoint_url)
    }
}

/// Errors that occur when building a [`ClientConfig`].
#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// The endpoint is not a valid absolute URL.
    #[snafu(display("Invalid OAuth endpoint URL '{url}'"))]
    InvalidEndpoint {
        /// The rejected URL.
        url: String,
        /// The underlying parse error.
        source: url::ParseError,
    },
    /// The endpoint does not use `http` or `https`.
    #[snafu(display("OAuth endpoint must use http or https, not '{scheme}'"))]
    UnsupportedScheme {
        /// The endpoint's scheme.
        scheme: String,
    },
}

impl crate::Error for ConfigError {
    fn is_retryable(&self) -> bool {
        false
    }
}

/// Derives `scheme://host[:port]`, keeping the port only if `endpoint`
/// spells one out.
fn canonical_server_url(endpoint: &str) -> Result<String, ConfigError> {
    let url = Url::parse(endpoint).context(InvalidEndpointSnafu { url: endpoint })?;

    ensure!(
        matches!(url.scheme(), "http" | "https"),
        UnsupportedSchemeSnafu {
            scheme: url.scheme()
        }
    );

    let mut canonical = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
    if let Some(port) = explicit_port(endpoint) {
        canonical.push(':');
        canonical.push_str(port);
    }
    Ok(canonical)
}

fn explicit_port(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);
    let (host, port) = host_port.rsplit_once(':')?;

    // An IPv6 literal without a port has its colons inside the brackets.
    if host.starts_with('[') && !host.ends_with(']') {
        return None;
    }
    (!port.is_empty() && port.bytes().all(|b| b.is_ascii_digit())).then_some(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> ClientConfig {
        ClientConfig::builder(endpoint)
            .consumer(Consumer::new("key", "secret"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = config("https://example.org/w/index.php?title=Special:OAuth");
        assert_eq!(config.callback_url(), "oob");
        assert!(config.verify_tls());
        assert!(!config.authenticate_only());
        assert_eq!(config.redirect_url(), None);
        assert_eq!(config.user_agent(), None);
        assert_eq!(config.identity_leeway(), Duration::ZERO);
        assert_eq!(
            config.endpoint("/initiate"),
            "https://example.org/w/index.php?title=Special:OAuth/initiate"
        );
    }

    #[test]
    fn test_canonical_server_url() {
        assert_eq!(
            config("https://example.org/w/index.php?title=Special:OAuth").canonical_server_url(),
            "https://example.org"
        );
        assert_eq!(
            config("http://Example.ORG:8080/oauth").canonical_server_url(),
            "http://example.org:8080"
        );
        assert_eq!(
            config("https://example.org:443/").canonical_server_url(),
            "https://example.org:443"
        );
        assert_eq!(config("http://[::1]/oauth").canonical_server_url(), "http://[::1]");
        assert_eq!(config("http://[::1]:9000/oauth").canonical_server_url(), "http://[::1]:9000");
        assert_eq!(
            config("http://user:pw@example.org/").canonical_server_url(),
            "http://example.org"
        );
    }

    #[test]
    fn test_rejects_bad_endpoints() {
        let result = ClientConfig::builder("not a url")
            .consumer(Consumer::new("key", "secret"))
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidEndpoint { .. })));

        let result = ClientConfig::builder("ftp://example.org/")
            .consumer(Consumer::new("key", "secret"))
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::UnsupportedScheme { scheme }) if scheme == "ftp"
        ));
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::builder("https://example.org/oauth")
            .consumer(Consumer::new("key", "secret"))
            .redirect_url("https://m.example.org/authorize")
            .callback_url("https://app.example/callback")
            .verify_tls(false)
            .user_agent("test-agent/1.0")
            .authenticate_only(true)
            .identity_leeway(Duration::from_secs(60))
            .build()
            .unwrap();

        assert_eq!(config.redirect_url(), Some("https://m.example.org/authorize"));
        assert_eq!(config.callback_url(), "https://app.example/callback");
        assert!(!config.verify_tls());
        assert_eq!(config.user_agent(), Some("test-agent/1.0"));
        assert!(config.authenticate_only());
        assert_eq!(config.identity_leeway(), Duration::from_secs(60));
    }
}
