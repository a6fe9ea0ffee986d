//! The OAuth 1.0a handshake and signed API calls.
//!
//! A [`Client`] walks a user through the three-legged flow:
//!
//! 1. [`Client::initiate`] obtains a request token and the URL to send the
//!    user to.
//! 2. The user approves the consumer at that URL and comes back with a
//!    verifier.
//! 3. [`Client::complete`] trades the request token and verifier for an
//!    access token.
//!
//! With the access token, [`Client::identify`] returns a verified
//! [`Identity`] and [`Client::make_oauth_call`] signs arbitrary API calls.
//! The client keeps no state between calls; storing tokens between the steps
//! is up to the caller.

use bytes::Bytes;
use http::{
    HeaderMap, HeaderValue, Method,
    header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT},
};
use serde_json::Value;
use snafu::prelude::*;

use crate::{
    config::ClientConfig,
    credentials::{Token, TokenParseError},
    encoding::{build_http_query, parse_parameters, percent_encode},
    http::{HttpClient, SendError, send},
    identity::{Identity, IdentityError, IdentityValidation},
    request::{ParamValue, Parameters, Request, RequestError},
    signature::{HmacSha1, SignatureMethod},
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// An OAuth 1.0a consumer bound to one provider.
#[derive(Debug, Clone)]
pub struct Client<C, M = HmacSha1> {
    config: ClientConfig,
    http_client: C,
    signature_method: M,
}

impl<C: HttpClient> Client<C> {
    /// Creates a client that signs with `HMAC-SHA1`.
    pub fn new(config: ClientConfig, http_client: C) -> Self {
        Self::with_signature_method(config, http_client, HmacSha1)
    }
}

impl<C: HttpClient, M: SignatureMethod> Client<C, M> {
    /// Creates a client that signs with `signature_method`.
    pub fn with_signature_method(
        config: ClientConfig,
        http_client: C,
        signature_method: M,
    ) -> Self {
        Self {
            config,
            http_client,
            signature_method,
        }
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Obtains a request token and the URL where the user authorizes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails, the provider reports an error, or
    /// the provider did not confirm the callback.
    pub async fn initiate(&self) -> Result<(String, Token), ClientError> {
        let url = append_query(
            &self.config.endpoint("/initiate"),
            &[("format", "json"), ("oauth_callback", self.config.callback_url())],
        );

        let (body, _) = self
            .send_signed(None, &url, &OAuthCall::default(), Parameters::new())
            .await?;
        let response = TokenResponse::parse(&body)?;
        ensure!(response.callback_confirmed, CallbackNotConfirmedSnafu);

        let authorization_url = self.authorization_url(&response.token);
        tracing::debug!("Obtained request token");
        Ok((authorization_url, response.token))
    }

    /// The URL where the user authorizes `request_token`.
    #[must_use]
    pub fn authorization_url(&self, request_token: &Token) -> String {
        let base = match self.config.redirect_url() {
            Some(redirect_url) => redirect_url.to_owned(),
            None if self.config.authenticate_only() => self.config.endpoint("/authenticate"),
            None => self.config.endpoint("/authorize"),
        };

        append_query(
            &base,
            &[
                ("oauth_token", request_token.key()),
                ("oauth_consumer_key", self.config.consumer().key()),
            ],
        )
    }

    /// Exchanges an authorized request token for an access token.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the provider rejects the
    /// verifier.
    pub async fn complete(
        &self,
        request_token: &Token,
        verifier: &str,
    ) -> Result<Token, ClientError> {
        let url = append_query(&self.config.endpoint("/token"), &[("format", "json")]);
        let protocol: Parameters = [("oauth_verifier", verifier)].into_iter().collect();

        let (body, _) = self
            .send_signed(Some(request_token), &url, &OAuthCall::default(), protocol)
            .await?;
        let response = TokenResponse::parse(&body)?;

        tracing::debug!("Obtained access token");
        Ok(response.token)
    }

    /// Fetches and verifies the identity of the user who granted
    /// `access_token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the identity token does not
    /// verify.
    pub async fn identify(&self, access_token: &Token) -> Result<Identity, ClientError> {
        let url = self.config.endpoint("/identify");

        let (body, request) = self
            .send_signed(Some(access_token), &url, &OAuthCall::default(), Parameters::new())
            .await?;

        let token = std::str::from_utf8(&body)
            .ok()
            .context(UnexpectedResponseSnafu)?
            .trim();
        if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(token) {
            return Err(provider_error(&object));
        }

        let nonce = request
            .parameter("oauth_nonce")
            .and_then(ParamValue::as_single)
            .unwrap_or_default();

        let identity = IdentityValidation::builder()
            .consumer(self.config.consumer())
            .issuer(self.config.canonical_server_url())
            .nonce(nonce)
            .leeway(self.config.identity_leeway())
            .build()
            .verify(token)
            .context(IdentitySnafu)?;

        tracing::debug!(username = identity.username.as_deref(), "Verified identity");
        Ok(identity)
    }

    /// Makes a signed call to an API on behalf of the user.
    ///
    /// Parameters in `url`'s query string and in `call` are signed. The
    /// response body is returned as is.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the server answers with a
    /// non-success status.
    pub async fn make_oauth_call(
        &self,
        token: Option<&Token>,
        url: &str,
        call: OAuthCall,
    ) -> Result<Bytes, ClientError> {
        let (body, _) = self.send_signed(token, url, &call, Parameters::new()).await?;
        Ok(body)
    }

    /// Signs and sends a call.
    ///
    /// `protocol` holds extra `oauth_*` parameters; they are signed and only
    /// travel in the `Authorization` header.
    async fn send_signed(
        &self,
        token: Option<&Token>,
        url: &str,
        call: &OAuthCall,
        protocol: Parameters,
    ) -> Result<(Bytes, Request), ClientError> {
        let consumer = self.config.consumer();
        let method = if call.is_post { Method::POST } else { Method::GET };

        // GET parameters ride in the query, where repeated names stay repeated.
        let encoded = build_http_query(call.params.iter());
        let (target, signed, body) = if call.is_post {
            let mut signed = call.params.clone();
            signed.merge(protocol);
            (url.to_owned(), signed, Bytes::from(encoded))
        } else if encoded.is_empty() {
            (url.to_owned(), protocol, Bytes::new())
        } else {
            let target = format!("{url}{}{encoded}", query_separator(url));
            (target, protocol, Bytes::new())
        };

        let mut request =
            Request::from_consumer_and_token(consumer, token, method.as_str(), &target, signed)
                .context(InvalidRequestSnafu)?;
        request.sign_request(&self.signature_method, consumer, token);
        tracing::trace!(
            base_string = %request.signature_base_string(),
            signature_method = self.signature_method.name(),
            "Signed OAuth request"
        );

        let authorization = request
            .authorization_header_value(None)
            .context(InvalidRequestSnafu)?;

        let mut http_request = http::Request::builder()
            .method(method)
            .uri(target)
            .body(body)
            .context(BuildHttpRequestSnafu)?;

        // Caller headers go first so they cannot replace the signature.
        let headers = http_request.headers_mut();
        headers.extend(call.headers.clone());
        headers.insert(AUTHORIZATION, header_value(&authorization)?);
        if let Some(user_agent) = self.config.user_agent() {
            headers.insert(USER_AGENT, header_value(user_agent)?);
        }
        if call.is_post {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
        }

        let body = send(&self.http_client, http_request)
            .await
            .context(TransportSnafu)?;
        Ok((body, request))
    }
}

/// Options for [`Client::make_oauth_call`].
#[derive(Debug, Clone, Default, bon::Builder)]
pub struct OAuthCall {
    /// Send a `POST` with a form body instead of a `GET`.
    #[builder(default)]
    is_post: bool,
    /// Parameters to sign and send, in the body of a `POST` or the query of
    /// a `GET`.
    #[builder(default)]
    params: Parameters,
    /// Extra headers for the call.
    #[builder(default)]
    headers: HeaderMap,
}

/// Errors that occur during the handshake or a signed call.
#[derive(Debug, Snafu)]
pub enum ClientError {
    /// The call could not be turned into an OAuth request.
    #[snafu(display("Failed to build OAuth request"))]
    InvalidRequest {
        /// The underlying request error.
        source: RequestError,
    },
    /// The signed request could not be turned into an HTTP request.
    #[snafu(display("Failed to build HTTP request"))]
    BuildHttpRequest {
        /// The underlying HTTP error.
        source: http::Error,
    },
    /// The HTTP call failed.
    #[snafu(display("OAuth call failed"))]
    Transport {
        /// The underlying transport error.
        source: SendError,
    },
    /// The provider answered with an error.
    #[snafu(display("Provider returned an error: {message}"))]
    Provider {
        /// The provider's error message.
        message: String,
    },
    /// The provider's response could not be understood.
    #[snafu(display("Unexpected response from provider"))]
    UnexpectedResponse,
    /// The provider's token response lacked a field.
    #[snafu(display("Invalid token response"))]
    InvalidTokenResponse {
        /// The underlying parse error.
        source: TokenParseError,
    },
    /// The provider did not confirm the callback URL when initiating.
    #[snafu(display("Callback wasn't confirmed"))]
    CallbackNotConfirmed,
    /// The identity token did not verify.
    #[snafu(display("Identity token rejected"))]
    Identity {
        /// The underlying identity error.
        source: IdentityError,
    },
}

impl crate::Error for ClientError {
    fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport { source } => crate::Error::is_retryable(source),
            _ => false,
        }
    }
}

/// A request or access token response.
#[derive(Debug)]
struct TokenResponse {
    token: Token,
    callback_confirmed: bool,
}

impl TokenResponse {
    /// Parses a JSON `{key, secret}` body, or a form
    /// `oauth_token=...&oauth_token_secret=...` body.
    fn parse(body: &[u8]) -> Result<Self, ClientError> {
        if let Ok(Value::Object(object)) = serde_json::from_slice::<Value>(body) {
            if object.contains_key("error") {
                return Err(provider_error(&object));
            }

            let field = |name: &str| object.get(name).and_then(Value::as_str);
            let (Some(key), Some(secret)) = (field("key"), field("secret")) else {
                return UnexpectedResponseSnafu.fail();
            };
            let callback_confirmed = matches!(
                object.get("oauth_callback_confirmed"),
                Some(Value::Bool(true))
            ) || field("oauth_callback_confirmed") == Some("true");

            return Ok(Self {
                token: Token::new(key, secret),
                callback_confirmed,
            });
        }

        let form = std::str::from_utf8(body).ok().context(UnexpectedResponseSnafu)?;
        let params = parse_parameters(form);
        if let Some(problem) = params.get("oauth_problem").and_then(ParamValue::as_single) {
            return ProviderSnafu { message: problem }.fail();
        }

        Ok(Self {
            token: Token::from_form(form).context(InvalidTokenResponseSnafu)?,
            callback_confirmed: params
                .get("oauth_callback_confirmed")
                .and_then(ParamValue::as_single)
                == Some("true"),
        })
    }
}

fn provider_error(object: &serde_json::Map<String, Value>) -> ClientError {
    let text = |name: &str| match object.get(name) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Object(inner)) => inner
            .get("info")
            .or_else(|| inner.get("code"))
            .and_then(Value::as_str)
            .map(str::to_owned),
        _ => None,
    };

    let message = match (text("error"), text("message")) {
        (Some(error), Some(message)) => format!("{error}: {message}"),
        (Some(error), None) => error,
        (None, Some(message)) => message,
        (None, None) => "unknown error".to_owned(),
    };
    ClientError::Provider { message }
}

fn header_value(value: &str) -> Result<HeaderValue, ClientError> {
    HeaderValue::try_from(value)
        .map_err(http::Error::from)
        .context(BuildHttpRequestSnafu)
}

fn query_separator(url: &str) -> char {
    if url.contains('?') { '&' } else { '?' }
}

/// Appends `params` to `url`'s query, in order.
fn append_query(url: &str, params: &[(&str, &str)]) -> String {
    let query = params
        .iter()
        .map(|(name, value)| format!("{}={}", percent_encode(name), percent_encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{url}{}{query}", query_separator(url))
}
