use bon::Builder;

use crate::{
    encoding::{parse_parameters, split_authorization_header},
    request::{Request, RequestError},
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// The parts of a received HTTP request needed to rebuild an OAuth request.
///
/// Servers that verify signed calls fill this in from their framework's
/// request type and pass it to [`Request::from_incoming`].
#[derive(Debug, Clone, Builder)]
pub struct IncomingRequest<'a> {
    /// The HTTP method.
    method: &'a str,
    /// The absolute request URL, including the query string.
    url: &'a str,
    /// The raw request body.
    #[builder(default)]
    body: &'a str,
    /// The `Content-Type` header.
    content_type: Option<&'a str>,
    /// The `Authorization` header.
    authorization: Option<&'a str>,
}

impl Request {
    /// Rebuilds an OAuth request from an HTTP request received by a server.
    ///
    /// Parameters are gathered from the query string, then from a
    /// form-encoded `POST` body, then from an `Authorization: OAuth` header.
    /// On a name collision the later source wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the request URL is not absolute.
    pub fn from_incoming(incoming: &IncomingRequest<'_>) -> Result<Self, RequestError> {
        let mut parameters = incoming
            .url
            .split_once('?')
            .map(|(_, query)| query.split_once('#').map_or(query, |(q, _)| q))
            .map(parse_parameters)
            .unwrap_or_default();

        let is_form_post = incoming.method.eq_ignore_ascii_case("POST")
            && incoming
                .content_type
                .is_some_and(|ct| ct.contains(FORM_CONTENT_TYPE));
        if is_form_post {
            parameters.merge(parse_parameters(incoming.body));
        }

        if let Some(header) = incoming.authorization.filter(|h| is_oauth_header(h)) {
            parameters.merge(split_authorization_header(header));
        }

        Request::new(incoming.method, incoming.url, parameters)
    }
}

fn is_oauth_header(value: &str) -> bool {
    value
        .get(..6)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("OAuth "))
}
