use bytes::Bytes;
use http::StatusCode;
use snafu::prelude::*;

use crate::{
    error::BoxedError,
    http::{HttpClient, HttpResponse},
};

/// Errors that occur while sending a signed request.
#[derive(Debug, Snafu)]
pub enum SendError {
    /// The request could not be sent.
    #[snafu(display("HTTP request failed"))]
    Request {
        /// The transport error.
        source: BoxedError,
    },
    /// The response body could not be read.
    #[snafu(display("Failed to read HTTP response body"))]
    ResponseBody {
        /// The transport error.
        source: BoxedError,
    },
    /// The server answered with a non-success status.
    #[snafu(display("Server returned HTTP {status}"))]
    BadStatus {
        /// The response status.
        status: StatusCode,
        /// The response body.
        body: Bytes,
    },
}

impl crate::Error for SendError {
    fn is_retryable(&self) -> bool {
        match self {
            SendError::Request { source } | SendError::ResponseBody { source } => {
                crate::Error::is_retryable(source)
            }
            SendError::BadStatus { status, .. } => status.is_server_error(),
        }
    }
}

/// Sends `request` and returns the body of a successful response.
pub(crate) async fn send<C: HttpClient>(
    http_client: &C,
    request: http::Request<Bytes>,
) -> Result<Bytes, SendError> {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = http_client
        .execute(request)
        .await
        .map_err(BoxedError::from_err)
        .context(RequestSnafu)?;
    let status = response.status();
    tracing::debug!(%method, %uri, %status, "OAuth call completed");

    let body = response
        .body()
        .await
        .map_err(BoxedError::from_err)
        .context(ResponseBodySnafu)?;

    if status.is_success() {
        Ok(body)
    } else {
        BadStatusSnafu { status, body }.fail()
    }
}
