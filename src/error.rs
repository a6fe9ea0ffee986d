//! The [`Error`] trait shared by every error in the crate.
//!
//! Signing and verification errors are never retryable. Handshake errors
//! are retryable only when the transport failed in a way that may be
//! temporary; the crate reports this but never retries by itself.

use std::convert::Infallible;

use snafu::{AsErrorSource, Snafu};

use crate::platform::MaybeSendSync;

/// Errors that may occur in the library.
pub trait Error: std::error::Error + AsErrorSource + MaybeSendSync + 'static {
    /// If true, repeating the whole call unchanged may succeed.
    fn is_retryable(&self) -> bool;
}

impl Error for Infallible {
    fn is_retryable(&self) -> bool {
        false
    }
}

/// A transport error with its concrete type erased.
///
/// Keeps [`Client`](crate::Client) errors free of the HTTP client's type
/// parameter while still answering [`Error::is_retryable`].
#[derive(Debug, Snafu)]
#[snafu(transparent)]
pub struct BoxedError {
    source: Box<dyn Error>,
}

impl BoxedError {
    /// Boxes a transport error.
    pub fn from_err<E: Error>(err: E) -> Self {
        Self {
            source: Box::new(err),
        }
    }
}

impl Error for BoxedError {
    fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Snafu)]
    #[snafu(display("connection reset"))]
    struct Reset {
        retryable: bool,
    }

    impl Error for Reset {
        fn is_retryable(&self) -> bool {
            self.retryable
        }
    }

    #[test]
    fn test_boxed_error_keeps_retryability() {
        assert!(BoxedError::from_err(Reset { retryable: true }).is_retryable());
        assert!(!BoxedError::from_err(Reset { retryable: false }).is_retryable());
    }

    #[test]
    fn test_boxed_error_is_transparent() {
        let boxed = BoxedError::from_err(Reset { retryable: false });
        assert_eq!(boxed.to_string(), "connection reset");
    }
}
