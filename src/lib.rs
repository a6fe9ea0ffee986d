//! Implements an OAuth 1.0a client with signed identity assertions.

#![forbid(unsafe_code)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod client;
pub mod config;
pub mod credentials;
pub mod encoding;
mod error;
pub mod http;
pub mod identity;
pub mod platform;
pub mod prelude;
pub mod request;
pub mod signature;

pub use client::{Client, ClientError, OAuthCall};
pub use config::ClientConfig;
pub use credentials::{Consumer, Token};
pub use error::{BoxedError, Error};
pub use identity::Identity;
pub use request::Request;

/// Documentation
pub mod _documentation {
    #[doc = include_str!("../README.md")]
    mod readme {}
    #[doc = include_str!("../CHANGELOG.md")]
    pub mod changelog {}
}

/// Re-export of parts of the `secrecy` crate.
pub mod secrecy {
    pub use ::secrecy::{ExposeSecret, SecretString};
}

pub use bytes::Bytes;
