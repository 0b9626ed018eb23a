//! Session handling for the upstream storefront.
//!
//! The storefront scopes inventory per regional substore and guards its
//! endpoints with two pieces of per-session state: a cookie jar issued via
//! `Set-Cookie` headers, and a rotating signature token derived from the
//! previous request's token. Both live in [`client::SessionClient`].

pub mod client;
pub mod token;
pub mod wire;

use shelfwatch_core::Pincode;
use thiserror::Error;

pub use client::{Handshake, SessionClient};
pub use token::TokenChain;

/// Errors from a single storefront exchange.
#[derive(Debug, Error)]
pub enum SessionError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The storefront returned a non-success status.
    #[error("storefront returned {status} from {endpoint}")]
    Status {
        /// Endpoint name, for log context.
        endpoint: &'static str,
        /// HTTP status code.
        status: u16,
    },

    /// Failed to parse a response body.
    #[error("parse error: {0}")]
    Parse(String),

    /// The handshake completed but the session is not bound to a substore.
    #[error("session is not bound to a substore")]
    Unbound,
}

/// Errors from resolving a pincode to a substore.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No substore serves the pincode. Retrying will not help.
    #[error("no substore serves pincode {0}")]
    NotFound(Pincode),

    /// A storefront exchange failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The substore directory could not be read or written.
    #[error("directory error: {0}")]
    Store(#[from] crate::kv::StoreError),
}
