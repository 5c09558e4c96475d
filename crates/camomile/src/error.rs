//! Error model for the request pipeline (`spec.md` §7).
//!
//! Two kinds flow through the pipeline: [`ProxyError::ClientVisible`] carries
//! a `(status, message)` pair that is written to the client verbatim, and
//! [`ProxyError::Internal`] represents anything else — logged out-of-band
//! and surfaced to the client as a bare `500 Internal server error`.

use http::StatusCode;
use std::fmt;

use crate::signature::BadSignature;
use crate::ssrf::SsrfRejection;

pub enum ProxyError {
    ClientVisible { status: StatusCode, message: String },
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl ProxyError {
    pub fn client_visible(status: StatusCode, message: impl Into<String>) -> Self {
        Self::ClientVisible { status, message: message.into() }
    }

    pub fn internal(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(Box::new(source))
    }

    /// The `(status, body)` pair actually written to the client; internal
    /// errors are folded down to the generic 500 here, never leaking `source`.
    pub fn response_parts(&self) -> (StatusCode, &str) {
        match self {
            Self::ClientVisible { status, message } => (*status, message.as_str()),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        }
    }
}

impl fmt::Debug for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientVisible { status, message } => f.debug_struct("ClientVisible").field("status", status).field("message", message).finish(),
            Self::Internal(source) => f.debug_tuple("Internal").field(source).finish(),
        }
    }
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientVisible { status, message } => write!(f, "{status}: {message}"),
            Self::Internal(source) => write!(f, "internal error: {source}"),
        }
    }
}

impl std::error::Error for ProxyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Internal(source) => Some(source.as_ref()),
            Self::ClientVisible { .. } => None,
        }
    }
}

impl From<BadSignature> for ProxyError {
    fn from(_: BadSignature) -> Self {
        Self::client_visible(StatusCode::FORBIDDEN, "Bad signature")
    }
}

impl From<SsrfRejection> for ProxyError {
    fn from(rejection: SsrfRejection) -> Self {
        Self::client_visible(StatusCode::BAD_REQUEST, rejection.to_string())
    }
}
