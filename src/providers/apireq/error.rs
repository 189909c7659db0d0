//! Wrapper around Reqwest's error type to facilitate exclusive matching

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    /// The request could not be built, e.g. a header value was invalid.
    InvalidRequest,
    ConnectFailed,
    /// The response body could not be read to completion.
    BodyFailed,
    DecodingFailed,
    RedirectPolicyViolated,
    TimedOut,
    UnknownReqwestError,
}

#[derive(Debug)]
pub(crate) struct Error {
    kind: ErrorKind,
    source: reqwest::Error,
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::new(err)
    }
}

impl Error {
    pub(crate) fn new(err: reqwest::Error) -> Error {
        // Timeouts are checked first: a timed out connect is reported as both.
        let kind = if err.is_timeout() {
            ErrorKind::TimedOut
        } else if err.is_builder() {
            ErrorKind::InvalidRequest
        } else if err.is_connect() {
            ErrorKind::ConnectFailed
        } else if err.is_decode() {
            ErrorKind::DecodingFailed
        } else if err.is_body() {
            ErrorKind::BodyFailed
        } else if err.is_redirect() {
            ErrorKind::RedirectPolicyViolated
        } else {
            ErrorKind::UnknownReqwestError
        };

        Error { kind, source: err }
    }

    pub(crate) fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::InvalidRequest => write!(f, "the request could not be built"),
            ErrorKind::ConnectFailed => write!(f, "connection failed"),
            ErrorKind::BodyFailed => write!(f, "reading the response body failed"),
            ErrorKind::DecodingFailed => write!(f, "decoding failed"),
            ErrorKind::RedirectPolicyViolated => write!(f, "redirect policy violated"),
            ErrorKind::TimedOut => write!(f, "timed out"),
            ErrorKind::UnknownReqwestError => write!(f, "unknown reqwest error"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}
