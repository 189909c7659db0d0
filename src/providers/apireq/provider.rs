//! Conversions between Reqwest errors and provider error types

use crate::providers::apireq::{ReqwestError, ReqwestErrorKind};
use crate::providers::{Error, ErrorKind};

impl From<ReqwestError> for Error {
    fn from(value: ReqwestError) -> Self {
        let kind = match value.kind() {
            ReqwestErrorKind::ConnectFailed
            | ReqwestErrorKind::TimedOut
            | ReqwestErrorKind::BodyFailed
            | ReqwestErrorKind::RedirectPolicyViolated => ErrorKind::Network,
            ReqwestErrorKind::InvalidRequest => ErrorKind::Configuration,
            // The gateway answered, but not with something we understand
            ReqwestErrorKind::DecodingFailed | ReqwestErrorKind::UnknownReqwestError => {
                ErrorKind::Delegate
            }
        };

        Error::from_source(kind, Box::new(value))
    }
}
