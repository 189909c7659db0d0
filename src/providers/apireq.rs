//! Helpers for making API requests and classifying their failures.

mod error;
mod provider;

pub(crate) use error::Error as ReqwestError;
pub(crate) use error::ErrorKind as ReqwestErrorKind;
pub(crate) use reqwest::Url;
