//! Response envelopes for successful and failed requests

use serde::Serialize;
use serde_json::value::RawValue;

use crate::error::Error;
use crate::meta::{HttpMethod, ResponseMeta};
use crate::result::{NetworkResult, PathResult};
use crate::server::NativeApiInfo;
use crate::timers::Timers;

/// Hypermedia links of a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Links {
    #[serde(rename = "self")]
    pub self_link: String,
}

impl Links {
    pub fn new(self_link: impl Into<String>) -> Self {
        Self {
            self_link: self_link.into(),
        }
    }
}

/// Successful response: typed payload, links, metadata and optional raw data
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
    pub links: Links,
    pub meta: ResponseMeta,
    /// Engine document exactly as returned, present only when requested
    #[serde(rename = "rawData", skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<Box<RawValue>>,
}

pub type PathResponse = ApiResponse<PathResult>;
pub type NetworkResponse = ApiResponse<NetworkResult>;

impl<T> ApiResponse<T> {
    pub fn new(data: T, links: Links, meta: ResponseMeta) -> Self {
        Self {
            data,
            links,
            meta,
            raw_data: None,
        }
    }

    pub fn with_raw_data(mut self, raw: Box<RawValue>) -> Self {
        self.raw_data = Some(raw);
        self
    }
}

/// Wrap an engine document for verbatim passthrough. Fails if it is not valid JSON.
pub fn raw_document(raw: String) -> Result<Box<RawValue>, Error> {
    Ok(RawValue::from_string(raw)?)
}

/// One reported failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    pub message: String,
}

impl From<&Error> for ErrorDetail {
    fn from(error: &Error) -> Self {
        Self {
            code: error.engine_code(),
            message: error.to_string(),
        }
    }
}

/// Failed response; carries the error that produced it
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub links: Links,
    pub meta: ResponseMeta,
    pub errors: Vec<ErrorDetail>,
    #[serde(skip)]
    error: Error,
}

impl ErrorResponse {
    pub fn new(
        method: HttpMethod,
        error: Error,
        self_link: impl Into<String>,
        timers: Timers,
        native_api: Option<&NativeApiInfo>,
    ) -> Self {
        Self {
            links: Links::new(self_link),
            meta: ResponseMeta::new(method, error.status_code(), timers, native_api),
            errors: vec![ErrorDetail::from(&error)],
            error,
        }
    }

    pub fn status(&self) -> u16 {
        self.meta.http_status_code()
    }

    pub fn error(&self) -> &Error {
        &self.error
    }

    pub fn into_error(self) -> Error {
        self.error
    }
}
