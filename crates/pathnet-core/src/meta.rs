//! Response metadata: method, status, versions, timestamp and timings

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::server::{NativeApiInfo, REST_API_VERSION, SERVER_VERSION};
use crate::timers::{Timers, Timings};

/// UTC timestamps with millisecond precision, e.g. `2024-03-01T12:00:00.123Z`
pub mod millis_format {
    use chrono::{DateTime, Utc};
    use serde::Serializer;

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }
}

/// HTTP method of the originating request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

/// Metadata attached to every response, success or failure
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    http_method: HttpMethod,
    http_status_code: u16,
    #[serde(with = "millis_format")]
    timestamp: DateTime<Utc>,
    version: &'static str,
    rest_api_version: &'static str,
    #[serde(flatten)]
    native_api: Option<NativeApiInfo>,
    #[serde(rename = "timings", skip_serializing_if = "Timers::is_empty")]
    timers: Timers,
}

impl ResponseMeta {
    /// Build metadata; `native_api` is present only when an engine is reachable
    pub fn new(
        http_method: HttpMethod,
        http_status_code: u16,
        timers: Timers,
        native_api: Option<&NativeApiInfo>,
    ) -> Self {
        Self {
            http_method,
            http_status_code,
            timestamp: Utc::now(),
            version: SERVER_VERSION,
            rest_api_version: REST_API_VERSION,
            native_api: native_api.cloned(),
            timers,
        }
    }

    pub fn http_method(&self) -> HttpMethod {
        self.http_method
    }

    pub fn http_status_code(&self) -> u16 {
        self.http_status_code
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn version(&self) -> &str {
        self.version
    }

    pub fn rest_api_version(&self) -> &str {
        self.rest_api_version
    }

    pub fn native_api(&self) -> Option<&NativeApiInfo> {
        self.native_api.as_ref()
    }

    /// Conclude any running timers (first call only) and return the timings
    pub fn conclude_timers(&self) -> &Timings {
        self.timers.conclude_all()
    }

    /// Frozen timings, `None` when nothing was timed. Reading concludes.
    pub fn timings(&self) -> Option<&Timings> {
        self.timers.timings()
    }
}
