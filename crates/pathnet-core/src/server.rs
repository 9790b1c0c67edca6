//! Server-wide read-only information established at startup

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Server build version reported in every response
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version of the REST surface implemented by the server
pub const REST_API_VERSION: &str = "2.0.0";

/// Maps a feature name (e.g. `NAME`, `PHONE`) to its attribute class
pub type FeatureClassifier = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Version and build details reported by a reachable engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeApiInfo {
    pub native_api_version: String,
    pub native_api_build_version: String,
    pub native_api_build_number: String,
    #[serde(with = "crate::meta::millis_format")]
    pub native_api_build_date: DateTime<Utc>,
    pub config_compatibility_version: String,
}

/// Attribute class for well-known engine features
pub fn default_attribute_class(feature: &str) -> Option<String> {
    let class = match feature {
        "NAME" => "NAME",
        "ADDRESS" => "ADDRESS",
        "PHONE" => "PHONE",
        "SSN" | "SSN_LAST4" | "DRLIC" | "PASSPORT" | "NATIONAL_ID" | "TAX_ID" | "ACCT_NUM"
        | "EMAIL" | "WEBSITE" | "LINKEDIN" | "OTHER_ID" => "IDENTIFIER",
        "DOB" | "DOD" | "GENDER" | "NATIONALITY" | "CITIZENSHIP" | "REGISTRATION_DATE"
        | "REGISTRATION_COUNTRY" => "ATTRIBUTE",
        "REL_ANCHOR" | "REL_POINTER" => "RELATIONSHIP",
        _ => return None,
    };
    Some(class.to_string())
}

/// Read-only state shared by every request
#[derive(Clone)]
pub struct ServerInfo {
    data_sources: BTreeSet<String>,
    native_api: Option<NativeApiInfo>,
    classifier: Arc<FeatureClassifier>,
}

impl ServerInfo {
    pub fn new<I, S>(data_sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            data_sources: data_sources.into_iter().map(Into::into).collect(),
            native_api: None,
            classifier: Arc::new(default_attribute_class),
        }
    }

    /// Attach the engine's version details
    pub fn with_native_api(mut self, info: NativeApiInfo) -> Self {
        self.native_api = Some(info);
        self
    }

    /// Replace the feature classifier
    pub fn with_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Layer feature-to-class overrides over the default classifier
    pub fn with_class_overrides(self, overrides: HashMap<String, String>) -> Self {
        if overrides.is_empty() {
            return self;
        }
        self.with_classifier(move |feature| {
            overrides
                .get(feature)
                .cloned()
                .or_else(|| default_attribute_class(feature))
        })
    }

    pub fn data_sources(&self) -> &BTreeSet<String> {
        &self.data_sources
    }

    pub fn has_data_source(&self, code: &str) -> bool {
        self.data_sources.contains(code)
    }

    pub fn native_api(&self) -> Option<&NativeApiInfo> {
        self.native_api.as_ref()
    }

    pub fn classifier(&self) -> &FeatureClassifier {
        self.classifier.as_ref()
    }
}

impl std::fmt::Debug for ServerInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerInfo")
            .field("data_sources", &self.data_sources)
            .field("native_api", &self.native_api)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_source_membership() {
        let info = ServerInfo::new(["CUSTOMERS", "WATCHLIST"]);
        assert!(info.has_data_source("CUSTOMERS"));
        assert!(!info.has_data_source("UNKNOWN_SOURCE"));
        assert!(info.native_api().is_none());
    }

    #[test]
    fn test_class_overrides_fall_back_to_defaults() {
        let mut overrides = HashMap::new();
        overrides.insert("LOYALTY_ID".to_string(), "IDENTIFIER".to_string());
        let info = ServerInfo::new(["CUSTOMERS"]).with_class_overrides(overrides);

        let classify = info.classifier();
        assert_eq!(classify("LOYALTY_ID").as_deref(), Some("IDENTIFIER"));
        assert_eq!(classify("NAME").as_deref(), Some("NAME"));
        assert_eq!(classify("SHOE_SIZE"), None);
    }
}
