/// Identity configuration
///
/// An identity is one gated group, backed by a directory under the content
/// root. This module loads those directories ([`ConfigStore`]), caches the
/// result ([`IdentityResolver`]) and lists every valid identity
/// ([`IdentityCatalog`]).

pub mod catalog;
pub mod resolver;
pub mod store;

pub use catalog::IdentityCatalog;
pub use resolver::IdentityResolver;
pub use store::ConfigStore;

use crate::locale::LocaleSet;
use serde::Serialize;
use std::collections::BTreeMap;

/// Normalized, immutable configuration of one identity
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityConfig {
    pub identity: String,
    pub group_name: String,
    /// Locale -> group name, for each locale defining `verify.groupName`
    pub group_names: BTreeMap<String, String>,
    pub title: String,
    pub description: String,
    pub warning_text: String,
    pub unable_to_verify_message: String,
    pub qr_code_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon_url: Option<String>,
    pub locales: LocaleSet,
}

impl IdentityConfig {
    /// Locale codes this identity ships, sorted
    pub fn locale_codes(&self) -> Vec<String> {
        self.locales.keys().cloned().collect()
    }

    pub fn summary(&self) -> IdentitySummary {
        IdentitySummary {
            identity: self.identity.clone(),
            group_name: self.group_name.clone(),
            group_names: Some(self.group_names.clone()),
            favicon_url: self.favicon_url.clone(),
        }
    }
}

/// Listing entry for the identity catalog
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySummary {
    pub identity: String,
    pub group_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_names: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon_url: Option<String>,
}

impl IdentitySummary {
    /// Minimal entry used when an identity's config fails to load
    pub fn fallback(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            group_name: identity.to_uppercase(),
            group_names: None,
            favicon_url: None,
        }
    }
}

/// Files that make an identity directory valid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityFiles {
    pub qrcode: String,
    pub favicon: Option<String>,
}

/// Identity keys are case-insensitive
pub fn normalize_identity(identity: &str) -> String {
    identity.to_lowercase()
}

/// Public URL of a file inside an identity directory
pub fn asset_url(identity: &str, file_name: &str) -> String {
    format!("/api/identity/{}/assets/{}", identity, file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_json_omits_absent_fields() {
        let json = serde_json::to_value(IdentitySummary::fallback("chess")).unwrap();
        assert_eq!(json["identity"], "chess");
        assert_eq!(json["groupName"], "CHESS");
        assert!(json.get("groupNames").is_none());
        assert!(json.get("faviconUrl").is_none());
    }

    #[test]
    fn test_asset_url_pattern() {
        assert_eq!(
            asset_url("chess", "qrcode.png"),
            "/api/identity/chess/assets/qrcode.png"
        );
        assert_eq!(normalize_identity("Chess"), "chess");
    }
}
