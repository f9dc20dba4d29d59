//! Document intake collaborator seam.
//!
//! OCR and document understanding live outside the engine. An extractor
//! turns a citizen-supplied document into a profile fragment; the session
//! then merges that fragment as trusted intake data.

use async_trait::async_trait;
use tracing::debug;

use crate::error::IntakeError;
use crate::profile::Profile;

/// A document uploaded by the citizen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub file_name: String,
    /// MIME type, e.g. `image/jpeg` or `application/pdf`.
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }
}

/// Produces a profile fragment from a document.
#[async_trait]
pub trait ProfileExtractor: Send + Sync {
    /// Extractor name for logs and errors.
    fn name(&self) -> &str;

    fn supports(&self, media_type: &str) -> bool;

    async fn extract(&self, document: &Document) -> Result<Profile, IntakeError>;
}

/// Reads a profile fragment that is already structured as JSON.
///
/// Accepts both snake_case and camelCase keys (`monthly_income`,
/// `maritalStatus`, `income`, `state`).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonProfileExtractor;

#[async_trait]
impl ProfileExtractor for JsonProfileExtractor {
    fn name(&self) -> &str {
        "json"
    }

    fn supports(&self, media_type: &str) -> bool {
        let essence = media_type.split(';').next().unwrap_or_default().trim();
        essence.eq_ignore_ascii_case("application/json")
    }

    async fn extract(&self, document: &Document) -> Result<Profile, IntakeError> {
        let profile: Profile =
            serde_json::from_slice(&document.bytes).map_err(|e| IntakeError::ExtractionFailed {
                file_name: document.file_name.clone(),
                reason: e.to_string(),
            })?;
        debug!(
            file = %document.file_name,
            fields = ?profile.populated_fields(),
            "Extracted profile fragment"
        );
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{CasteCategory, Gender, MaritalStatus};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn extracts_camel_case_fragment() {
        let doc = Document::new(
            "aadhaar.json",
            "application/json",
            br#"{"name": "Sita Devi", "age": 45, "gender": "Female", "income": 240000,
                "caste": "OBC", "state": "Uttar Pradesh", "maritalStatus": "Widow"}"#
                .to_vec(),
        );
        let profile = JsonProfileExtractor.extract(&doc).await.unwrap();
        assert_eq!(profile.name.as_deref(), Some("Sita Devi"));
        assert_eq!(profile.gender, Some(Gender::Female));
        assert_eq!(profile.caste, Some(CasteCategory::Obc));
        assert_eq!(profile.marital_status, Some(MaritalStatus::Widow));
        assert_eq!(profile.monthly_income, Some(dec!(240000)));
        assert_eq!(profile.region.as_deref(), Some("Uttar Pradesh"));
    }

    #[tokio::test]
    async fn malformed_json_names_the_file() {
        let doc = Document::new("scan.json", "application/json", b"{not json".to_vec());
        match JsonProfileExtractor.extract(&doc).await {
            Err(IntakeError::ExtractionFailed { file_name, .. }) => {
                assert_eq!(file_name, "scan.json")
            }
            other => panic!("Expected ExtractionFailed, got {:?}", other),
        }
    }

    #[test]
    fn supports_json_only() {
        assert!(JsonProfileExtractor.supports("application/json; charset=utf-8"));
        assert!(!JsonProfileExtractor.supports("image/jpeg"));
    }
}
