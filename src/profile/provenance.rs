//! Which component wrote each profile field.
//!
//! The record travels beside the `Profile` it describes. Intake fills empty
//! slots, the conversation answers what is still open, and only a confirmed
//! correction replaces a value that came from a document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProfileError;

use super::field::{FieldValue, ProfileField};
use super::model::{FieldSource, Profile};

/// Field ownership for one profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    sources: BTreeMap<ProfileField, FieldSource>,
}

impl Provenance {
    pub fn source(&self, field: ProfileField) -> Option<FieldSource> {
        self.sources.get(&field).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Copy the usable fields of a document fragment into the empty slots of
    /// `profile`. Never overwrites a field that is already set. Returns the
    /// fields that were populated.
    pub(crate) fn merge_intake(
        &mut self,
        profile: &mut Profile,
        fragment: &Profile,
    ) -> Vec<ProfileField> {
        let mut merged = Vec::new();
        for field in ProfileField::ALL {
            if profile.is_set(field) {
                continue;
            }
            let Some(value) = fragment.get(field) else {
                continue;
            };
            if profile.store(field, value).is_ok() {
                self.sources.insert(field, FieldSource::Intake);
                merged.push(field);
            }
        }
        debug!(fields = ?merged, "Merged intake fragment into profile");
        merged
    }

    /// Record a conversation answer. Refuses to replace an intake value.
    pub(crate) fn record_answer(
        &mut self,
        profile: &mut Profile,
        field: ProfileField,
        value: FieldValue,
    ) -> Result<(), ProfileError> {
        if self.source(field) == Some(FieldSource::Intake) && profile.is_set(field) {
            return Err(ProfileError::Owned {
                field,
                owner: FieldSource::Intake,
            });
        }
        profile.store(field, value)?;
        self.sources.insert(field, FieldSource::Conversation);
        Ok(())
    }

    /// Overwrite a field after the citizen explicitly confirmed the change.
    pub(crate) fn confirm_correction(
        &mut self,
        profile: &mut Profile,
        field: ProfileField,
        value: FieldValue,
    ) -> Result<(), ProfileError> {
        profile.store(field, value)?;
        self.sources.insert(field, FieldSource::Confirmed);
        Ok(())
    }
}
