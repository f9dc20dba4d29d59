//! The citizen profile record.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::error::ProfileError;

use super::field::{CasteCategory, FieldValue, Gender, MaritalStatus, ProfileField};

/// Which component wrote a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    /// Populated from a citizen-supplied document. Trusted.
    Intake,
    /// Answered in the conversation.
    Conversation,
    /// Overwritten by the citizen after explicit confirmation.
    Confirmed,
}

impl fmt::Display for FieldSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Intake => "intake",
            Self::Conversation => "conversation",
            Self::Confirmed => "confirmed",
        };
        write!(f, "{s}")
    }
}

/// Everything known about the citizen during one session.
///
/// Document fragments deserialize straight into this type; the camelCase
/// aliases accept the field names used by extraction services. A category
/// value that is not one of the known options is dropped rather than failing
/// the whole fragment, so the conversation asks for it instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub gender: Option<Gender>,
    #[serde(
        default,
        alias = "income",
        alias = "monthlyIncome",
        skip_serializing_if = "Option::is_none"
    )]
    pub monthly_income: Option<Decimal>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub caste: Option<CasteCategory>,
    /// State or region of residence.
    #[serde(default, alias = "state", skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(
        default,
        alias = "maritalStatus",
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub marital_status: Option<MaritalStatus>,
    #[serde(default, alias = "familySize", skip_serializing_if = "Option::is_none")]
    pub family_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Profile {
    /// Read a field as a typed value. Blank text and a zero family size
    /// count as absent.
    pub fn get(&self, field: ProfileField) -> Option<FieldValue> {
        let value = match field {
            ProfileField::Name => self.name.clone().map(FieldValue::Text),
            ProfileField::Age => self.age.map(FieldValue::Count),
            ProfileField::Gender => self.gender.map(FieldValue::Gender),
            ProfileField::MonthlyIncome => self.monthly_income.map(FieldValue::Amount),
            ProfileField::Caste => self.caste.map(FieldValue::Caste),
            ProfileField::Region => self.region.clone().map(FieldValue::Text),
            ProfileField::MaritalStatus => self.marital_status.map(FieldValue::MaritalStatus),
            ProfileField::FamilySize => self.family_size.map(FieldValue::Count),
            ProfileField::Address => self.address.clone().map(FieldValue::Text),
        }?;
        is_usable(field, &value).then_some(value)
    }

    pub fn is_set(&self, field: ProfileField) -> bool {
        self.get(field).is_some()
    }

    pub fn is_empty(&self) -> bool {
        ProfileField::ALL.iter().all(|f| !self.is_set(*f))
    }

    pub fn populated_fields(&self) -> Vec<ProfileField> {
        ProfileField::ALL
            .into_iter()
            .filter(|f| self.is_set(*f))
            .collect()
    }

    /// Write a typed value into its slot. Ownership is checked by `Provenance`.
    pub(crate) fn store(
        &mut self,
        field: ProfileField,
        value: FieldValue,
    ) -> Result<(), ProfileError> {
        match (field, value) {
            (ProfileField::Name, FieldValue::Text(v)) => self.name = Some(v),
            (ProfileField::Region, FieldValue::Text(v)) => self.region = Some(v),
            (ProfileField::Address, FieldValue::Text(v)) => self.address = Some(v),
            (ProfileField::Age, FieldValue::Count(v)) => self.age = Some(v),
            (ProfileField::FamilySize, FieldValue::Count(v)) => self.family_size = Some(v),
            (ProfileField::MonthlyIncome, FieldValue::Amount(v)) => self.monthly_income = Some(v),
            (ProfileField::Gender, FieldValue::Gender(v)) => self.gender = Some(v),
            (ProfileField::MaritalStatus, FieldValue::MaritalStatus(v)) => {
                self.marital_status = Some(v)
            }
            (ProfileField::Caste, FieldValue::Caste(v)) => self.caste = Some(v),
            (field, _) => return Err(ProfileError::KindMismatch { field }),
        }
        Ok(())
    }
}

/// Deserialize a category, mapping anything unrecognized to `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<String, Error = String>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(text)) => match T::try_from(text) {
            Ok(value) => Some(value),
            Err(reason) => {
                debug!(%reason, "Dropping unrecognized profile value");
                None
            }
        },
        Some(other) => {
            debug!(value = %other, "Dropping non-text profile value");
            None
        }
    })
}

fn is_usable(field: ProfileField, value: &FieldValue) -> bool {
    match value {
        FieldValue::Text(text) => !text.trim().is_empty(),
        FieldValue::Count(0) => field != ProfileField::FamilySize,
        FieldValue::Amount(amount) => !amount.is_sign_negative(),
        _ => true,
    }
}
