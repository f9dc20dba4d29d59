//! Conversation script: the ordered list of fields the controller asks for.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::ScriptError;
use crate::profile::ProfileField;

const BUILTIN_SCRIPT: &str = include_str!("../../data/script.json");

/// How an answer is parsed and checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validator {
    /// Whole number, at least `min`.
    Count {
        #[serde(default)]
        min: u32,
    },
    /// Non-negative money amount; tolerates currency markers and grouping.
    Amount,
    /// One of the field's enumerated options, synonyms accepted.
    Choice,
    /// Any non-empty trimmed text.
    Text,
}

impl Validator {
    /// The validator a field gets when the script does not name one.
    pub fn default_for(field: ProfileField) -> Self {
        match field {
            ProfileField::Age => Self::Count { min: 0 },
            ProfileField::FamilySize => Self::Count { min: 1 },
            ProfileField::MonthlyIncome => Self::Amount,
            ProfileField::Gender | ProfileField::MaritalStatus | ProfileField::Caste => {
                Self::Choice
            }
            ProfileField::Name | ProfileField::Region | ProfileField::Address => Self::Text,
        }
    }

    pub fn can_collect(self, field: ProfileField) -> bool {
        match self {
            Self::Count { .. } => matches!(field, ProfileField::Age | ProfileField::FamilySize),
            Self::Amount => field == ProfileField::MonthlyIncome,
            Self::Choice => field.options().is_some(),
            Self::Text => matches!(
                field,
                ProfileField::Name | ProfileField::Region | ProfileField::Address
            ),
        }
    }
}

impl fmt::Display for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count { min } => write!(f, "count(min={min})"),
            Self::Amount => write!(f, "amount"),
            Self::Choice => write!(f, "choice"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// One collectible datum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationField {
    pub field: ProfileField,
    /// Question text, or a string-resource key the presentation layer resolves.
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    validator: Option<Validator>,
    pub order: u32,
}

impl ConversationField {
    pub fn new(field: ProfileField, prompt: impl Into<String>, order: u32) -> Self {
        Self {
            field,
            prompt: prompt.into(),
            validator: None,
            order,
        }
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn validator(&self) -> Validator {
        self.validator
            .unwrap_or_else(|| Validator::default_for(self.field))
    }
}

/// Immutable, validated script sorted by `order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawScript")]
pub struct Script {
    fields: Vec<ConversationField>,
}

#[derive(Deserialize)]
struct RawScript {
    fields: Vec<ConversationField>,
}

impl TryFrom<RawScript> for Script {
    type Error = ScriptError;

    fn try_from(raw: RawScript) -> Result<Self, Self::Error> {
        Script::new(raw.fields)
    }
}

impl Script {
    pub fn new(mut fields: Vec<ConversationField>) -> Result<Self, ScriptError> {
        let mut seen = HashSet::new();
        for entry in &fields {
            if !seen.insert(entry.field) {
                return Err(ScriptError::DuplicateField { field: entry.field });
            }
            let validator = entry.validator();
            if !validator.can_collect(entry.field) {
                return Err(ScriptError::IncompatibleValidator {
                    field: entry.field,
                    validator: validator.to_string(),
                });
            }
        }
        fields.sort_by_key(|entry| entry.order);
        Ok(Self { fields })
    }

    /// The script bundled with the crate.
    pub fn builtin() -> Result<Self, ScriptError> {
        Self::from_json(BUILTIN_SCRIPT)
    }

    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        let raw: RawScript = serde_json::from_str(json)?;
        Self::new(raw.fields)
    }

    pub fn fields(&self) -> &[ConversationField] {
        &self.fields
    }

    pub fn get(&self, field: ProfileField) -> Option<&ConversationField> {
        self.fields.iter().find(|entry| entry.field == field)
    }

    /// Fail unless the script asks for every field the catalog's rules read,
    /// except those listed in `supplied_elsewhere`.
    pub fn ensure_covers(
        &self,
        catalog: &Catalog,
        supplied_elsewhere: &[ProfileField],
    ) -> Result<(), ScriptError> {
        match catalog
            .required_fields()
            .into_iter()
            .find(|f| self.get(*f).is_none() && !supplied_elsewhere.contains(f))
        {
            Some(field) => Err(ScriptError::UncoveredField { field }),
            None => Ok(()),
        }
    }
}
