//! Benefit program records and their eligibility criteria.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::profile::ProfileField;

/// Language used when a requested translation is missing.
pub const DEFAULT_LANGUAGE: &str = "en";

/// A government benefit scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: String,
    /// Display names keyed by language code.
    pub names: BTreeMap<String, String>,
    pub description: String,
    /// Evaluated in order; every one must hold for a match.
    pub criteria: Vec<Criterion>,
    pub benefits: String,
    /// Where the application form lives, if the program has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_ref: Option<String>,
}

impl Program {
    /// Name in the requested language, falling back to English.
    pub fn name(&self, language: &str) -> &str {
        self.names
            .get(language)
            .or_else(|| self.names.get(DEFAULT_LANGUAGE))
            .map(String::as_str)
            .unwrap_or(self.id.as_str())
    }
}

/// One labelled eligibility condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    /// Display label, e.g. "Age 60+".
    pub label: String,
    pub rule: Rule,
}

impl Criterion {
    pub fn field(&self) -> ProfileField {
        self.rule.field()
    }
}

/// The fixed rule set criteria are written in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    /// Numeric comparison against a threshold.
    Threshold {
        field: ProfileField,
        op: CompareOp,
        value: Decimal,
    },
    /// Categorical equality.
    Equals { field: ProfileField, value: String },
    /// Categorical membership.
    OneOf {
        field: ProfileField,
        values: Vec<String>,
    },
    /// The field only has to be known.
    Present { field: ProfileField },
}

impl Rule {
    pub fn field(&self) -> ProfileField {
        match self {
            Self::Threshold { field, .. }
            | Self::Equals { field, .. }
            | Self::OneOf { field, .. }
            | Self::Present { field } => *field,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Below,
    AtMost,
    Equal,
    AtLeast,
    Above,
}

impl CompareOp {
    pub fn holds(self, actual: Decimal, threshold: Decimal) -> bool {
        match self {
            Self::Below => actual < threshold,
            Self::AtMost => actual <= threshold,
            Self::Equal => actual == threshold,
            Self::AtLeast => actual >= threshold,
            Self::Above => actual > threshold,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Below => "<",
            Self::AtMost => "<=",
            Self::Equal => "==",
            Self::AtLeast => ">=",
            Self::Above => ">",
        };
        write!(f, "{s}")
    }
}
