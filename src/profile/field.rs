//! Profile field keys, typed values and enumerated answer normalization.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Every attribute the engine can know about a citizen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    Name,
    Age,
    Gender,
    MonthlyIncome,
    Caste,
    Region,
    MaritalStatus,
    FamilySize,
    Address,
}

impl ProfileField {
    pub const ALL: [ProfileField; 9] = [
        Self::Name,
        Self::Age,
        Self::Gender,
        Self::MonthlyIncome,
        Self::Caste,
        Self::Region,
        Self::MaritalStatus,
        Self::FamilySize,
        Self::Address,
    ];

    /// Stable key used in scripts, catalogs and events.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Age => "age",
            Self::Gender => "gender",
            Self::MonthlyIncome => "monthly_income",
            Self::Caste => "caste",
            Self::Region => "region",
            Self::MaritalStatus => "marital_status",
            Self::FamilySize => "family_size",
            Self::Address => "address",
        }
    }

    /// Whether the field holds a number that thresholds can compare against.
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Age | Self::MonthlyIncome | Self::FamilySize)
    }

    /// Fixed option list for enumerated fields.
    pub fn options(self) -> Option<&'static [&'static str]> {
        match self {
            Self::Gender => Some(Gender::OPTIONS),
            Self::MaritalStatus => Some(MaritalStatus::OPTIONS),
            Self::Caste => Some(CasteCategory::OPTIONS),
            _ => None,
        }
    }
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

fn normalize(input: &str) -> String {
    input
        .trim()
        .trim_end_matches('.')
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Gender {
    Female,
    Male,
    Other,
}

impl Gender {
    pub const OPTIONS: &'static [&'static str] = &["Female", "Male", "Other"];

    /// Parse a free-form answer, accepting common synonyms.
    pub fn from_answer(input: &str) -> Option<Self> {
        match normalize(input).as_str() {
            "female" | "f" | "woman" | "women" | "girl" | "lady" | "mahila" => Some(Self::Female),
            "male" | "m" | "man" | "men" | "boy" | "purush" => Some(Self::Male),
            "other" | "o" | "transgender" | "third gender" | "non-binary" | "nonbinary" => {
                Some(Self::Other)
            }
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Female => "Female",
            Self::Male => "Male",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MaritalStatus {
    Single,
    Married,
    Widow,
    Divorced,
    Separated,
}

impl MaritalStatus {
    pub const OPTIONS: &'static [&'static str] =
        &["Single", "Married", "Widow", "Divorced", "Separated"];

    pub fn from_answer(input: &str) -> Option<Self> {
        match normalize(input).as_str() {
            "single" | "unmarried" | "never married" => Some(Self::Single),
            "married" => Some(Self::Married),
            "widow" | "widowed" | "widower" | "vidhwa" => Some(Self::Widow),
            "divorced" | "divorcee" => Some(Self::Divorced),
            "separated" => Some(Self::Separated),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Single => "Single",
            Self::Married => "Married",
            Self::Widow => "Widow",
            Self::Divorced => "Divorced",
            Self::Separated => "Separated",
        }
    }
}

/// Social category used by reservation-based programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CasteCategory {
    General,
    Obc,
    Sc,
    St,
    Ews,
}

impl CasteCategory {
    pub const OPTIONS: &'static [&'static str] = &["General", "OBC", "SC", "ST", "EWS"];

    pub fn from_answer(input: &str) -> Option<Self> {
        match normalize(input).as_str() {
            "general" | "gen" | "open" | "unreserved" => Some(Self::General),
            "obc" | "other backward class" | "other backward classes" => Some(Self::Obc),
            "sc" | "scheduled caste" | "scheduled castes" => Some(Self::Sc),
            "st" | "scheduled tribe" | "scheduled tribes" => Some(Self::St),
            "ews" | "economically weaker section" => Some(Self::Ews),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::General => "General",
            Self::Obc => "OBC",
            Self::Sc => "SC",
            Self::St => "ST",
            Self::Ews => "EWS",
        }
    }
}

macro_rules! string_enum_conversions {
    ($($ty:ident),*) => {$(
        impl TryFrom<String> for $ty {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::from_answer(&value).ok_or_else(|| {
                    format!("unrecognized {} {:?}", stringify!($ty), value)
                })
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.label().to_string()
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    )*};
}

string_enum_conversions!(Gender, MaritalStatus, CasteCategory);

/// A typed value read from or written to a profile field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Count(u32),
    Amount(Decimal),
    Gender(Gender),
    MaritalStatus(MaritalStatus),
    Caste(CasteCategory),
}

impl FieldValue {
    /// Numeric view used by threshold rules.
    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Self::Count(n) => Some(Decimal::from(*n)),
            Self::Amount(amount) => Some(*amount),
            _ => None,
        }
    }

    /// Categorical equality against an option written in a catalog.
    ///
    /// Enumerated values go through the same synonym table as answers, free
    /// text compares case-insensitively.
    pub fn matches_option(&self, expected: &str) -> bool {
        match self {
            Self::Gender(g) => Gender::from_answer(expected) == Some(*g),
            Self::MaritalStatus(m) => MaritalStatus::from_answer(expected) == Some(*m),
            Self::Caste(c) => CasteCategory::from_answer(expected) == Some(*c),
            Self::Text(text) => normalize(text) == normalize(expected),
            Self::Count(_) | Self::Amount(_) => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Count(n) => write!(f, "{n}"),
            Self::Amount(amount) => write!(f, "{}", amount.normalize()),
            Self::Gender(g) => write!(f, "{g}"),
            Self::MaritalStatus(m) => write!(f, "{m}"),
            Self::Caste(c) => write!(f, "{c}"),
        }
    }
}
