//! Answer parsing and validation per validator kind.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::profile::{CasteCategory, FieldValue, Gender, MaritalStatus, ProfileField};

use super::script::Validator;

// "₹2,40,000", "Rs. 5000/-", "-300", "1200.50 per month"
static AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:₹|rs\.?|inr|\$)?\s*(-)?\s*([0-9][0-9,_]*(?:\.[0-9]+)?)\s*(?:/-|rupees|rs\.?|inr)?(?:\s*(?:per|a|/)\s*month)?$",
    )
    .unwrap()
});

// "45", "45 years", "5 members", "-2"
static COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(-)?\s*([0-9]+)(?:\s*(?:years?|yrs?|members?|people|persons?))?$").unwrap()
});

/// Parse `raw` for `field`. Never touches the profile.
pub fn validate(
    validator: Validator,
    field: ProfileField,
    raw: &str,
) -> Result<FieldValue, ValidationError> {
    let input = raw.trim();
    if input.is_empty() {
        return Err(ValidationError::Empty);
    }

    match validator {
        Validator::Count { min } => {
            let caps = COUNT.captures(input).ok_or_else(|| not_numeric(input))?;
            if caps.get(1).is_some() {
                return Err(ValidationError::Negative {
                    input: input.to_string(),
                });
            }
            let value: u32 = caps[2].parse().map_err(|_| not_numeric(input))?;
            if value < min {
                return Err(ValidationError::BelowMinimum { min, value });
            }
            Ok(FieldValue::Count(value))
        }
        Validator::Amount => {
            let caps = AMOUNT.captures(input).ok_or_else(|| not_numeric(input))?;
            if caps.get(1).is_some() {
                return Err(ValidationError::Negative {
                    input: input.to_string(),
                });
            }
            let digits: String = caps[2].chars().filter(|c| !matches!(c, ',' | '_')).collect();
            let amount: Decimal = digits.parse().map_err(|_| not_numeric(input))?;
            Ok(FieldValue::Amount(amount))
        }
        Validator::Choice => choice(field, input),
        Validator::Text => Ok(FieldValue::Text(input.to_string())),
    }
}

fn choice(field: ProfileField, input: &str) -> Result<FieldValue, ValidationError> {
    let value = match field {
        ProfileField::Gender => Gender::from_answer(input).map(FieldValue::Gender),
        ProfileField::MaritalStatus => {
            MaritalStatus::from_answer(input).map(FieldValue::MaritalStatus)
        }
        ProfileField::Caste => CasteCategory::from_answer(input).map(FieldValue::Caste),
        _ => None,
    };
    value.ok_or_else(|| ValidationError::UnrecognizedOption {
        input: input.to_string(),
        expected: field.options().map(<[_]>::to_vec).unwrap_or_default(),
    })
}

fn not_numeric(input: &str) -> ValidationError {
    ValidationError::NotNumeric {
        input: input.to_string(),
    }
}
