//! Evaluation of a single criterion against a profile.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::catalog::{Criterion, Rule};
use crate::profile::{Profile, ProfileField};

/// Why a criterion did not hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmetReason {
    /// The profile does not know the field yet.
    Missing,
    /// The field is known and fails the rule.
    Failed,
}

/// A criterion that did not hold, kept for "almost eligible" feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmetCriterion {
    pub label: String,
    pub field: ProfileField,
    pub reason: UnmetReason,
}

/// Evaluate one criterion. `Ok(())` means it holds.
pub fn evaluate(criterion: &Criterion, profile: &Profile) -> Result<(), UnmetCriterion> {
    let field = criterion.field();
    let unmet = |reason| UnmetCriterion {
        label: criterion.label.clone(),
        field,
        reason,
    };

    let Some(value) = profile.get(field) else {
        return Err(unmet(UnmetReason::Missing));
    };

    let holds = match &criterion.rule {
        Rule::Threshold { op, value: threshold, .. } => value
            .as_number()
            .is_some_and(|actual| op.holds(actual, *threshold)),
        Rule::Equals { value: expected, .. } => value.matches_option(expected),
        Rule::OneOf { values, .. } => values.iter().any(|v| value.matches_option(v)),
        Rule::Present { .. } => true,
    };

    trace!(criterion = %criterion.label, %field, holds, "Evaluated criterion");

    if holds {
        Ok(())
    } else {
        Err(unmet(UnmetReason::Failed))
    }
}
