//! Scripted conversation controller.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConversationError, ValidationError};
use crate::profile::{Profile, ProfileField, Provenance};

use super::script::{ConversationField, Script};
use super::validate::validate;

/// The next question to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub field: ProfileField,
    pub text: String,
    pub order: u32,
}

impl From<&ConversationField> for Prompt {
    fn from(entry: &ConversationField) -> Self {
        Self {
            field: entry.field,
            text: entry.prompt.clone(),
            order: entry.order,
        }
    }
}

/// Result of submitting one answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub accepted: bool,
    pub field: ProfileField,
    /// Profile after the answer; unchanged when rejected.
    pub profile: Profile,
    pub error: Option<ValidationError>,
    /// Set on the one answer that exhausted the script.
    pub completed: bool,
}

/// Asks for missing profile fields one at a time.
///
/// Fields already present in the seed profile are never asked, and an answer
/// never replaces a value the seed's provenance attributes to intake. Once every
/// field in the script is known the controller signals completion exactly
/// once and refuses further answers.
#[derive(Debug, Clone)]
pub struct ConversationController {
    script: Arc<Script>,
    profile: Profile,
    provenance: Provenance,
    completion_signalled: bool,
}

impl ConversationController {
    pub fn new(script: Arc<Script>, seed: Profile) -> Self {
        Self::with_provenance(script, seed, Provenance::default())
    }

    /// Seed with a profile whose field ownership is already known.
    pub fn with_provenance(script: Arc<Script>, seed: Profile, provenance: Provenance) -> Self {
        let skipped: Vec<ProfileField> = script
            .fields()
            .iter()
            .map(|entry| entry.field)
            .filter(|field| seed.is_set(*field))
            .collect();
        debug!(skipped = ?skipped, "Conversation seeded; known fields will not be asked");
        Self {
            script,
            profile: seed,
            provenance,
            completion_signalled: false,
        }
    }

    /// Next unanswered field, or `None` when the script is exhausted.
    pub fn next_prompt(&self) -> Option<Prompt> {
        self.pending_field().map(Prompt::from)
    }

    pub fn is_exhausted(&self) -> bool {
        self.pending_field().is_none()
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn into_profile(self) -> Profile {
        self.profile
    }

    /// Validate `raw` as the answer to the current prompt.
    pub fn submit_answer(&mut self, raw: &str) -> Result<Answer, ConversationError> {
        let Some(entry) = self.pending_field().cloned() else {
            warn!("Answer submitted after the conversation script was exhausted");
            return Err(ConversationError::Sequence {
                reason: "conversation script is exhausted".to_string(),
            });
        };
        self.apply(&entry, raw, false)
    }

    /// Replace a field the script owns after the citizen confirmed the
    /// change, even one that came from the document.
    pub fn correct(&mut self, field: ProfileField, raw: &str) -> Result<Answer, ConversationError> {
        let entry = self
            .script
            .get(field)
            .cloned()
            .ok_or(ConversationError::NotInScript { field })?;
        self.apply(&entry, raw, true)
    }

    /// True exactly once, the first time this is called on an exhausted script.
    pub fn take_completion(&mut self) -> bool {
        if self.completion_signalled || !self.is_exhausted() {
            return false;
        }
        self.completion_signalled = true;
        true
    }

    fn apply(
        &mut self,
        entry: &ConversationField,
        raw: &str,
        confirmed: bool,
    ) -> Result<Answer, ConversationError> {
        let field = entry.field;
        let value = match validate(entry.validator(), field, raw) {
            Ok(value) => value,
            Err(error) => {
                debug!(%field, %error, "Answer rejected");
                return Ok(Answer {
                    accepted: false,
                    field,
                    profile: self.profile.clone(),
                    error: Some(error),
                    completed: false,
                });
            }
        };

        if confirmed {
            self.provenance
                .confirm_correction(&mut self.profile, field, value)?;
        } else {
            self.provenance
                .record_answer(&mut self.profile, field, value)?;
        }
        debug!(%field, confirmed, "Answer accepted");

        let completed = self.take_completion();
        Ok(Answer {
            accepted: true,
            field,
            profile: self.profile.clone(),
            error: None,
            completed,
        })
    }

    fn pending_field(&self) -> Option<&ConversationField> {
        self.script
            .fields()
            .iter()
            .find(|entry| !self.profile.is_set(entry.field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{FieldSource, Gender, MaritalStatus};
    use crate::error::ProfileError;
    use rust_decimal_macros::dec;

    fn script() -> Arc<Script> {
        Arc::new(
            Script::new(vec![
                ConversationField::new(ProfileField::MonthlyIncome, "income_question", 1),
                ConversationField::new(ProfileField::FamilySize, "family_question", 2),
                ConversationField::new(ProfileField::Gender, "gender_question", 3),
            ])
            .unwrap(),
        )
    }

    fn seeded_with_income() -> ConversationController {
        let mut seed = Profile::default();
        let mut provenance = Provenance::default();
        provenance.merge_intake(
            &mut seed,
            &Profile {
                monthly_income: Some(dec!(0)),
                ..Default::default()
            },
        );
        ConversationController::with_provenance(script(), seed, provenance)
    }

    #[test]
    fn asks_fields_in_script_order() {
        let mut conv = ConversationController::new(script(), Profile::default());
        assert_eq!(conv.next_prompt().unwrap().text, "income_question");
        let answer = conv.submit_answer("12000").unwrap();
        assert!(answer.accepted);
        assert_eq!(answer.profile.monthly_income, Some(dec!(12000)));
        assert_eq!(conv.next_prompt().unwrap().field, ProfileField::FamilySize);
    }

    #[test]
    fn skips_fields_known_from_seed() {
        let conv = seeded_with_income();
        let prompt = conv.next_prompt().unwrap();
        assert_eq!(prompt.field, ProfileField::FamilySize);
    }

    #[test]
    fn never_asks_income_when_seeded_across_whole_run() {
        let mut conv = seeded_with_income();
        let mut asked = Vec::new();
        let answers = ["4", "female"];
        for raw in answers {
            asked.push(conv.next_prompt().unwrap().field);
            assert!(conv.submit_answer(raw).unwrap().accepted);
        }
        assert!(conv.next_prompt().is_none());
        assert!(!asked.contains(&ProfileField::MonthlyIncome));
    }

    #[test]
    fn invalid_numeric_leaves_profile_unchanged_and_reprompts() {
        let mut conv = ConversationController::new(script(), Profile::default());
        let before = conv.profile().clone();
        let answer = conv.submit_answer("abc").unwrap();
        assert!(!answer.accepted);
        assert!(matches!(answer.error, Some(ValidationError::NotNumeric { .. })));
        assert_eq!(answer.profile, before);
        assert_eq!(conv.profile(), &before);
        assert_eq!(conv.next_prompt().unwrap().field, ProfileField::MonthlyIncome);
    }

    #[test]
    fn completion_signalled_once_then_sequence_error() {
        let mut conv = seeded_with_income();
        assert!(!conv.submit_answer("3").unwrap().completed);
        let last = conv.submit_answer("Woman").unwrap();
        assert!(last.completed);
        assert_eq!(last.profile.gender, Some(Gender::Female));
        assert!(!conv.take_completion());

        let err = conv.submit_answer("anything").unwrap_err();
        assert!(matches!(err, ConversationError::Sequence { .. }));
    }

    #[test]
    fn fully_seeded_profile_completes_without_prompts() {
        let seed = Profile {
            monthly_income: Some(dec!(100)),
            family_size: Some(2),
            gender: Some(Gender::Male),
            ..Default::default()
        };
        let mut conv = ConversationController::new(script(), seed);
        assert!(conv.next_prompt().is_none());
        assert!(conv.take_completion());
        assert!(!conv.take_completion());
    }

    #[test]
    fn correction_overrides_intake_value() {
        let mut conv = seeded_with_income();
        let answer = conv.correct(ProfileField::MonthlyIncome, "₹8,000").unwrap();
        assert!(answer.accepted);
        assert_eq!(conv.profile().monthly_income, Some(dec!(8000)));
        assert_eq!(
            conv.provenance().source(ProfileField::MonthlyIncome),
            Some(FieldSource::Confirmed)
        );

        let err = conv
            .correct(ProfileField::MaritalStatus, MaritalStatus::Widow.label())
            .unwrap_err();
        assert_eq!(
            err,
            ConversationError::NotInScript {
                field: ProfileField::MaritalStatus
            }
        );
    }

    #[test]
    fn answers_are_attributed_to_the_conversation() {
        let mut conv = seeded_with_income();
        assert!(conv.submit_answer("4").unwrap().accepted);
        assert_eq!(
            conv.provenance().source(ProfileField::FamilySize),
            Some(FieldSource::Conversation)
        );
        assert_eq!(
            conv.provenance().source(ProfileField::MonthlyIncome),
            Some(FieldSource::Intake)
        );
    }

    #[test]
    fn owned_field_cannot_be_answered_without_correction() {
        let mut conv = seeded_with_income();
        let income = conv.script.get(ProfileField::MonthlyIncome).cloned().unwrap();
        let err = conv.apply(&income, "900", false).unwrap_err();
        assert!(matches!(
            err,
            ConversationError::Profile(ProfileError::Owned { .. })
        ));
        assert_eq!(conv.profile().monthly_income, Some(dec!(0)));
    }
}
