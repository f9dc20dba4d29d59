//! Pure workflow transition function.
//!
//! `WorkflowMachine::transition` never mutates its input: it validates the
//! event against the current stage and builds the complete next state, so no
//! half-applied state is ever observable.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::catalog::Catalog;
use crate::eligibility::MatchResult;
use crate::error::WorkflowError;
use crate::profile::{Profile, ProfileField, Provenance};

use super::state::{Stage, WorkflowState};

/// Inputs the workflow reacts to.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    /// Home → Intake.
    BeginIntake,
    /// Intake → Conversation with the fields extracted from a document.
    SubmitProfile(Profile),
    /// Conversation → Conversation after an accepted answer.
    UpdateProfile {
        profile: Profile,
        provenance: Provenance,
    },
    /// Conversation → Results once collection is complete.
    CompleteConversation {
        profile: Profile,
        matches: Vec<MatchResult>,
    },
    /// Results → FormReview.
    SelectProgram(String),
    /// Intake → Home, FormReview → Results.
    ///
    /// Refused in Conversation and Results: stepping back there would keep
    /// answers or matches derived from a profile the citizen is about to
    /// change. Use `Reset` to start over instead.
    Back,
    /// Any → Home, clearing everything.
    Reset,
}

impl WorkflowEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BeginIntake => "begin_intake",
            Self::SubmitProfile(_) => "submit_profile",
            Self::UpdateProfile { .. } => "update_profile",
            Self::CompleteConversation { .. } => "complete_conversation",
            Self::SelectProgram(_) => "select_program",
            Self::Back => "back",
            Self::Reset => "reset",
        }
    }
}

/// Validates events against the catalog the session runs with.
#[derive(Debug, Clone)]
pub struct WorkflowMachine {
    catalog: Arc<Catalog>,
    required: BTreeSet<ProfileField>,
}

impl WorkflowMachine {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let required = catalog.required_fields();
        Self { catalog, required }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Compute the state that `event` leads to from `state`.
    pub fn transition(
        &self,
        state: &WorkflowState,
        event: WorkflowEvent,
    ) -> Result<WorkflowState, WorkflowError> {
        let name = event.name();
        let from = state.stage;
        let invalid = || WorkflowError::InvalidTransition {
            stage: from,
            event: name,
        };
        let payload = |reason: String| WorkflowError::InvalidPayload {
            stage: from,
            event: name,
            reason,
        };

        let mut next = state.clone();
        match (from, event) {
            (_, WorkflowEvent::Reset) => return Ok(Self::reset(state)),

            (Stage::Home, WorkflowEvent::BeginIntake) => next.stage = Stage::Intake,

            (Stage::Intake, WorkflowEvent::SubmitProfile(fragment)) => {
                if fragment.is_empty() {
                    return Err(payload("profile fragment has no usable fields".into()));
                }
                next.provenance.merge_intake(&mut next.profile, &fragment);
                next.stage = Stage::Conversation;
            }

            (Stage::Conversation, WorkflowEvent::UpdateProfile { profile, provenance }) => {
                next.profile = profile;
                next.provenance = provenance;
            }

            (Stage::Conversation, WorkflowEvent::CompleteConversation { profile, matches }) => {
                let missing: Vec<ProfileField> = self
                    .required
                    .iter()
                    .copied()
                    .filter(|f| !profile.is_set(*f))
                    .collect();
                if !missing.is_empty() {
                    return Err(payload(format!("profile is missing {missing:?}")));
                }
                if let Some(stray) = matches.iter().find(|m| !m.matched) {
                    return Err(payload(format!(
                        "program {} is listed but not matched",
                        stray.program_id()
                    )));
                }
                next.profile = profile;
                next.matches = matches;
                next.stage = Stage::Results;
            }

            (Stage::Results, WorkflowEvent::SelectProgram(id)) => {
                let program = state
                    .matches
                    .iter()
                    .find(|m| m.program_id() == id)
                    .map(|m| m.program.clone())
                    .ok_or(WorkflowError::UnknownProgram { id })?;
                next.selected = Some(program);
                next.stage = Stage::FormReview;
            }

            (Stage::Intake, WorkflowEvent::Back) => next.stage = Stage::Home,

            (Stage::FormReview, WorkflowEvent::Back) => {
                next.selected = None;
                next.stage = Stage::Results;
            }

            _ => return Err(invalid()),
        }

        debug_assert!(from == next.stage || from.can_transition_to(next.stage));
        if from != next.stage {
            next.record(from, name);
        }
        debug!(%from, to = %next.stage, event = name, "Workflow transition");
        Ok(next)
    }

    /// The Home state that follows `state`: citizen data, matches and
    /// selection cleared together, generation advanced.
    pub fn reset(state: &WorkflowState) -> WorkflowState {
        let mut next = WorkflowState {
            generation: state.generation + 1,
            history: state.history.clone(),
            ..WorkflowState::default()
        };
        next.record(state.stage, "reset");
        next
    }
}
