//! Workflow stages and the authoritative session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Program;
use crate::eligibility::MatchResult;
use crate::profile::{Profile, Provenance};

/// The phases of the discovery workflow.
///
/// Progresses linearly: Home → Intake → Conversation → Results → FormReview.
/// Any stage can return Home through a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Home,
    Intake,
    Conversation,
    Results,
    FormReview,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Self::Home,
        Self::Intake,
        Self::Conversation,
        Self::Results,
        Self::FormReview,
    ];

    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: Stage) -> bool {
        use Stage::*;
        matches!(
            (self, target),
            // Forward
            (Home, Intake)
                | (Intake, Conversation)
                | (Conversation, Results)
                | (Results, FormReview)
                // Back
                | (FormReview, Results)
                // Reset
                | (_, Home)
        )
    }

    /// Get the next stage in the linear progression, if any.
    pub fn next(&self) -> Option<Stage> {
        use Stage::*;
        match self {
            Home => Some(Intake),
            Intake => Some(Conversation),
            Conversation => Some(Results),
            Results => Some(FormReview),
            FormReview => None,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Home => "home",
            Self::Intake => "intake",
            Self::Conversation => "conversation",
            Self::Results => "results",
            Self::FormReview => "form_review",
        };
        write!(f, "{s}")
    }
}

/// A stage change, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    pub from: Stage,
    pub to: Stage,
    pub event: String,
    pub timestamp: DateTime<Utc>,
}

/// Cap on the transition history kept per session.
pub const MAX_TRANSITIONS: usize = 64;

/// Everything the workflow owns for one session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkflowState {
    pub stage: Stage,
    pub profile: Profile,
    /// Which component wrote each profile field.
    pub provenance: Provenance,
    /// Matched programs in ranked order.
    pub matches: Vec<MatchResult>,
    pub selected: Option<Program>,
    /// Bumped on every reset; in-flight work tagged with an older value is stale.
    pub generation: u64,
    pub history: Vec<StageTransition>,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing about the citizen is held.
    pub fn is_pristine(&self) -> bool {
        self.stage == Stage::Home
            && self.profile.is_empty()
            && self.provenance.is_empty()
            && self.matches.is_empty()
            && self.selected.is_none()
    }

    pub(crate) fn record(&mut self, from: Stage, event: &str) {
        self.history.push(StageTransition {
            from,
            to: self.stage,
            event: event.to_string(),
            timestamp: Utc::now(),
        });
        if self.history.len() > MAX_TRANSITIONS {
            let drain_count = self.history.len() - MAX_TRANSITIONS;
            self.history.drain(..drain_count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        use Stage::*;
        let transitions = [
            (Home, Intake),
            (Intake, Conversation),
            (Conversation, Results),
            (Results, FormReview),
            (FormReview, Results),
            (Intake, Home),
            (FormReview, Home),
        ];
        for (from, to) in transitions {
            assert!(from.can_transition_to(to), "{from} should transition to {to}");
        }
    }

    #[test]
    fn invalid_transitions() {
        use Stage::*;
        // Skip stages
        assert!(!Home.can_transition_to(Conversation));
        assert!(!Intake.can_transition_to(FormReview));
        // Backwards past a stage with derived data
        assert!(!Results.can_transition_to(Conversation));
        assert!(!Conversation.can_transition_to(Intake));
    }

    #[test]
    fn next_walks_all_stages() {
        let mut current = Stage::Home;
        let mut walked = vec![current];
        while let Some(next) = current.next() {
            walked.push(next);
            current = next;
        }
        assert_eq!(walked, Stage::ALL);
    }

    #[test]
    fn display_matches_serde() {
        for stage in Stage::ALL {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(format!("\"{stage}\""), json);
        }
    }

    #[test]
    fn history_is_capped() {
        let mut state = WorkflowState::new();
        for _ in 0..(MAX_TRANSITIONS + 10) {
            state.record(Stage::Home, "reset");
        }
        assert_eq!(state.history.len(), MAX_TRANSITIONS);
    }

    #[test]
    fn new_state_is_pristine() {
        let state = WorkflowState::new();
        assert!(state.is_pristine());
        assert_eq!(state.generation, 0);
    }
}
