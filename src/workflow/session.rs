//! One citizen's session: the serialized owner of a `WorkflowState`.
//!
//! Every inbound call takes the session lock without waiting. A call that
//! finds the lock held, or finds extraction or matching still in flight, is
//! rejected with `ConcurrentTransition` instead of being queued. Reset is the
//! exception: it waits for the lock and always wins, bumping the generation
//! so that whatever was in flight is discarded when it completes.
//!
//! Extraction and matching continue on their own task once started. A caller
//! that stops waiting does not leave the session marked busy: the task still
//! commits its result, or discards it after a reset.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::conversation::{Answer, ConversationController, Prompt, Script};
use crate::eligibility::{EligibilityMatcher, MatchResult};
use crate::error::{ConversationError, Error, IntakeError, ScriptError, ValidationError, WorkflowError};
use crate::forms::FormDraft;
use crate::intake::{Document, ProfileExtractor};
use crate::profile::{Profile, ProfileField};

use super::machine::{WorkflowEvent, WorkflowMachine};
use super::state::{Stage, WorkflowState};

/// Outbound notifications for the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    StageChanged { state: WorkflowState },
    PromptReady { prompt: Prompt },
    MatchesReady { matches: Vec<MatchResult> },
}

/// What an inbound call led to.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// The conversation wants this field next.
    Prompt(Prompt),
    /// The answer failed validation; the same prompt stands.
    Rejected {
        prompt: Prompt,
        error: ValidationError,
    },
    /// Matching finished and the session moved to Results.
    Matched(Vec<MatchResult>),
    /// The result belonged to a session that was reset meanwhile.
    Discarded,
}

/// Computes matches for a completed profile. May be remote or slow.
#[async_trait]
pub trait MatchingService: Send + Sync {
    async fn match_programs(&self, profile: &Profile, catalog: &Catalog) -> Vec<MatchResult>;
}

/// Runs the in-process matcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalMatching {
    matcher: EligibilityMatcher,
}

impl LocalMatching {
    pub fn new(matcher: EligibilityMatcher) -> Self {
        Self { matcher }
    }
}

#[async_trait]
impl MatchingService for LocalMatching {
    async fn match_programs(&self, profile: &Profile, catalog: &Catalog) -> Vec<MatchResult> {
        self.matcher.match_programs(profile, catalog)
    }
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    generation: u64,
    operation: &'static str,
}

struct SessionInner {
    state: WorkflowState,
    conversation: Option<ConversationController>,
    in_flight: Option<InFlight>,
}

/// Work left to do after the lock is released.
enum Step {
    Done(Progress),
    Match { generation: u64, profile: Profile },
}

/// Handle to one session. Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

struct Shared {
    id: Uuid,
    machine: WorkflowMachine,
    script: Arc<Script>,
    matching: Arc<dyn MatchingService>,
    inner: Mutex<SessionInner>,
    tx: broadcast::Sender<SessionEvent>,
}

impl Session {
    /// Fails when the script cannot collect a field the catalog's rules read.
    pub fn new(
        catalog: Arc<Catalog>,
        script: Arc<Script>,
        matching: Arc<dyn MatchingService>,
        event_capacity: usize,
    ) -> Result<Self, ScriptError> {
        script.ensure_covers(&catalog, &[])?;
        let (tx, _) = broadcast::channel(event_capacity.max(1));
        let id = Uuid::new_v4();
        info!(session_id = %id, programs = catalog.len(), "Session created");
        Ok(Self {
            shared: Arc::new(Shared {
                id,
                machine: WorkflowMachine::new(catalog),
                script,
                matching,
                inner: Mutex::new(SessionInner {
                    state: WorkflowState::new(),
                    conversation: None,
                    in_flight: None,
                }),
                tx,
            }),
        })
    }

    /// Build a session with the catalog, script and ranking from `config`.
    pub fn from_config(config: &EngineConfig) -> Result<Self, Error> {
        let catalog = Arc::new(config.load_catalog()?);
        let script = Arc::new(config.load_script()?);
        let matching = Arc::new(LocalMatching::new(EligibilityMatcher::new(config.ranking)));
        Ok(Self::new(catalog, script, matching, config.event_capacity)?)
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        self.shared.machine.catalog()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.tx.subscribe()
    }

    /// Owned copy of the current state.
    pub async fn snapshot(&self) -> WorkflowState {
        self.shared.inner.lock().await.state.clone()
    }

    /// The question the conversation is waiting on, if any.
    pub async fn current_prompt(&self) -> Option<Prompt> {
        let inner = self.shared.inner.lock().await;
        inner
            .conversation
            .as_ref()
            .and_then(ConversationController::next_prompt)
    }

    /// Home → Intake.
    pub async fn begin_intake(&self) -> Result<WorkflowState, WorkflowError> {
        self.shared.simple(WorkflowEvent::BeginIntake)
    }

    /// Accept a profile fragment produced by the intake collaborator and start
    /// the conversation seeded with it.
    pub async fn submit_extracted_profile(
        &self,
        fragment: Profile,
    ) -> Result<Progress, WorkflowError> {
        let step = {
            let mut inner = self.shared.acquire("submit_profile")?;
            self.shared.apply_intake(&mut inner, fragment)?
        };
        self.drive(step).await
    }

    /// Run `extractor` over `document` and submit what it finds.
    ///
    /// The lock is released while the extractor works; a reset in that window
    /// turns the result into `Progress::Discarded`.
    pub async fn run_intake(
        &self,
        extractor: Arc<dyn ProfileExtractor>,
        document: Document,
    ) -> Result<Progress, Error> {
        let generation = {
            let mut inner = self.shared.acquire("submit_profile")?;
            if inner.state.stage != Stage::Intake {
                return Err(WorkflowError::InvalidTransition {
                    stage: inner.state.stage,
                    event: "submit_profile",
                }
                .into());
            }
            if !extractor.supports(&document.media_type) {
                return Err(IntakeError::UnsupportedDocument {
                    extractor: extractor.name().to_string(),
                    media_type: document.media_type.clone(),
                }
                .into());
            }
            self.shared.start(&mut inner, "extraction")
        };

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            shared.finish_intake(extractor, document, generation).await
        });
        self.shared.join(handle, generation, "extraction").await
    }

    /// Answer the pending conversation prompt.
    pub async fn submit_conversation_answer(&self, raw: &str) -> Result<Progress, WorkflowError> {
        let step = {
            let mut inner = self.shared.acquire("submit_answer")?;
            let answer = Shared::conversation(&mut inner, "submit_answer")?.submit_answer(raw)?;
            self.shared.after_answer(&mut inner, answer)?
        };
        self.drive(step).await
    }

    /// Overwrite a field the conversation owns, including one from intake,
    /// after the citizen confirmed the change.
    pub async fn correct_field(
        &self,
        field: ProfileField,
        raw: &str,
    ) -> Result<Progress, WorkflowError> {
        let step = {
            let mut inner = self.shared.acquire("correct_field")?;
            let answer = Shared::conversation(&mut inner, "correct_field")?.correct(field, raw)?;
            self.shared.after_answer(&mut inner, answer)?
        };
        self.drive(step).await
    }

    /// Results → FormReview.
    pub async fn select_program(&self, program_id: &str) -> Result<WorkflowState, WorkflowError> {
        self.shared
            .simple(WorkflowEvent::SelectProgram(program_id.to_string()))
    }

    /// Intake → Home or FormReview → Results.
    pub async fn go_back(&self) -> Result<WorkflowState, WorkflowError> {
        self.shared.simple(WorkflowEvent::Back)
    }

    /// Return Home, clearing the profile, matches and selection together.
    pub async fn reset_session(&self) -> WorkflowState {
        let shared = &self.shared;
        let mut inner = shared.inner.lock().await;
        if let Some(pending) = inner.in_flight.take() {
            info!(
                session_id = %shared.id,
                operation = pending.operation,
                generation = pending.generation,
                "Reset abandons in-flight operation"
            );
        }
        inner.conversation = None;
        let next = WorkflowMachine::reset(&inner.state);
        info!(
            session_id = %shared.id,
            from = %inner.state.stage,
            generation = next.generation,
            "Session reset"
        );
        inner.state = next;
        let _ = shared.tx.send(SessionEvent::StageChanged {
            state: inner.state.clone(),
        });
        inner.state.clone()
    }

    /// Prefilled form for the selected program. Only available in FormReview.
    pub async fn form_draft(&self) -> Result<FormDraft, WorkflowError> {
        let inner = self.shared.inner.lock().await;
        match (&inner.state.stage, &inner.state.selected) {
            (Stage::FormReview, Some(program)) => {
                Ok(FormDraft::new(program, &inner.state.profile))
            }
            (stage, _) => Err(WorkflowError::InvalidTransition {
                stage: *stage,
                event: "form_draft",
            }),
        }
    }

    async fn drive(&self, step: Step) -> Result<Progress, WorkflowError> {
        match step {
            Step::Done(progress) => Ok(progress),
            Step::Match {
                generation,
                profile,
            } => {
                let shared = Arc::clone(&self.shared);
                let handle = tokio::spawn(async move {
                    shared.finish_matching(generation, profile).await
                });
                self.shared.join(handle, generation, "matching").await
            }
        }
    }
}

impl Shared {
    fn acquire(&self, event: &'static str) -> Result<MutexGuard<'_, SessionInner>, WorkflowError> {
        let inner = self.inner.try_lock().map_err(|_| {
            warn!(session_id = %self.id, event, "Transition rejected: session busy");
            WorkflowError::ConcurrentTransition { event }
        })?;
        if let Some(pending) = inner.in_flight {
            warn!(
                session_id = %self.id,
                event,
                pending = pending.operation,
                "Transition rejected: operation in flight"
            );
            return Err(WorkflowError::ConcurrentTransition { event });
        }
        Ok(inner)
    }

    /// Apply an event that needs no collaborator.
    fn simple(&self, event: WorkflowEvent) -> Result<WorkflowState, WorkflowError> {
        let mut inner = self.acquire(event.name())?;
        let next = self.machine.transition(&inner.state, event)?;
        self.commit(&mut inner, next);
        Ok(inner.state.clone())
    }

    fn conversation<'a>(
        inner: &'a mut SessionInner,
        event: &'static str,
    ) -> Result<&'a mut ConversationController, WorkflowError> {
        let stage = inner.state.stage;
        match (stage, inner.conversation.as_mut()) {
            (Stage::Conversation, Some(conversation)) => Ok(conversation),
            _ => Err(WorkflowError::InvalidTransition { stage, event }),
        }
    }

    fn start(&self, inner: &mut SessionInner, operation: &'static str) -> u64 {
        let generation = inner.state.generation;
        inner.in_flight = Some(InFlight {
            generation,
            operation,
        });
        generation
    }

    /// True when a reset happened after `generation` started.
    fn is_stale(&self, inner: &SessionInner, generation: u64, operation: &'static str) -> bool {
        let current = inner.state.generation;
        if current == generation {
            return false;
        }
        let stale = WorkflowError::StaleResult {
            generation,
            current,
        };
        warn!(session_id = %self.id, operation, error = %stale, "Discarding stale result");
        true
    }

    /// Wait for a spawned continuation. If the task itself died, release the
    /// in-flight marker it would have cleared.
    async fn join<T, E>(
        &self,
        handle: JoinHandle<Result<T, E>>,
        generation: u64,
        operation: &'static str,
    ) -> Result<T, E>
    where
        E: From<WorkflowError>,
    {
        match handle.await {
            Ok(result) => result,
            Err(e) => {
                let mut inner = self.inner.lock().await;
                if inner.in_flight.is_some_and(|p| p.generation == generation) {
                    inner.in_flight = None;
                }
                warn!(session_id = %self.id, operation, error = %e, "In-flight task failed");
                Err(WorkflowError::Aborted {
                    operation,
                    reason: e.to_string(),
                }
                .into())
            }
        }
    }

    async fn finish_intake(
        &self,
        extractor: Arc<dyn ProfileExtractor>,
        document: Document,
        generation: u64,
    ) -> Result<Progress, Error> {
        info!(
            session_id = %self.id,
            extractor = extractor.name(),
            file = %document.file_name,
            generation,
            "Extracting profile from document"
        );
        let extracted = extractor.extract(&document).await;

        let step = {
            let mut inner = self.inner.lock().await;
            if self.is_stale(&inner, generation, "extraction") {
                return Ok(Progress::Discarded);
            }
            inner.in_flight = None;
            self.apply_intake(&mut inner, extracted?)?
        };
        match step {
            Step::Done(progress) => Ok(progress),
            Step::Match {
                generation,
                profile,
            } => Ok(self.finish_matching(generation, profile).await?),
        }
    }

    fn apply_intake(
        &self,
        inner: &mut SessionInner,
        fragment: Profile,
    ) -> Result<Step, WorkflowError> {
        let next = self
            .machine
            .transition(&inner.state, WorkflowEvent::SubmitProfile(fragment))?;
        self.commit(inner, next);

        let mut conversation = ConversationController::with_provenance(
            Arc::clone(&self.script),
            inner.state.profile.clone(),
            inner.state.provenance.clone(),
        );
        let completed = conversation.take_completion();
        let prompt = conversation.next_prompt();
        inner.conversation = Some(conversation);

        match prompt {
            Some(prompt) if !completed => Ok(self.prompt(prompt)),
            _ => Ok(self.begin_matching(inner)),
        }
    }

    fn after_answer(&self, inner: &mut SessionInner, answer: Answer) -> Result<Step, WorkflowError> {
        if !answer.accepted {
            let prompt = Self::conversation(inner, "submit_answer")?
                .next_prompt()
                .ok_or_else(|| ConversationError::Sequence {
                    reason: "rejected answer left no pending prompt".to_string(),
                })?;
            let _ = self.tx.send(SessionEvent::PromptReady {
                prompt: prompt.clone(),
            });
            let error = answer.error.unwrap_or(ValidationError::Empty);
            return Ok(Step::Done(Progress::Rejected { prompt, error }));
        }

        let provenance = Self::conversation(inner, "submit_answer")?
            .provenance()
            .clone();
        let next = self.machine.transition(
            &inner.state,
            WorkflowEvent::UpdateProfile {
                profile: answer.profile,
                provenance,
            },
        )?;
        self.commit(inner, next);

        if answer.completed {
            return Ok(self.begin_matching(inner));
        }
        match Self::conversation(inner, "submit_answer")?.next_prompt() {
            Some(prompt) => Ok(self.prompt(prompt)),
            None => Ok(self.begin_matching(inner)),
        }
    }

    fn prompt(&self, prompt: Prompt) -> Step {
        debug!(session_id = %self.id, field = %prompt.field, "Prompt ready");
        let _ = self.tx.send(SessionEvent::PromptReady {
            prompt: prompt.clone(),
        });
        Step::Done(Progress::Prompt(prompt))
    }

    fn begin_matching(&self, inner: &mut SessionInner) -> Step {
        let generation = self.start(inner, "matching");
        Step::Match {
            generation,
            profile: inner.state.profile.clone(),
        }
    }

    async fn finish_matching(
        &self,
        generation: u64,
        profile: Profile,
    ) -> Result<Progress, WorkflowError> {
        let mut matches = self
            .matching
            .match_programs(&profile, self.machine.catalog())
            .await;
        let returned = matches.len();
        matches.retain(|m| m.matched);
        if matches.len() != returned {
            debug!(
                session_id = %self.id,
                dropped = returned - matches.len(),
                "Dropped unmatched programs from matching result"
            );
        }

        let mut inner = self.inner.lock().await;
        if self.is_stale(&inner, generation, "matching") {
            return Ok(Progress::Discarded);
        }
        inner.in_flight = None;

        let next = self.machine.transition(
            &inner.state,
            WorkflowEvent::CompleteConversation {
                profile,
                matches: matches.clone(),
            },
        )?;
        self.commit(&mut inner, next);
        inner.conversation = None;

        info!(session_id = %self.id, matched = matches.len(), "Matches ready");
        let _ = self.tx.send(SessionEvent::MatchesReady {
            matches: matches.clone(),
        });
        Ok(Progress::Matched(matches))
    }

    fn commit(&self, inner: &mut SessionInner, next: WorkflowState) {
        let from = inner.state.stage;
        inner.state = next;
        if from != inner.state.stage {
            info!(
                session_id = %self.id,
                %from,
                to = %inner.state.stage,
                generation = inner.state.generation,
                "Stage changed"
            );
            let _ = self.tx.send(SessionEvent::StageChanged {
                state: inner.state.clone(),
            });
        }
    }
}
