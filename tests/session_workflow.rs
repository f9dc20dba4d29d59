//! End-to-end tests for the session workflow.
//!
//! Each test drives a real `Session` through its public async API. Slow
//! collaborators are simulated with gated stubs so tests can interleave a
//! reset with in-flight extraction or matching deterministically.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Notify;
use tokio::time::timeout;

use benefit_navigator::catalog::Catalog;
use benefit_navigator::conversation::Script;
use benefit_navigator::eligibility::{EligibilityMatcher, MatchResult};
use benefit_navigator::error::{Error, IntakeError, WorkflowError};
use benefit_navigator::intake::{Document, JsonProfileExtractor, ProfileExtractor};
use benefit_navigator::profile::{
    CasteCategory, FieldSource, Gender, MaritalStatus, Profile, ProfileField,
};
use benefit_navigator::workflow::{
    LocalMatching, MatchingService, Progress, Session, SessionEvent, Stage,
};

/// Maximum time any step is allowed to take before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const WIDOW_AND_OLD_AGE: &str = r#"{"programs": [
    {
        "id": "widow-pension",
        "names": {"en": "Widow Pension Scheme"},
        "description": "Monthly pension for widows",
        "criteria": [
            {"label": "Female", "rule": {"kind": "equals", "field": "gender", "value": "Female"}},
            {"label": "Widow", "rule": {"kind": "equals", "field": "marital_status", "value": "Widow"}},
            {"label": "Low Income", "rule": {"kind": "threshold", "field": "monthly_income", "op": "below", "value": "50000"}}
        ],
        "benefits": "Monthly pension",
        "form_ref": "/forms/widow-pension.pdf"
    },
    {
        "id": "old-age-pension",
        "names": {"en": "Old Age Pension"},
        "description": "Pension for senior citizens",
        "criteria": [
            {"label": "Age 60+", "rule": {"kind": "threshold", "field": "age", "op": "at_least", "value": "60"}}
        ],
        "benefits": "Monthly pension"
    }
]}"#;

/// Matching service that blocks until released.
struct GatedMatching {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl MatchingService for GatedMatching {
    async fn match_programs(&self, profile: &Profile, catalog: &Catalog) -> Vec<MatchResult> {
        self.started.notify_one();
        self.release.notified().await;
        LocalMatching::default().match_programs(profile, catalog).await
    }
}

/// Matching service that reports every program, matched or not.
struct DiagnosingMatching;

#[async_trait]
impl MatchingService for DiagnosingMatching {
    async fn match_programs(&self, profile: &Profile, catalog: &Catalog) -> Vec<MatchResult> {
        EligibilityMatcher::default().diagnose(profile, catalog)
    }
}

/// Extractor that blocks until released, then returns a fixed fragment.
struct GatedExtractor {
    started: Arc<Notify>,
    release: Arc<Notify>,
    fragment: Profile,
}

#[async_trait]
impl ProfileExtractor for GatedExtractor {
    fn name(&self) -> &str {
        "gated"
    }

    fn supports(&self, _media_type: &str) -> bool {
        true
    }

    async fn extract(&self, _document: &Document) -> Result<Profile, IntakeError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(self.fragment.clone())
    }
}

fn builtin_session() -> Session {
    session_with(
        Catalog::builtin().unwrap(),
        Arc::new(LocalMatching::default()),
    )
}

fn session_with(catalog: Catalog, matching: Arc<dyn MatchingService>) -> Session {
    Session::new(
        Arc::new(catalog),
        Arc::new(Script::builtin().unwrap()),
        matching,
        64,
    )
    .unwrap()
}

/// The seed from the widow-pension scenario: age, gender, marital status
/// and income known from the document.
fn widow_seed() -> Profile {
    Profile {
        age: Some(45),
        gender: Some(Gender::Female),
        marital_status: Some(MaritalStatus::Widow),
        monthly_income: Some(Decimal::ZERO),
        ..Default::default()
    }
}

fn complete_profile() -> Profile {
    Profile {
        name: Some("Sita Devi".into()),
        family_size: Some(3),
        caste: Some(CasteCategory::Obc),
        region: Some("Uttar Pradesh".into()),
        ..widow_seed()
    }
}

async fn advance_to(session: &Session, stage: Stage) {
    if stage == Stage::Home {
        return;
    }
    session.begin_intake().await.unwrap();
    match stage {
        Stage::Conversation => {
            session.submit_extracted_profile(widow_seed()).await.unwrap();
        }
        Stage::Results | Stage::FormReview => {
            // Fully known from the document, so matching runs immediately
            session
                .submit_extracted_profile(complete_profile())
                .await
                .unwrap();
            if stage == Stage::FormReview {
                session.select_program("widow-pension").await.unwrap();
            }
        }
        Stage::Home | Stage::Intake => {}
    }
    assert_eq!(session.snapshot().await.stage, stage);
}

#[tokio::test]
async fn widow_scenario_matches_only_widow_pension() {
    let session = session_with(
        Catalog::from_json(WIDOW_AND_OLD_AGE).unwrap(),
        Arc::new(LocalMatching::default()),
    );
    session.begin_intake().await.unwrap();

    let progress = session.submit_extracted_profile(widow_seed()).await.unwrap();
    let prompt = match progress {
        Progress::Prompt(prompt) => prompt,
        other => panic!("Expected a prompt, got {:?}", other),
    };
    // Income came from the document
    assert_eq!(prompt.field, ProfileField::FamilySize);

    let mut asked = vec![prompt.field];
    let mut progress = session.submit_conversation_answer("3").await.unwrap();
    for answer in ["OBC", "Uttar Pradesh"] {
        let Progress::Prompt(prompt) = &progress else {
            panic!("Expected a prompt, got {:?}", progress);
        };
        asked.push(prompt.field);
        progress = session.submit_conversation_answer(answer).await.unwrap();
    }
    assert_eq!(
        asked,
        vec![ProfileField::FamilySize, ProfileField::Caste, ProfileField::Region]
    );

    let matches = match progress {
        Progress::Matched(matches) => matches,
        other => panic!("Expected matches, got {:?}", other),
    };
    let ids: Vec<&str> = matches.iter().map(|m| m.program_id()).collect();
    assert_eq!(ids, vec!["widow-pension"]);
    assert!(matches.iter().all(|m| m.matched));

    let state = session.snapshot().await;
    assert_eq!(state.stage, Stage::Results);
    assert_eq!(state.profile.family_size, Some(3));
    assert_eq!(state.matches, matches);
}

#[tokio::test]
async fn select_program_and_prefill_form() {
    let session = builtin_session();
    advance_to(&session, Stage::Results).await;

    let state = session.select_program("widow-pension").await.unwrap();
    assert_eq!(state.stage, Stage::FormReview);
    assert_eq!(state.selected.as_ref().unwrap().id, "widow-pension");

    let draft = session.form_draft().await.unwrap();
    assert_eq!(draft.file_name, "Widow_Pension_Scheme.pdf");
    assert_eq!(draft.value(ProfileField::Name), Some("Sita Devi"));
    assert_eq!(draft.missing, vec![ProfileField::Address]);

    let back = session.go_back().await.unwrap();
    assert_eq!(back.stage, Stage::Results);
    assert!(back.selected.is_none());
    assert!(!back.matches.is_empty());
}

#[tokio::test]
async fn reset_from_every_stage_clears_state() {
    for stage in Stage::ALL {
        let session = builtin_session();
        advance_to(&session, stage).await;

        let state = session.reset_session().await;
        assert!(state.is_pristine(), "reset from {stage} left data behind");
        assert_eq!(state.generation, 1);

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.stage, Stage::Home);
        assert!(snapshot.profile.is_empty());
        assert!(snapshot.matches.is_empty());
        assert!(snapshot.selected.is_none());
        assert!(session.current_prompt().await.is_none());
    }
}

#[tokio::test]
async fn reset_while_matching_discards_result() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let session = Arc::new(session_with(
        Catalog::builtin().unwrap(),
        Arc::new(GatedMatching {
            started: Arc::clone(&started),
            release: Arc::clone(&release),
        }),
    ));
    session.begin_intake().await.unwrap();

    // A complete fragment goes straight to matching
    let pending = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.submit_extracted_profile(complete_profile()).await })
    };
    timeout(TEST_TIMEOUT, started.notified())
        .await
        .expect("matching never started");

    // Other transitions are refused while matching is in flight
    let err = session.select_program("widow-pension").await.unwrap_err();
    assert_eq!(
        err,
        WorkflowError::ConcurrentTransition {
            event: "select_program"
        }
    );

    let reset = session.reset_session().await;
    assert_eq!(reset.stage, Stage::Home);

    release.notify_one();
    let progress = timeout(TEST_TIMEOUT, pending)
        .await
        .expect("matching never finished")
        .unwrap()
        .unwrap();
    assert_eq!(progress, Progress::Discarded);

    let state = session.snapshot().await;
    assert!(state.is_pristine());
    assert_eq!(state.generation, 1);

    // The session is usable again
    session.begin_intake().await.unwrap();
}

#[tokio::test]
async fn caller_giving_up_does_not_leave_session_busy() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let session = session_with(
        Catalog::builtin().unwrap(),
        Arc::new(GatedMatching {
            started: Arc::clone(&started),
            release: Arc::clone(&release),
        }),
    );
    session.begin_intake().await.unwrap();
    let mut rx = session.subscribe();

    // The caller stops waiting while matching is blocked
    let gave_up = timeout(
        Duration::from_millis(20),
        session.submit_extracted_profile(complete_profile()),
    )
    .await;
    assert!(gave_up.is_err());
    timeout(TEST_TIMEOUT, started.notified())
        .await
        .expect("matching never started");

    release.notify_one();
    let matches = timeout(TEST_TIMEOUT, async {
        loop {
            if let SessionEvent::MatchesReady { matches } = rx.recv().await.unwrap() {
                break matches;
            }
        }
    })
    .await
    .expect("matching never finished");
    assert!(matches.iter().any(|m| m.program_id() == "widow-pension"));

    let state = session.snapshot().await;
    assert_eq!(state.stage, Stage::Results);
    assert_eq!(state.matches, matches);

    let state = session.select_program("widow-pension").await.unwrap();
    assert_eq!(state.stage, Stage::FormReview);
}

#[tokio::test]
async fn unmatched_programs_from_matching_service_are_dropped() {
    let session = session_with(Catalog::builtin().unwrap(), Arc::new(DiagnosingMatching));
    session.begin_intake().await.unwrap();

    let progress = session
        .submit_extracted_profile(complete_profile())
        .await
        .unwrap();
    let Progress::Matched(matches) = progress else {
        panic!("Expected matches, got {:?}", progress);
    };
    assert!(!matches.is_empty());
    assert!(matches.iter().all(|m| m.matched));
    assert!(!matches.iter().any(|m| m.program_id() == "old-age-pension"));

    let state = session.snapshot().await;
    assert_eq!(state.stage, Stage::Results);
    assert_eq!(state.matches, matches);
}

#[tokio::test]
async fn reset_while_extracting_discards_fragment() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let extractor = Arc::new(GatedExtractor {
        started: Arc::clone(&started),
        release: Arc::clone(&release),
        fragment: widow_seed(),
    });
    let session = Arc::new(builtin_session());
    session.begin_intake().await.unwrap();

    let pending = {
        let session = Arc::clone(&session);
        let extractor = Arc::clone(&extractor);
        tokio::spawn(async move {
            let document = Document::new("card.jpg", "image/jpeg", vec![0xFF, 0xD8]);
            session.run_intake(extractor, document).await
        })
    };
    timeout(TEST_TIMEOUT, started.notified())
        .await
        .expect("extraction never started");

    assert!(matches!(
        session.begin_intake().await,
        Err(WorkflowError::ConcurrentTransition { .. })
    ));

    session.reset_session().await;
    release.notify_one();

    let progress = timeout(TEST_TIMEOUT, pending)
        .await
        .expect("extraction never finished")
        .unwrap()
        .unwrap();
    assert_eq!(progress, Progress::Discarded);
    assert!(session.snapshot().await.is_pristine());
}

#[tokio::test]
async fn json_document_intake_seeds_conversation() {
    let session = builtin_session();
    session.begin_intake().await.unwrap();

    let document = Document::new(
        "profile.json",
        "application/json",
        br#"{"name": "Sita Devi", "age": 45, "gender": "Female", "monthlyIncome": 20000,
            "caste": "OBC", "state": "Uttar Pradesh", "maritalStatus": "Widow"}"#
            .to_vec(),
    );
    let progress = session
        .run_intake(Arc::new(JsonProfileExtractor), document)
        .await
        .unwrap();
    match progress {
        Progress::Prompt(prompt) => assert_eq!(prompt.field, ProfileField::FamilySize),
        other => panic!("Expected family size prompt, got {:?}", other),
    }

    let Progress::Matched(matches) = session.submit_conversation_answer("4 members").await.unwrap()
    else {
        panic!("Expected matches after the last answer");
    };
    // Income 20000 is too high for the BPL programs
    let ids: Vec<&str> = matches.iter().map(|m| m.program_id()).collect();
    assert_eq!(ids, vec!["widow-pension"]);
}

#[tokio::test]
async fn unrecognized_gender_in_document_is_asked_for() {
    let session = builtin_session();
    session.begin_intake().await.unwrap();

    let document = Document::new(
        "profile.json",
        "application/json",
        r#"{"name": "Sita Devi", "age": 45, "gender": "महिला", "monthlyIncome": 0,
            "familySize": 3, "state": "Uttar Pradesh", "maritalStatus": "Widow"}"#
            .as_bytes()
            .to_vec(),
    );
    let progress = session
        .run_intake(Arc::new(JsonProfileExtractor), document)
        .await
        .unwrap();
    match progress {
        Progress::Prompt(prompt) => assert_eq!(prompt.field, ProfileField::Gender),
        other => panic!("Expected gender prompt, got {:?}", other),
    }

    let state = session.snapshot().await;
    assert_eq!(state.stage, Stage::Conversation);
    assert_eq!(state.profile.gender, None);
    assert_eq!(state.profile.name.as_deref(), Some("Sita Devi"));
    assert_eq!(state.profile.age, Some(45));
}

#[tokio::test]
async fn unsupported_document_leaves_session_in_intake() {
    let session = builtin_session();
    session.begin_intake().await.unwrap();

    let document = Document::new("photo.png", "image/png", vec![0x89, 0x50]);
    let err = session
        .run_intake(Arc::new(JsonProfileExtractor), document)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Intake(IntakeError::UnsupportedDocument { .. })
    ));
    assert_eq!(session.snapshot().await.stage, Stage::Intake);

    // No operation was left in flight
    session.go_back().await.unwrap();
}

#[tokio::test]
async fn illegal_events_leave_stage_unchanged() {
    let session = builtin_session();
    advance_to(&session, Stage::Intake).await;

    let err = session.select_program("widow-pension").await.unwrap_err();
    assert_eq!(
        err,
        WorkflowError::InvalidTransition {
            stage: Stage::Intake,
            event: "select_program"
        }
    );
    assert!(matches!(
        session.begin_intake().await,
        Err(WorkflowError::InvalidTransition { .. })
    ));
    assert!(matches!(
        session.submit_extracted_profile(Profile::default()).await,
        Err(WorkflowError::InvalidPayload { .. })
    ));
    assert_eq!(session.snapshot().await.stage, Stage::Intake);

    session.submit_extracted_profile(widow_seed()).await.unwrap();
    assert!(matches!(
        session.go_back().await,
        Err(WorkflowError::InvalidTransition {
            stage: Stage::Conversation,
            ..
        })
    ));
}

#[tokio::test]
async fn intake_value_is_kept_unless_corrected() {
    let session = builtin_session();
    advance_to(&session, Stage::Conversation).await;
    assert_eq!(
        session.snapshot().await.provenance.source(ProfileField::MonthlyIncome),
        Some(FieldSource::Intake)
    );

    // The document said income 0; the citizen confirms it is actually 8000
    let progress = session
        .correct_field(ProfileField::MonthlyIncome, "₹8,000")
        .await
        .unwrap();
    assert!(matches!(progress, Progress::Prompt(_)));
    assert_eq!(
        session.snapshot().await.profile.monthly_income,
        Some(Decimal::from(8000))
    );

    session.submit_conversation_answer("3").await.unwrap();
    let state = session.snapshot().await;
    assert_eq!(
        state.provenance.source(ProfileField::MonthlyIncome),
        Some(FieldSource::Confirmed)
    );
    assert_eq!(
        state.provenance.source(ProfileField::FamilySize),
        Some(FieldSource::Conversation)
    );
}

#[tokio::test]
async fn events_describe_the_session() {
    let session = builtin_session();
    let mut rx = session.subscribe();
    advance_to(&session, Stage::Conversation).await;
    for answer in ["3", "SC", "Bihar"] {
        session.submit_conversation_answer(answer).await.unwrap();
    }

    let mut stages = Vec::new();
    let mut prompts = 0;
    let mut matches_ready = 0;
    while let Ok(event) = rx.try_recv() {
        match event {
            SessionEvent::StageChanged { state } => stages.push(state.stage),
            SessionEvent::PromptReady { .. } => prompts += 1,
            SessionEvent::MatchesReady { .. } => matches_ready += 1,
        }
    }
    assert_eq!(
        stages,
        vec![Stage::Intake, Stage::Conversation, Stage::Results]
    );
    assert_eq!(prompts, 3);
    assert_eq!(matches_ready, 1);
}
