use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use benefit_navigator::catalog::DEFAULT_LANGUAGE;
use benefit_navigator::config::EngineConfig;
use benefit_navigator::conversation::Prompt;
use benefit_navigator::eligibility::{EligibilityMatcher, MatchResult, UnmetReason};
use benefit_navigator::error::WorkflowError;
use benefit_navigator::intake::{Document, JsonProfileExtractor};
use benefit_navigator::workflow::{Progress, Session, SessionEvent, Stage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = EngineConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let session = Session::from_config(&config)?;

    eprintln!("Benefit Navigator v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Programs: {}", session.catalog().len());
    eprintln!("   Ranking: {:?}", config.ranking);
    eprintln!("   Commands: /back /reset /select <id> /form /why /quit\n");

    // Stage changes are rendered from the event stream, everything else from
    // the call results.
    let mut events = session.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let SessionEvent::StageChanged { state } = event {
                eprintln!("-- {} --", state.stage);
            }
        }
    });

    session.begin_intake().await?;
    match std::env::args().nth(1) {
        Some(path) => intake(&session, &path).await,
        None => println!("Enter the path of a JSON document, or paste a JSON profile."),
    }

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    eprint!("> ");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            eprint!("> ");
            continue;
        }

        let stage = session.snapshot().await.stage;
        match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) => break,
            ("/reset", _) => {
                session.reset_session().await;
                println!("Starting over.");
            }
            ("/back", _) => report(session.go_back().await.map(|_| ())),
            ("/select", id) => select(&session, id.trim()).await,
            ("/form", _) => form(&session).await,
            ("/why", _) => why(&session).await,
            _ => match stage {
                Stage::Home => report(session.begin_intake().await.map(|_| ())),
                Stage::Intake => intake(&session, line).await,
                Stage::Conversation => match session.submit_conversation_answer(line).await {
                    Ok(progress) => show(progress),
                    Err(e) => println!("Error: {e}"),
                },
                Stage::Results => select(&session, line).await,
                Stage::FormReview => form(&session).await,
            },
        }
        eprint!("> ");
    }

    Ok(())
}

async fn intake(session: &Session, input: &str) {
    let document = if input.starts_with('{') {
        Document::new("inline.json", "application/json", input.as_bytes().to_vec())
    } else {
        match read_document(Path::new(input)) {
            Ok(document) => document,
            Err(e) => {
                println!("Error: {e:#}");
                return;
            }
        }
    };
    match session.run_intake(Arc::new(JsonProfileExtractor), document).await {
        Ok(progress) => show(progress),
        Err(e) => println!("Error: {e}"),
    }
}

fn read_document(path: &Path) -> anyhow::Result<Document> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Document::new(file_name, "application/json", bytes))
}

async fn select(session: &Session, input: &str) {
    let state = session.snapshot().await;
    // Accept a 1-based position as well as an id
    let id = match input.parse::<usize>() {
        Ok(n) if n >= 1 && n <= state.matches.len() => {
            state.matches[n - 1].program_id().to_string()
        }
        _ => input.to_string(),
    };
    match session.select_program(&id).await {
        Ok(_) => form(session).await,
        Err(e) => println!("Error: {e}"),
    }
}

async fn form(session: &Session) {
    match session.form_draft().await {
        Ok(draft) => {
            println!("{} ({})", draft.program_name, draft.file_name);
            for entry in &draft.entries {
                let value = entry.value.as_deref().unwrap_or("________");
                println!("  {:<16} {}", entry.field, value);
            }
            if let Some(form_ref) = &draft.form_ref {
                println!("  Form: {form_ref}");
            }
        }
        Err(e) => println!("Error: {e}"),
    }
}

async fn why(session: &Session) {
    let state = session.snapshot().await;
    let diagnosis = EligibilityMatcher::new(Default::default())
        .diagnose(&state.profile, session.catalog());
    for result in diagnosis.iter().filter(|r| !r.matched) {
        println!("{}:", result.program.name(DEFAULT_LANGUAGE));
        for unmet in &result.unmet {
            let reason = match unmet.reason {
                UnmetReason::Missing => "unknown",
                UnmetReason::Failed => "not met",
            };
            println!("  {} ({reason})", unmet.label);
        }
    }
}

fn show(progress: Progress) {
    match progress {
        Progress::Prompt(prompt) => println!("{}", question(&prompt)),
        Progress::Rejected { prompt, error } => {
            println!("Sorry, I could not use that: {error}");
            println!("{}", question(&prompt));
        }
        Progress::Matched(matches) => results(&matches),
        Progress::Discarded => {}
    }
}

fn results(matches: &[MatchResult]) {
    if matches.is_empty() {
        println!("No programs match this profile. Type /why to see what was missing.");
        return;
    }
    println!("You may be eligible for:");
    for (i, result) in matches.iter().enumerate() {
        let program = &result.program;
        println!("  {}. {} [{}]", i + 1, program.name(DEFAULT_LANGUAGE), program.id);
        println!("     {}", program.benefits);
    }
    println!("Pick a number to prefill its form.");
}

fn report(result: Result<(), WorkflowError>) {
    if let Err(e) = result {
        println!("Error: {e}");
    }
}

/// English text for the prompt keys used by the built-in script.
fn question(prompt: &Prompt) -> &str {
    match prompt.text.as_str() {
        "income_question" => "What is your monthly household income?",
        "family_question" => "How many members are in your family?",
        "age_question" => "How old are you?",
        "gender_question" => "What is your gender?",
        "marital_status_question" => "What is your marital status?",
        "caste_question" => "Which caste category do you belong to (General, OBC, SC, ST, EWS)?",
        "state_question" => "Which state do you live in?",
        other => other,
    }
}
