// Tests for question classification, the phase cell and the JSON repository

use anyhow::Result;
use futures::future::join_all;
use interview_proctor::session::{
    check_session_id, Evaluation, JsonFileRepository, Modality, PhaseCell, Permissions, Question, QuestionClassifier,
    QuestionKind, Session, SessionPhase, SessionRepository, SessionResult,
};
use interview_proctor::InterviewError;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_coding_phrases_classify_as_coding() {
    for text in [
        "Write a function that returns the nth Fibonacci number.",
        "Implement an LRU cache.",
        "Given an array of integers, return the two that sum to a target.",
        "WRITE CODE to parse a CSV file",
    ] {
        assert_eq!(
            QuestionClassifier::classify_text(text),
            QuestionKind::Coding,
            "{}",
            text
        );
    }
}

#[test]
fn test_classification_is_deterministic() {
    let coding = "Implement a function in Python that reverses a string";
    let behavioral = "Tell me about a time you led a team";

    for _ in 0..3 {
        assert_eq!(QuestionClassifier::classify_text(coding), QuestionKind::Coding);
        assert_eq!(
            QuestionClassifier::classify_text(behavioral),
            QuestionKind::FreeResponse
        );
    }
}

#[test]
fn test_verb_and_noun_together_classify_as_coding() {
    assert_eq!(
        QuestionClassifier::classify_text("Can you design a class hierarchy for a parking lot?"),
        QuestionKind::Coding
    );
    assert_eq!(
        QuestionClassifier::classify_text("Please code a stack using two queues"),
        QuestionKind::Coding
    );
}

#[test]
fn test_behavioral_questions_are_free_response() {
    for text in [
        "Tell me about yourself.",
        "Describe a time you had to program under pressure.",
        "What is your favourite data structure and why?",
        "",
    ] {
        assert_eq!(
            QuestionClassifier::classify_text(text),
            QuestionKind::FreeResponse,
            "{}",
            text
        );
    }
}

#[test]
fn test_classification_picks_default_modality() {
    let coding = Question::new("Write a program that prints a diamond");
    let behavioral = Question::new("Why do you want this job?");

    assert_eq!(QuestionClassifier::classify(&coding).default_modality(), Modality::Code);
    assert_eq!(QuestionClassifier::classify(&behavioral).default_modality(), Modality::Voice);
}

#[test]
fn test_phase_moves_forward_only() {
    let phase = PhaseCell::new();
    assert_eq!(phase.get(), SessionPhase::InProgress);

    // Cannot settle before finalizing.
    assert!(!phase.settle(SessionPhase::Completed));

    assert!(phase.begin_finalizing());
    assert_eq!(phase.get(), SessionPhase::Finalizing);
    assert!(!phase.begin_finalizing());

    // Only terminal phases are valid outcomes.
    assert!(!phase.settle(SessionPhase::InProgress));
    assert!(phase.settle(SessionPhase::Terminated));
    assert!(!phase.settle(SessionPhase::Completed));

    assert_eq!(phase.get(), SessionPhase::Terminated);
    assert!(phase.get().is_terminal());
}

#[test]
fn test_settled_cell_cannot_reenter_finalizing() {
    assert!(PhaseCell::settled(SessionPhase::InProgress).is_none());
    assert!(PhaseCell::settled(SessionPhase::Finalizing).is_none());

    let phase = PhaseCell::settled(SessionPhase::Completed).expect("terminal outcome");
    assert_eq!(phase.get(), SessionPhase::Completed);
    assert!(!phase.begin_finalizing());
    assert!(!phase.settle(SessionPhase::Terminated));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_only_one_finalizer_wins() -> Result<()> {
    let phase = Arc::new(PhaseCell::new());

    let handles = (0..16).map(|_| {
        let phase = Arc::clone(&phase);
        tokio::spawn(async move { phase.begin_finalizing() })
    });

    let mut winners = 0;
    for won in join_all(handles).await {
        if won? {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(phase.get(), SessionPhase::Finalizing);
    Ok(())
}

#[test]
fn test_phase_serializes_snake_case() -> Result<()> {
    assert_eq!(serde_json::to_string(&SessionPhase::InProgress)?, "\"in_progress\"");
    assert_eq!(SessionPhase::Terminated.to_string(), "terminated");
    Ok(())
}

#[tokio::test]
async fn test_repository_round_trips_session_record() -> Result<()> {
    let dir = TempDir::new()?;
    let repository = JsonFileRepository::new(dir.path().join("sessions"))?;

    let session = Session::new(
        "abc-123",
        vec![Question::new("First?"), Question::new("Second?")],
    )
    .with_permissions(Permissions {
        mic: true,
        camera: true,
    });
    repository.save(&session.to_record()).await?;

    let record = repository.load("abc-123").await?.expect("record saved");
    assert_eq!(record.question_count, 2);
    assert!(record.permissions_granted);

    let restored: Session = record.into();
    assert_eq!(restored.questions, session.questions);

    assert!(repository.load("missing").await?.is_none());
    assert!(repository.load_result("abc-123").await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_repository_stores_result_next_to_record() -> Result<()> {
    let dir = TempDir::new()?;
    let repository = JsonFileRepository::new(dir.path())?;

    let result = SessionResult {
        session_id: "abc-123".to_string(),
        questions: vec![Question::new("Only?")],
        answers: Vec::new(),
        evaluations: vec![Evaluation::skipped_fallback()],
        report: None,
        report_error: Some("backend unavailable".to_string()),
        outcome: SessionPhase::Completed,
        strikes: 1,
        finalized_at: chrono::Utc::now(),
    };
    repository.save_result(&result).await?;

    assert!(dir.path().join("abc-123.result.json").exists());
    let stored = repository.load_result("abc-123").await?.expect("result saved");
    assert_eq!(stored.outcome, SessionPhase::Completed);
    assert_eq!(stored.evaluations, result.evaluations);
    assert_eq!(stored.strikes, 1);

    Ok(())
}

#[test]
fn test_session_record_json_shape() -> Result<()> {
    let session = Session::new("s1", vec![Question::new("Why Rust?")]);
    let json = serde_json::to_value(session.to_record())?;

    assert_eq!(json["session_id"], "s1");
    assert_eq!(json["questions"][0], "Why Rust?");
    assert_eq!(json["question_count"], 1);
    assert_eq!(json["permissions_granted"], false);
    assert!(json.get("resume_path").is_none());

    Ok(())
}

#[test]
fn test_session_id_charset() {
    assert!(check_session_id("abc-123_X").is_ok());
    assert!(check_session_id(&"a".repeat(128)).is_ok());

    let too_long = "a".repeat(129);
    for bad in ["", "a.b", "a/b", "../x", "team alice", "ä", too_long.as_str()] {
        assert!(
            matches!(check_session_id(bad), Err(InterviewError::InvalidSessionId(_))),
            "{:?} should be rejected",
            bad
        );
    }
}

#[tokio::test]
async fn test_repository_rejects_ids_that_would_share_a_file() -> Result<()> {
    let dir = TempDir::new()?;
    let repository = JsonFileRepository::new(dir.path())?;

    repository.save(&Session::new("a_b", vec![Question::new("Q?")]).to_record()).await?;

    for id in ["a.b", "a/b", "../a_b"] {
        let record = Session::new(id, vec![Question::new("Other?")]).to_record();
        assert!(repository.save(&record).await.is_err());
        assert!(repository.create(&record).await.is_err());
        assert!(repository.load(id).await.is_err());
    }

    let stored = repository.load("a_b").await?.expect("record saved");
    assert_eq!(stored.questions, vec![Question::new("Q?")]);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_repository_create_admits_one_writer() -> Result<()> {
    let dir = TempDir::new()?;
    let repository = Arc::new(JsonFileRepository::new(dir.path())?);

    let handles = (0..8).map(|i| {
        let repository = Arc::clone(&repository);
        tokio::spawn(async move {
            let record = Session::new("shared", vec![Question::new(format!("Q{}?", i))]).to_record();
            repository.create(&record).await
        })
    });

    let mut created = 0;
    for outcome in join_all(handles).await {
        if outcome?? {
            created += 1;
        }
    }
    assert_eq!(created, 1);

    let stored = repository.load("shared").await?.expect("record created");
    assert_eq!(stored.question_count, 1);
    assert!(!repository
        .create(&Session::new("shared", Vec::new()).to_record())
        .await?);

    Ok(())
}
