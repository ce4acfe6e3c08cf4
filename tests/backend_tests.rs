// Tests for the scoring backend client against a local stand-in server

mod common;

use anyhow::Result;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use common::serve;
use interview_proctor::audio::{AudioArtifact, AudioFrame, CaptureFormat};
use interview_proctor::session::AnswerContent;
use interview_proctor::{BackendClient, EvaluationGateway, InterviewError, MonitoringService, ReportService};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

#[derive(Clone, Default)]
struct Seen {
    json: Arc<Mutex<Vec<Value>>>,
    multipart: Arc<Mutex<Vec<(String, Option<String>, usize)>>>,
}

fn good_evaluation() -> Value {
    json!({
        "evaluation": {
            "overall_score": 78,
            "category_scores": {"clarity": 80, "depth": 70},
            "strengths": ["Concrete examples"],
            "weaknesses": ["Rambling intro"],
            "detailed_feedback": "Good answer overall."
        },
        "transcript": "I built a compiler"
    })
}

async fn submit_json(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
    seen.json.lock().unwrap().push(body);
    Json(good_evaluation())
}

async fn submit_multipart(State(seen): State<Seen>, mut form: Multipart) -> Json<Value> {
    while let Ok(Some(field)) = form.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let len = field.bytes().await.map(|b| b.len()).unwrap_or(0);
        seen.multipart.lock().unwrap().push((name, content_type, len));
    }
    Json(good_evaluation())
}

async fn start_monitoring(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
    seen.json.lock().unwrap().push(body);
    Json(json!({"status": "monitoring_started"}))
}

async fn generate_report(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
    seen.json.lock().unwrap().push(body);
    Json(json!({
        "report_path": "reports/abc.pdf",
        "final_assessment": {"overall_score": 75, "recommendation": "hire"},
        "monitor_report": "reports/abc-monitor.pdf",
        "evaluations": []
    }))
}

async fn backend(submit: Router<Seen>) -> Result<(BackendClient, Seen)> {
    let seen = Seen::default();
    let router = submit
        .route("/api/start-monitoring", post(start_monitoring))
        .route("/api/generate-report", post(generate_report))
        .with_state(seen.clone());
    let base = serve(router).await?;
    // Trailing slash is trimmed by the client.
    Ok((BackendClient::new(reqwest::Client::new(), format!("{}/", base)), seen))
}

#[tokio::test]
async fn test_text_answer_is_scored() -> Result<()> {
    let (client, seen) = backend(Router::new().route("/api/submit-answer", post(submit_json))).await?;

    let answer = AnswerContent::Text {
        text: "I built a compiler".to_string(),
    };
    let evaluation = client.evaluate("abc", 0, &answer).await?;

    assert_eq!(evaluation.overall_score, 78.0);
    assert_eq!(evaluation.category_scores.get("depth"), Some(&70.0));
    assert_eq!(evaluation.feedback, "Good answer overall.");
    assert_eq!(evaluation.transcript.as_deref(), Some("I built a compiler"));

    let body = seen.json.lock().unwrap()[0].clone();
    assert_eq!(body["session_id"], "abc");
    assert_eq!(body["question_index"], 0);
    assert_eq!(body["type"], "text");
    assert!(body.get("language").is_none());

    Ok(())
}

#[tokio::test]
async fn test_code_and_skipped_answers_are_json() -> Result<()> {
    let (client, seen) = backend(Router::new().route("/api/submit-answer", post(submit_json))).await?;

    client
        .evaluate(
            "abc",
            1,
            &AnswerContent::Code {
                source: "fn main() {}".to_string(),
                language: "rust".to_string(),
            },
        )
        .await?;
    client.evaluate("abc", 2, &AnswerContent::Skipped).await?;

    let bodies = seen.json.lock().unwrap().clone();
    assert_eq!(bodies[0]["type"], "code");
    assert_eq!(bodies[0]["language"], "rust");
    assert_eq!(bodies[0]["answer"], "fn main() {}");
    assert_eq!(bodies[1]["type"], "text");
    assert_eq!(bodies[1]["answer"], "[skipped]");

    Ok(())
}

#[tokio::test]
async fn test_voice_answer_is_multipart_wav() -> Result<()> {
    let (client, seen) =
        backend(Router::new().route("/api/submit-answer", post(submit_multipart))).await?;

    let dir = TempDir::new()?;
    let frames = vec![AudioFrame {
        samples: vec![0, 1000, -1000, 0].repeat(400),
        sample_rate: 16000,
        channels: 1,
        timestamp_ms: 0,
    }];
    let artifact = AudioArtifact::write(&dir.path().join("q1.wav"), CaptureFormat::new(16000, 1), &frames)?;
    let wav_len = std::fs::metadata(&artifact.path)?.len() as usize;

    let evaluation = client
        .evaluate("abc", 0, &AnswerContent::Voice { artifact })
        .await?;
    assert_eq!(evaluation.overall_score, 78.0);

    let parts = seen.multipart.lock().unwrap().clone();
    let names: Vec<&str> = parts.iter().map(|(name, _, _)| name.as_str()).collect();
    assert_eq!(names, vec!["session_id", "question_index", "audio"]);

    let (_, content_type, len) = &parts[2];
    assert_eq!(content_type.as_deref(), Some("audio/wav"));
    assert_eq!(*len, wav_len);

    Ok(())
}

#[tokio::test]
async fn test_missing_evaluation_is_malformed() -> Result<()> {
    let router = Router::new().route(
        "/api/submit-answer",
        post(|| async { Json(json!({"status": "ok"})) }),
    );
    let (client, _) = backend(router).await?;

    let result = client
        .evaluate("abc", 0, &AnswerContent::Text { text: "x".to_string() })
        .await;
    assert!(matches!(result, Err(InterviewError::MalformedResponse { .. })));

    Ok(())
}

#[tokio::test]
async fn test_backend_error_status() -> Result<()> {
    let router = Router::new().route(
        "/api/submit-answer",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "boom"}))) }),
    );
    let (client, _) = backend(router).await?;

    let result = client.evaluate("abc", 0, &AnswerContent::Skipped).await;
    assert!(matches!(result, Err(InterviewError::HttpStatus { .. })));

    Ok(())
}

#[test]
fn test_evaluation_validation() {
    let parse = |body: Value| BackendClient::parse_evaluation("test", body);

    assert!(parse(good_evaluation()).is_ok());
    assert!(parse(json!({"evaluation": null})).is_err());
    assert!(parse(json!({"evaluation": "great"})).is_err());
    assert!(parse(json!({"evaluation": {"strengths": []}})).is_err());
    assert!(parse(json!({"evaluation": {"overall_score": 101}})).is_err());
    assert!(parse(json!({"evaluation": {"overall_score": -1}})).is_err());
    assert!(parse(json!({"evaluation": {"overall_score": 50, "category_scores": {"depth": 150}}})).is_err());

    let minimal = parse(json!({"evaluation": {"overall_score": 0}})).unwrap();
    assert_eq!(minimal.overall_score, 0.0);
    assert!(minimal.strengths.is_empty());
    assert!(minimal.transcript.is_none());
}

#[tokio::test]
async fn test_start_monitoring_sends_duration() -> Result<()> {
    let (client, seen) = backend(Router::new()).await?;

    client.start_monitoring("abc", Duration::from_secs(180)).await?;

    let body = seen.json.lock().unwrap()[0].clone();
    assert_eq!(body, json!({"session_id": "abc", "duration": 180}));

    Ok(())
}

#[tokio::test]
async fn test_generate_report() -> Result<()> {
    let (client, seen) = backend(Router::new()).await?;

    let report = client.generate_report("abc").await?;
    assert_eq!(report.report_path.as_deref(), Some("reports/abc.pdf"));
    assert!(report.report_url.is_none());
    assert_eq!(report.monitor_report.as_deref(), Some("reports/abc-monitor.pdf"));
    assert_eq!(
        report.final_assessment.as_ref().map(|a| a["recommendation"].clone()),
        Some(json!("hire"))
    );
    assert_eq!(seen.json.lock().unwrap()[0], json!({"session_id": "abc"}));

    Ok(())
}
