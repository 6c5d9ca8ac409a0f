use super::*;
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::exercise::ExerciseKind;
use crate::snapshot::{Snapshot, SnapshotFormat};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

const TOKEN: &str = "good-token";

async fn spawn_backend(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client_for(base_url: &str) -> ApiClient {
    ApiClient::new(&ApiConfig {
        base_url: format!("{}/", base_url),
        timeout_ms: 2000,
        token: None,
    })
    .unwrap()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TOKEN))
        .unwrap_or(false)
}

fn test_snapshot() -> Snapshot {
    Snapshot::new(1, vec![0xFF, 0xD8, 0xFF, 0xD9], SnapshotFormat::Jpeg)
}

#[tokio::test]
async fn test_analyze_sends_data_url_and_decodes_counters() {
    let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_in_handler = Arc::clone(&seen);

    let router = Router::new().route(
        "/api/analyze",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let seen = Arc::clone(&seen_in_handler);
            async move {
                if !authorized(&headers) {
                    return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"})));
                }
                seen.lock().await.push(body);
                (
                    StatusCode::OK,
                    Json(json!({
                        "good_reps": 4,
                        "bad_reps": 1,
                        "uncertain_reps": 2,
                        "accuracy": 87.6,
                        "feedback": "Go lower"
                    })),
                )
            }
        }),
    );
    let base_url = spawn_backend(router).await;
    let client = client_for(&base_url);
    assert_eq!(client.base_url(), base_url);

    let result = client
        .analyze(&test_snapshot(), ExerciseKind::BicepCurl, &Credential::new(TOKEN))
        .await
        .unwrap();

    assert_eq!(
        result.counters,
        RepCounters {
            good: 4,
            bad: 1,
            uncertain: 2
        }
    );
    assert_eq!(result.accuracy, 88);
    assert_eq!(result.feedback, "Go lower");

    let bodies = seen.lock().await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["exercise"], "bicep_curl");
    assert_eq!(bodies[0]["image"], "data:image/jpeg;base64,/9j/2Q==");
}

#[tokio::test]
async fn test_rejected_credential_is_unauthorized() {
    let router = Router::new().route(
        "/api/analyze",
        post(|| async { (StatusCode::UNAUTHORIZED, "invalid token") }),
    );
    let client = client_for(&spawn_backend(router).await);

    let err = client
        .analyze(&test_snapshot(), ExerciseKind::Squat, &Credential::new("bad"))
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::Unauthorized { status: 401 });
}

#[tokio::test]
async fn test_server_error_keeps_status_and_body() {
    let router = Router::new().route(
        "/api/analyze",
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to analyze frame"})),
            )
        }),
    );
    let client = client_for(&spawn_backend(router).await);

    match client
        .analyze(&test_snapshot(), ExerciseKind::Squat, &Credential::new(TOKEN))
        .await
    {
        Err(ApiError::ServerError { status, body }) => {
            assert_eq!(status, 500);
            assert!(body.contains("Failed to analyze frame"));
        }
        other => panic!("Expected server error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let router = Router::new().route("/api/analyze", post(|| async { "definitely not json" }));
    let client = client_for(&spawn_backend(router).await);

    let err = client
        .analyze(&test_snapshot(), ExerciseKind::Squat, &Credential::new(TOKEN))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Decode { .. }));
}

#[tokio::test]
async fn test_closed_port_is_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(&format!("http://{}", addr));
    let err = client.reset(&Credential::new(TOKEN)).await.unwrap_err();
    assert!(matches!(err, ApiError::Unreachable { .. }));
}

#[tokio::test]
async fn test_reset_and_save_send_bearer_token() {
    let calls: Arc<Mutex<Vec<(String, Value)>>> = Arc::new(Mutex::new(Vec::new()));
    let reset_calls = Arc::clone(&calls);
    let save_calls = Arc::clone(&calls);

    let router = Router::new()
        .route(
            "/api/reset",
            post(move |headers: HeaderMap| {
                let calls = Arc::clone(&reset_calls);
                async move {
                    if !authorized(&headers) {
                        return StatusCode::UNAUTHORIZED;
                    }
                    calls.lock().await.push(("reset".to_string(), Value::Null));
                    StatusCode::OK
                }
            }),
        )
        .route(
            "/api/workout",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let calls = Arc::clone(&save_calls);
                async move {
                    if !authorized(&headers) {
                        return StatusCode::UNAUTHORIZED;
                    }
                    calls.lock().await.push(("save".to_string(), body));
                    StatusCode::CREATED
                }
            }),
        );
    let client = client_for(&spawn_backend(router).await);
    let credential = Credential::new(TOKEN);

    client.reset(&credential).await.unwrap();
    client
        .save(
            &WorkoutRecord {
                exercise: ExerciseKind::Squat,
                rep_count: 3,
                duration_seconds: 42,
                average_accuracy: 77,
            },
            &credential,
        )
        .await
        .unwrap();

    let calls = calls.lock().await;
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, "reset");
    assert_eq!(calls[1].0, "save");
    assert_eq!(calls[1].1["exercise_type"], "squat");
    assert_eq!(calls[1].1["rep_count"], 3);
    assert_eq!(calls[1].1["duration_seconds"], 42);
    assert_eq!(calls[1].1["average_accuracy"], 77);

    let err = client.reset(&Credential::new("stale")).await.unwrap_err();
    assert_eq!(err, ApiError::Unauthorized { status: 401 });
}

#[tokio::test]
async fn test_history_and_personal_bests() {
    let router = Router::new()
        .route(
            "/api/workout",
            get(|| async {
                Json(json!([
                    {
                        "_id": {"$oid": "64ff00000000000000000001"},
                        "user_id": "auth0|abc",
                        "exercise_type": "squat",
                        "rep_count": 10,
                        "duration_seconds": 60,
                        "average_accuracy": 82,
                        "completion_timestamp": {"$date": "2025-09-11T10:00:00Z"}
                    }
                ]))
            }),
        )
        .route(
            "/api/personal_bests",
            get(|| async { Json(json!({"squat": 48, "pushup": 20})) }),
        );
    let client = client_for(&spawn_backend(router).await);
    let credential = Credential::new(TOKEN);

    let history = client.history(&credential).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].exercise(), Some(ExerciseKind::Squat));
    assert_eq!(history[0].rep_count, 10);
    assert!(history[0].completion_timestamp.is_some());

    let bests = client.personal_bests(&credential).await.unwrap();
    assert_eq!(bests.get(ExerciseKind::Squat), 48);
    assert_eq!(bests.get(ExerciseKind::Pushup), 20);
}

#[test]
fn test_credential_is_redacted_in_debug() {
    let credential = Credential::new("super-secret");
    assert_eq!(format!("{:?}", credential), "Credential(***)");
    assert_eq!(credential.bearer_header(), "Bearer super-secret");

    assert!(Credential::from_token(Some("  ")).is_none());
    assert!(Credential::from_token(None).is_none());
    assert_eq!(
        Credential::from_token(Some(" abc ")),
        Some(Credential::new("abc"))
    );
}

#[test]
fn test_accuracy_is_clamped() {
    assert_eq!(clamp_accuracy(-5.0), 0);
    assert_eq!(clamp_accuracy(140.0), 100);
    assert_eq!(clamp_accuracy(49.5), 50);
    assert_eq!(clamp_accuracy(f64::NAN), 0);
}
