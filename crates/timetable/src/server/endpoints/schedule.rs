//! Schedule endpoints. Each create or edit request runs one submission of
//! the form state machine; a form session (the `x-form-session` header) can
//! only have one submission in flight.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::reference::ReferenceData;
use crate::repository::{RepositoryError, ScheduleFilter};
use crate::schedule::{
    generate_slots, ScheduleDraft, ScheduleForm, ScheduleId, ScheduleValidator, SubmitError,
};
use crate::server::types::ApiErrorType;
use crate::types::TimetableState;

const FORM_SESSION_HEADER: &str = "x-form-session";
const ANONYMOUS_SESSION: &str = "anonymous";

/// Draft plus the number of consecutive periods to create.
#[derive(Debug, Deserialize)]
pub struct DraftBody {
    #[serde(default)]
    pub draft: ScheduleDraft,
    #[serde(default = "default_count")]
    pub count: i64,
}

fn default_count() -> i64 {
    1
}

fn form_session(headers: &HeaderMap) -> String {
    headers
        .get(FORM_SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS_SESSION)
        .to_string()
}

/// Loads a fresh reference snapshot for this request, if the backend has one.
async fn load_reference(s: &TimetableState) -> Result<Option<ReferenceData>, RepositoryError> {
    match &s.references {
        Some(source) => source.load_reference_data().await.map(Some),
        None => Ok(None),
    }
}

/// Converts RepositoryError to API response.
fn repository_error_to_response(error: RepositoryError) -> Response {
    let (status, message) = match &error {
        RepositoryError::NotFound { .. } => (StatusCode::NOT_FOUND, "Schedule not found"),
        RepositoryError::Rejected { status, .. } if *status < 500 => (
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST),
            "Schedule repository rejected the request",
        ),
        RepositoryError::Storage { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Schedule storage failed",
        ),
        _ => (
            StatusCode::BAD_GATEWAY,
            "Schedule repository request failed",
        ),
    };

    ApiErrorType::from((status, message, Some(error.to_string()))).into_response()
}

/// Converts SubmitError to API response.
fn submit_error_to_response(error: SubmitError) -> Response {
    let context = Some(error.to_string());
    match error {
        SubmitError::Validation(errors) => ApiErrorType::from((
            StatusCode::UNPROCESSABLE_ENTITY,
            "Validation failed",
            context,
        ))
        .with_details(json!({ "violations": errors.messages() }))
        .into_response(),
        SubmitError::Precondition(_) => ApiErrorType::from((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Slot generation failed",
            context,
        ))
        .into_response(),
        SubmitError::Repository(e) => repository_error_to_response(e),
        SubmitError::PartiallyCommitted {
            created,
            total,
            failed_position,
            failed_period,
            created_ids,
            ..
        } => ApiErrorType::from((
            StatusCode::BAD_GATEWAY,
            "Batch partially committed",
            context,
        ))
        .with_details(json!({
            "created": created,
            "total": total,
            "failed_position": failed_position,
            "failed_period": failed_period,
            "created_ids": created_ids,
        }))
        .into_response(),
        SubmitError::BatchRejected {
            total,
            failed_period,
            ..
        } => ApiErrorType::from((
            StatusCode::BAD_GATEWAY,
            "Batch not created",
            context,
        ))
        .with_details(json!({
            "created": 0,
            "total": total,
            "failed_position": 1,
            "failed_period": failed_period,
            "created_ids": [],
        }))
        .into_response(),
        SubmitError::InProgress => ApiErrorType::from((
            StatusCode::CONFLICT,
            "Submission already in progress",
            context,
        ))
        .into_response(),
    }
}

/// Runs one submission of `form` while holding the session's lock, then
/// drops the lock entry if no other request is using it.
async fn run_submission(
    s: &TimetableState,
    headers: &HeaderMap,
    form: ScheduleForm,
) -> Result<Vec<ScheduleId>, Response> {
    let session = form_session(headers);
    let lock = s.form_lock(&session);
    let result = match lock.try_lock() {
        Ok(_guard) => submit_locked(s, form).await,
        Err(_) => {
            warn!(session = %session, "Rejected concurrent submission");
            Err(submit_error_to_response(SubmitError::InProgress))
        }
    };
    drop(lock);
    s.release_form_lock(&session);
    result
}

async fn submit_locked(
    s: &TimetableState,
    mut form: ScheduleForm,
) -> Result<Vec<ScheduleId>, Response> {
    let reference = load_reference(s).await.map_err(|e| {
        error!(error = %e, "Failed to load reference data");
        repository_error_to_response(e)
    })?;

    form.submit(s.repository.as_ref(), reference.as_ref())
        .await
        .map_err(submit_error_to_response)
}

/// GET /schedules
/// Lists schedules, optionally filtered by class, day and teacher
pub async fn get_schedules(
    Query(filter): Query<ScheduleFilter>,
    State(s): State<Arc<TimetableState>>,
) -> Response {
    info!(?filter, "GET /schedules");

    match s.repository.list(&filter).await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => repository_error_to_response(e),
    }
}

/// POST /schedules/validate
/// Returns every violation for a draft without persisting anything
pub async fn post_validate(
    State(s): State<Arc<TimetableState>>,
    Json(body): Json<DraftBody>,
) -> Response {
    info!("POST /schedules/validate");

    let reference = match load_reference(&s).await {
        Ok(reference) => reference,
        Err(e) => return repository_error_to_response(e),
    };
    let validator = match &reference {
        Some(reference) => ScheduleValidator::with_reference(reference),
        None => ScheduleValidator::new(),
    };
    let violations = validator.violations(&body.draft, body.count);

    (
        StatusCode::OK,
        Json(json!({
            "valid": violations.is_empty(),
            "violations": violations,
        })),
    )
        .into_response()
}

/// POST /schedules/preview
/// Returns the period slots a create request would produce
pub async fn post_preview(
    State(s): State<Arc<TimetableState>>,
    Json(body): Json<DraftBody>,
) -> Response {
    info!(count = body.count, "POST /schedules/preview");

    let reference = match load_reference(&s).await {
        Ok(reference) => reference,
        Err(e) => return repository_error_to_response(e),
    };
    let validator = match &reference {
        Some(reference) => ScheduleValidator::with_reference(reference),
        None => ScheduleValidator::new(),
    };
    let validated = match validator.check(&body.draft, body.count) {
        Ok(validated) => validated,
        Err(errors) => return submit_error_to_response(SubmitError::Validation(errors)),
    };

    match generate_slots(&validated.slot_request()) {
        Ok(slots) => (StatusCode::OK, Json(json!({ "slots": slots }))).into_response(),
        Err(e) => submit_error_to_response(SubmitError::Precondition(e)),
    }
}

/// POST /schedules
/// Creates `count` consecutive periods from one draft
pub async fn post_schedules(
    State(s): State<Arc<TimetableState>>,
    headers: HeaderMap,
    Json(body): Json<DraftBody>,
) -> Response {
    info!(count = body.count, "POST /schedules");

    let form = ScheduleForm::create(body.draft, body.count);
    match run_submission(&s, &headers, form).await {
        Ok(ids) => (StatusCode::CREATED, Json(json!({ "ids": ids }))).into_response(),
        Err(response) => response,
    }
}

/// PUT /schedules/:id
/// Replaces one existing period
pub async fn put_schedule(
    Path(id): Path<i64>,
    State(s): State<Arc<TimetableState>>,
    headers: HeaderMap,
    Json(draft): Json<ScheduleDraft>,
) -> Response {
    info!("PUT /schedules/{}", id);

    let form = ScheduleForm::edit(ScheduleId(id), draft);
    match run_submission(&s, &headers, form).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "id": id }))).into_response(),
        Err(response) => response,
    }
}

/// DELETE /schedules/:id
pub async fn delete_schedule(
    Path(id): Path<i64>,
    State(s): State<Arc<TimetableState>>,
) -> Response {
    info!("DELETE /schedules/{}", id);

    match s.repository.delete(ScheduleId(id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => repository_error_to_response(e),
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::{
        RepositoryError, ScheduleFilter, ScheduleRepository, SqliteScheduleRepository,
    };
    use crate::schedule::{ScheduleId, ScheduleRecord};
    use crate::server::create_router;
    use crate::types::TimetableState;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn spawn(state: Arc<TimetableState>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn sqlite_state() -> Arc<TimetableState> {
        Arc::new(TimetableState::new(
            Arc::new(SqliteScheduleRepository::in_memory().unwrap()),
            None,
        ))
    }

    fn lesson_body(count: i64) -> Value {
        json!({
            "draft": {
                "class_id": 1,
                "day_of_week": "Senin",
                "activity_type": "lesson",
                "subject_id": 2,
                "teacher_ids": [9],
                "period_number": 1,
                "start_time": "08:00",
            },
            "count": count,
        })
    }

    /// Accepts `succeed` creates, then fails every later one.
    struct FailingAfter {
        succeed: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ScheduleRepository for FailingAfter {
        async fn create(&self, _record: &ScheduleRecord) -> Result<ScheduleId, RepositoryError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.succeed {
                Ok(ScheduleId(n as i64 + 1))
            } else {
                Err(RepositoryError::Network {
                    message: "connection reset".to_string(),
                })
            }
        }

        async fn update(&self, _id: ScheduleId, _record: &ScheduleRecord) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn delete(&self, _id: ScheduleId) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn list(&self, _filter: &ScheduleFilter) -> Result<Vec<ScheduleRecord>, RepositoryError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_create_batch_and_list() {
        let base = spawn(sqlite_state()).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{}/schedules", base))
            .json(&lesson_body(3))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["ids"].as_array().unwrap().len(), 3);

        let listed: Value = client
            .get(format!("{}/schedules?class_id=1&day_of_week=Senin", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let listed = listed.as_array().unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[2]["period_number"], 3);
        assert_eq!(listed[2]["start_time"], "09:30");
        assert_eq!(listed[2]["end_time"], "10:10");
        assert_eq!(listed[0]["teacher_id"], 9);
    }

    #[tokio::test]
    async fn test_validation_failure_is_422_with_all_messages() {
        let base = spawn(sqlite_state()).await;

        let response = reqwest::Client::new()
            .post(format!("{}/schedules", base))
            .json(&json!({ "draft": {}, "count": 1 }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 422);

        let body: Value = response.json().await.unwrap();
        let violations: Vec<&str> = body["details"]["violations"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(violations.contains(&"Class is required"));
        assert!(violations.contains(&"Day is required"));
        assert!(violations.contains(&"Start time is required"));
    }

    #[tokio::test]
    async fn test_validate_and_preview() {
        let base = spawn(sqlite_state()).await;
        let client = reqwest::Client::new();

        let validate: Value = client
            .post(format!("{}/schedules/validate", base))
            .json(&lesson_body(2))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(validate["valid"], true);

        let preview: Value = client
            .post(format!("{}/schedules/preview", base))
            .json(&lesson_body(2))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(
            preview["slots"],
            json!([
                { "period_number": 1, "start": "08:00", "end": "08:40" },
                { "period_number": 2, "start": "08:45", "end": "09:25" },
            ])
        );

        // Nothing was persisted
        let listed: Value = client
            .get(format!("{}/schedules", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn test_partial_commit_is_502() {
        let state = Arc::new(TimetableState::new(
            Arc::new(FailingAfter {
                succeed: 1,
                calls: AtomicUsize::new(0),
            }),
            None,
        ));
        let base = spawn(state).await;

        let response = reqwest::Client::new()
            .post(format!("{}/schedules", base))
            .json(&lesson_body(2))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 502);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "Batch partially committed");
        assert_eq!(body["details"]["created"], 1);
        assert_eq!(body["details"]["total"], 2);
        assert_eq!(body["details"]["failed_position"], 2);
        assert_eq!(body["details"]["failed_period"], 2);
        assert!(body["context"]
            .as_str()
            .unwrap()
            .starts_with("1 of 2 periods created"));
    }

    #[tokio::test]
    async fn test_first_slot_failure_is_not_a_partial_commit() {
        let state = Arc::new(TimetableState::new(
            Arc::new(FailingAfter {
                succeed: 0,
                calls: AtomicUsize::new(0),
            }),
            None,
        ));
        let base = spawn(state).await;

        let response = reqwest::Client::new()
            .post(format!("{}/schedules", base))
            .json(&lesson_body(2))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 502);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "Batch not created");
        assert_eq!(body["details"]["created"], 0);
        assert_eq!(body["details"]["failed_position"], 1);
        assert_eq!(body["details"]["failed_period"], 1);
    }

    #[tokio::test]
    async fn test_concurrent_submission_is_409() {
        let state = sqlite_state();
        let base = spawn(state.clone()).await;

        let lock = state.form_lock("form-1");
        let _held = lock.lock().await;

        let response = reqwest::Client::new()
            .post(format!("{}/schedules", base))
            .header("x-form-session", "form-1")
            .json(&lesson_body(1))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 409);
        // The rejected request must not evict the lock still held here
        assert_eq!(state.form_session_count(), 1);
    }

    #[tokio::test]
    async fn test_finished_submissions_release_session_locks() {
        let state = sqlite_state();
        let base = spawn(state.clone()).await;
        let client = reqwest::Client::new();

        for session in ["form-a", "form-b", "form-c"] {
            let response = client
                .post(format!("{}/schedules", base))
                .header("x-form-session", session)
                .json(&lesson_body(2))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status().as_u16(), 201);
        }
        let rejected = client
            .post(format!("{}/schedules", base))
            .header("x-form-session", "form-d")
            .json(&json!({ "draft": {}, "count": 1 }))
            .send()
            .await
            .unwrap();
        assert_eq!(rejected.status().as_u16(), 422);

        assert_eq!(state.form_session_count(), 0);
    }

    #[tokio::test]
    async fn test_edit_and_delete() {
        let base = spawn(sqlite_state()).await;
        let client = reqwest::Client::new();

        let created: Value = client
            .post(format!("{}/schedules", base))
            .json(&lesson_body(2))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let id = created["ids"][0].as_i64().unwrap();

        let response = client
            .put(format!("{}/schedules/{}", base, id))
            .json(&json!({
                "class_id": 1,
                "day_of_week": "Senin",
                "activity_type": "ceremony",
                "period_number": "1",
                "start_time": "07:00",
                "end_time": "07:45",
                "special_note": "Upacara bendera",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);

        let listed: Value = client
            .get(format!("{}/schedules", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listed[0]["activity_type"], "ceremony");
        assert_eq!(listed[0]["attendance_eligible"], false);
        assert_eq!(listed[0]["teacher_ids"], json!([]));

        let deleted = client
            .delete(format!("{}/schedules/{}", base, id))
            .send()
            .await
            .unwrap();
        assert_eq!(deleted.status().as_u16(), 204);

        let missing = client
            .delete(format!("{}/schedules/{}", base, id))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status().as_u16(), 404);
    }
}
