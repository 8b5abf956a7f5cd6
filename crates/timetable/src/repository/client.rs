//! HTTP client for the school's schedule service.
//!
//! Endpoints, relative to the configured base URL:
//! - `POST schedules` creates a record and answers `{"id": ...}`
//! - `PUT schedules/{id}` and `DELETE schedules/{id}`
//! - `GET schedules?class_id=&day_of_week=&teacher_id=` lists records
//! - `GET classes`, `subjects`, `teachers`, `rooms` list reference data
//!
//! Error bodies of the form `{"message": "..."}` are surfaced verbatim.

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

use super::error::RepositoryError;
use super::types::RecordPayload;
use super::{sort_for_listing, ReferenceSource, ScheduleFilter, ScheduleRepository};
use crate::reference::{ReferenceData, ReferenceItem};
use crate::schedule::{ScheduleId, ScheduleRecord};

const SCHEDULES_PATH: &str = "schedules";
const CORRELATION_HEADER: &str = "x-correlation-id";

/// Configuration for the schedule repository client.
#[derive(Debug, Clone)]
pub struct RepositoryClientConfig {
    /// Base URL of the schedule service, e.g. `http://localhost:3000/api/`
    pub base_url: String,
    /// Bearer token sent with every request
    pub api_token: Option<String>,
    pub connect_timeout: Duration,
    /// Per-request timeout; the engine itself has none
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for RepositoryClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000/api/".to_string(),
            api_token: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: format!("timetable/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Deserialize)]
struct CreatedBody {
    id: ScheduleId,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// Client for the remote schedule repository.
pub struct ScheduleRepositoryClient {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl ScheduleRepositoryClient {
    pub fn new(base_url: &str) -> Result<Self, RepositoryError> {
        Self::with_config(RepositoryClientConfig {
            base_url: base_url.to_string(),
            ..RepositoryClientConfig::default()
        })
    }

    pub fn with_config(config: RepositoryClientConfig) -> Result<Self, RepositoryError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RepositoryError::Network {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        // Url::join drops the last path segment unless the base ends with '/'
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(Self {
            client,
            base_url: Url::parse(&base)?,
            api_token: config.api_token,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RepositoryError> {
        Ok(self.base_url.join(path)?)
    }

    fn request(&self, method: Method, url: Url, correlation_id: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(CORRELATION_HEADER, correlation_id);
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends `builder`, logging timing and mapping non-2xx answers to errors.
    async fn send(
        &self,
        builder: RequestBuilder,
        operation: &str,
        correlation_id: &str,
    ) -> Result<Response, RepositoryError> {
        let start = Instant::now();
        let response = builder.send().await.map_err(|e| {
            error!(
                correlation_id = %correlation_id,
                operation = operation,
                error = %e,
                "Schedule repository request failed"
            );
            RepositoryError::from(e)
        })?;

        let status = response.status();
        debug!(
            correlation_id = %correlation_id,
            operation = operation,
            status = status.as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Schedule repository responded"
        );

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = extract_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

        warn!(
            correlation_id = %correlation_id,
            operation = operation,
            status = status.as_u16(),
            message = %message,
            "Schedule repository rejected request"
        );

        if status == StatusCode::NOT_FOUND {
            Err(RepositoryError::NotFound { message })
        } else {
            Err(RepositoryError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn fetch_reference_list(
        &self,
        path: &str,
        correlation_id: &str,
    ) -> Result<Vec<ReferenceItem>, RepositoryError> {
        let url = self.endpoint(path)?;
        let response = self
            .send(self.request(Method::GET, url, correlation_id), path, correlation_id)
            .await?;
        Ok(response.json().await?)
    }
}

/// Pulls a human-readable message out of an error body.
fn extract_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.message.or(parsed.error),
        Err(_) => Some(body.to_string()),
    }
}

#[async_trait]
impl ScheduleRepository for ScheduleRepositoryClient {
    async fn create(&self, record: &ScheduleRecord) -> Result<ScheduleId, RepositoryError> {
        let correlation_id = generate_correlation_id();
        let url = self.endpoint(SCHEDULES_PATH)?;
        let builder = self
            .request(Method::POST, url, &correlation_id)
            .json(&RecordPayload::from(record.clone()));

        let response = self.send(builder, "create", &correlation_id).await?;
        let body: CreatedBody = response.json().await?;

        info!(
            correlation_id = %correlation_id,
            id = %body.id,
            period = record.period_number,
            "Created schedule"
        );
        Ok(body.id)
    }

    async fn update(&self, id: ScheduleId, record: &ScheduleRecord) -> Result<(), RepositoryError> {
        let correlation_id = generate_correlation_id();
        let url = self.endpoint(&format!("{}/{}", SCHEDULES_PATH, id))?;
        let mut payload = RecordPayload::from(record.clone());
        payload.id = Some(id);

        let builder = self.request(Method::PUT, url, &correlation_id).json(&payload);
        self.send(builder, "update", &correlation_id).await?;

        info!(correlation_id = %correlation_id, id = %id, "Updated schedule");
        Ok(())
    }

    async fn delete(&self, id: ScheduleId) -> Result<(), RepositoryError> {
        let correlation_id = generate_correlation_id();
        let url = self.endpoint(&format!("{}/{}", SCHEDULES_PATH, id))?;

        self.send(
            self.request(Method::DELETE, url, &correlation_id),
            "delete",
            &correlation_id,
        )
        .await?;

        info!(correlation_id = %correlation_id, id = %id, "Deleted schedule");
        Ok(())
    }

    async fn list(&self, filter: &ScheduleFilter) -> Result<Vec<ScheduleRecord>, RepositoryError> {
        let correlation_id = generate_correlation_id();
        let url = self.endpoint(SCHEDULES_PATH)?;
        let builder = self.request(Method::GET, url, &correlation_id).query(filter);

        let response = self.send(builder, "list", &correlation_id).await?;
        let mut records: Vec<ScheduleRecord> = response.json().await?;
        // The service may ignore filters it does not know
        records.retain(|r| filter.matches(r));
        sort_for_listing(&mut records);

        debug!(
            correlation_id = %correlation_id,
            count = records.len(),
            "Listed schedules"
        );
        Ok(records)
    }
}

#[async_trait]
impl ReferenceSource for ScheduleRepositoryClient {
    async fn load_reference_data(&self) -> Result<ReferenceData, RepositoryError> {
        let correlation_id = generate_correlation_id();
        Ok(ReferenceData {
            classes: self.fetch_reference_list("classes", &correlation_id).await?,
            subjects: self.fetch_reference_list("subjects", &correlation_id).await?,
            teachers: self.fetch_reference_list("teachers", &correlation_id).await?,
            rooms: self.fetch_reference_list("rooms", &correlation_id).await?,
        })
    }
}

/// Generates a unique correlation ID for request tracing.
fn generate_correlation_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros();
    let random: u32 = rand::thread_rng().gen();
    format!("{:x}-{:08x}", timestamp & 0xFFFFFFFF, random)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{Activity, DayOfWeek, TeacherAssignment};
    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, put};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Store = Arc<Mutex<Vec<Value>>>;

    async fn create_schedule(
        State(store): State<Store>,
        Json(body): Json<Value>,
    ) -> (AxumStatus, Json<Value>) {
        if body["special_note"] == "reject me" {
            return (
                AxumStatus::UNPROCESSABLE_ENTITY,
                Json(json!({ "message": "Jadwal bentrok dengan jadwal lain" })),
            );
        }
        let mut store = store.lock().unwrap();
        let id = store.len() as i64 + 1;
        let mut stored = body.clone();
        stored["id"] = json!(id);
        store.push(stored);
        (AxumStatus::CREATED, Json(json!({ "id": id })))
    }

    async fn list_schedules(
        State(store): State<Store>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Vec<Value>> {
        let store = store.lock().unwrap();
        let records = store
            .iter()
            .filter(|r| match params.get("day_of_week") {
                Some(day) => r["day_of_week"] == day.as_str(),
                None => true,
            })
            .cloned()
            .collect();
        Json(records)
    }

    async fn update_schedule(Path(id): Path<i64>) -> AxumStatus {
        if id == 404 {
            AxumStatus::NOT_FOUND
        } else {
            AxumStatus::NO_CONTENT
        }
    }

    async fn spawn_service() -> String {
        let store: Store = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/api/schedules", get(list_schedules).post(create_schedule))
            .route("/api/schedules/:id", put(update_schedule))
            .route(
                "/api/classes",
                get(|| async { Json(json!([{ "id": 1, "name": "VII-A" }])) }),
            )
            .route("/api/subjects", get(|| async { Json(json!([])) }))
            .route("/api/teachers", get(|| async { Json(json!([{ "id": 9, "name": "Bu Sari" }])) }))
            .route("/api/rooms", get(|| async { Json(json!([])) }))
            .with_state(store);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/api", address)
    }

    fn record(day: DayOfWeek, period: u8) -> ScheduleRecord {
        ScheduleRecord {
            id: None,
            class_id: 1,
            day_of_week: day,
            period_number: period,
            start_time: "07:00".parse().unwrap(),
            end_time: "07:40".parse().unwrap(),
            room_id: None,
            activity: Activity::Lesson {
                subject_id: 2,
                teachers: TeacherAssignment::from(vec![9]),
            },
        }
    }

    #[test]
    fn test_extract_message() {
        assert_eq!(
            extract_message(r#"{"message":"Kelas tidak ditemukan"}"#),
            Some("Kelas tidak ditemukan".to_string())
        );
        assert_eq!(
            extract_message(r#"{"error":"Unauthorized"}"#),
            Some("Unauthorized".to_string())
        );
        assert_eq!(extract_message("plain failure"), Some("plain failure".to_string()));
        assert_eq!(extract_message("   "), None);
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = ScheduleRepositoryClient::new("http://example.test/api").unwrap();
        assert_eq!(
            client.endpoint("schedules").unwrap().as_str(),
            "http://example.test/api/schedules"
        );
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let client = ScheduleRepositoryClient::new(&spawn_service().await).unwrap();

        let first = client.create(&record(DayOfWeek::Tuesday, 2)).await.unwrap();
        let second = client.create(&record(DayOfWeek::Monday, 1)).await.unwrap();
        assert_eq!(first, ScheduleId(1));
        assert_eq!(second, ScheduleId(2));

        let all = client.list(&ScheduleFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].day_of_week, DayOfWeek::Monday);

        let tuesday = client
            .list(&ScheduleFilter::for_class(1).on_day(DayOfWeek::Tuesday))
            .await
            .unwrap();
        assert_eq!(tuesday.len(), 1);
        assert_eq!(tuesday[0].id, Some(ScheduleId(1)));
    }

    #[tokio::test]
    async fn test_rejection_message_is_verbatim() {
        let client = ScheduleRepositoryClient::new(&spawn_service().await).unwrap();
        let mut rejected = record(DayOfWeek::Monday, 1);
        rejected.activity = Activity::Other {
            kind: crate::schedule::NonLessonKind::Other,
            special_note: "reject me".to_string(),
        };

        let err = client.create(&rejected).await.unwrap_err();
        assert_eq!(
            err,
            RepositoryError::Rejected {
                status: 422,
                message: "Jadwal bentrok dengan jadwal lain".to_string(),
            }
        );
        assert_eq!(err.to_string(), "Jadwal bentrok dengan jadwal lain");
    }

    #[tokio::test]
    async fn test_update_not_found() {
        let client = ScheduleRepositoryClient::new(&spawn_service().await).unwrap();
        client
            .update(ScheduleId(3), &record(DayOfWeek::Monday, 1))
            .await
            .unwrap();
        let err = client
            .update(ScheduleId(404), &record(DayOfWeek::Monday, 1))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_load_reference_data() {
        let client = ScheduleRepositoryClient::new(&spawn_service().await).unwrap();
        let reference = client.load_reference_data().await.unwrap();
        assert!(reference.has_class(1));
        assert!(reference.has_teacher(9));
        assert!(!reference.has_room(1));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_network_error() {
        let client = ScheduleRepositoryClient::with_config(RepositoryClientConfig {
            base_url: "http://127.0.0.1:9/api".to_string(),
            connect_timeout: Duration::from_millis(200),
            request_timeout: Duration::from_millis(500),
            ..RepositoryClientConfig::default()
        })
        .unwrap();

        let err = client.delete(ScheduleId(1)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Network { .. }));
        assert!(err.is_retryable());
    }
}
