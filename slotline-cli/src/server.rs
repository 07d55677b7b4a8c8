use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, FromRequestParts, Path, Request, State},
    http::{request::Parts, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use slotline_core::client::SlotClient;
use slotline_core::network::DoctorNetwork;
use slotline_core::types::{
    Appointment, ClaimOutcome, Doctor, Identity, Patient, ReleaseOutcome, Role,
};
use slotline_core::SlotError;

use crate::handlers::*;

pub type AppState = Arc<SlotClient>;

/// Header carrying the caller identity returned by `POST /login`, as `<role>:<id>`.
pub const IDENTITY_HEADER: &str = "x-slotline-identity";

pub async fn run(host: &str, port: u16, client: SlotClient, body_limit: usize) -> std::io::Result<()> {
    let state: AppState = Arc::new(client);
    let app = router(state).layer(DefaultBodyLimit::max(body_limit));

    let addr = format!("{}:{}", host, port);

    if std::env::var("SLOTLINE_API_KEY").is_ok() {
        tracing::info!("🔐 API key authentication enabled");
    } else {
        tracing::warn!("⚠️  No SLOTLINE_API_KEY set — server is open (dev mode)");
    }

    tracing::info!("🗓️  Slotline server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // Health is always open (no auth)
        .route("/health", get(health))
        .route("/login", post(login))
        .route("/doctors", get(list_doctors))
        .route("/appointments", post(create_appointment))
        .route("/appointments/open", get(list_open))
        .route("/appointments/mine", get(list_mine))
        .route("/appointments/{id}/claim", post(claim_appointment))
        .route("/appointments/{id}/assign", post(assign_doctor))
        .route("/appointments/{id}/release", post(release_appointment))
        .route("/appointments/{id}/notes", patch(update_notes))
        .route("/network", get(doctor_network))
        .route("/patients", get(list_patients).post(add_patient))
        .layer(middleware::from_fn(auth_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─── Auth Middleware ────────────────────────────────────────────────────────

async fn auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // If no API key is configured, allow all requests (dev mode)
    let expected_key = match std::env::var("SLOTLINE_API_KEY") {
        Ok(key) if !key.is_empty() => key,
        _ => return Ok(next.run(request).await),
    };

    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let auth_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth_header.strip_prefix("Bearer ").unwrap_or("");

    if token == expected_key {
        Ok(next.run(request).await)
    } else {
        tracing::warn!("🚫 Unauthorized request to {}", request.uri().path());
        Err(StatusCode::UNAUTHORIZED)
    }
}

// ─── Caller Identity ────────────────────────────────────────────────────────

/// The resolved caller, taken from the identity header on every request.
pub struct Caller(pub Identity);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(IDENTITY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ApiError(SlotError::Unauthorized(format!(
                    "missing {} header, log in first",
                    IDENTITY_HEADER
                )))
            })?;
        raw.parse::<Identity>().map(Caller).map_err(ApiError)
    }
}

// ─── Errors ─────────────────────────────────────────────────────────────────

pub struct ApiError(pub SlotError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            SlotError::Validation(_) => StatusCode::BAD_REQUEST,
            SlotError::NotFound(_) => StatusCode::NOT_FOUND,
            SlotError::InvalidTransition { .. } | SlotError::Conflict { .. } => {
                StatusCode::CONFLICT
            }
            SlotError::Unauthorized(_) => StatusCode::FORBIDDEN,
            SlotError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<SlotError> for ApiError {
    fn from(err: SlotError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.0.code(), error = %self.0, "Request failed");
        } else {
            tracing::info!(code = self.0.code(), error = %self.0, "Request rejected");
        }
        (
            status,
            Json(ApiResponse::<()>::err(self.0.code(), self.0.to_string())),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Runs a kernel call on the blocking pool; store calls may block on I/O.
async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&SlotClient) -> Result<T, SlotError> + Send + 'static,
    T: Send + 'static,
{
    let client = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&client))
        .await
        .map_err(|e| ApiError(SlotError::StoreUnavailable(format!("worker failed: {}", e))))?
        .map_err(ApiError)
}

fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

// ─── Handlers ───────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> ApiResult<HealthResponse> {
    let appointments = blocking(&state, |client| client.stats()).await?;
    ok(HealthResponse {
        status: "ok".to_string(),
        appointments,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    req.validate().map_err(SlotError::Validation)?;

    let identity = blocking(&state, move |client| client.login(&req.name)).await?;
    tracing::info!(identity = %identity, "Caller logged in");
    ok(LoginResponse::from(identity))
}

async fn list_doctors(State(state): State<AppState>) -> ApiResult<Vec<Doctor>> {
    ok(blocking(&state, |client| client.doctors()).await?)
}

async fn create_appointment(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Appointment>>), ApiError> {
    req.validate().map_err(SlotError::Validation)?;

    let new = req.into_new_appointment(&caller);
    let appointment = blocking(&state, move |client| client.create(&caller, &new)).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(appointment))))
}

async fn list_open(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ApiResult<Vec<Appointment>> {
    ok(blocking(&state, move |client| client.list_open(&caller)).await?)
}

/// A doctor's bookings, or all of a clinic's appointments.
async fn list_mine(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ApiResult<Vec<Appointment>> {
    ok(blocking(&state, move |client| match caller.role {
        Role::Doctor => client.list_by_doctor(&caller),
        Role::Clinic => client.list_by_clinic(&caller),
    })
    .await?)
}

async fn claim_appointment(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> ApiResult<ClaimOutcome> {
    ok(blocking(&state, move |client| client.claim(&caller, &id)).await?)
}

async fn assign_doctor(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Json(req): Json<AssignDoctorRequest>,
) -> ApiResult<ClaimOutcome> {
    req.validate().map_err(SlotError::Validation)?;
    ok(blocking(&state, move |client| client.assign(&caller, &id, &req.doctor_id)).await?)
}

async fn release_appointment(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> ApiResult<ReleaseOutcome> {
    ok(blocking(&state, move |client| client.release(&caller, &id)).await?)
}

async fn update_notes(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Json(req): Json<UpdateNotesRequest>,
) -> ApiResult<Appointment> {
    ok(blocking(&state, move |client| {
        client.update_notes(&caller, &id, req.notes.as_deref())
    })
    .await?)
}

async fn doctor_network(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ApiResult<DoctorNetwork> {
    ok(blocking(&state, move |client| client.doctor_network(&caller)).await?)
}

async fn list_patients(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ApiResult<Vec<Patient>> {
    ok(blocking(&state, move |client| client.patients(&caller)).await?)
}

async fn add_patient(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<AddPatientRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Patient>>), ApiError> {
    req.validate().map_err(SlotError::Validation)?;
    let patient = blocking(&state, move |client| client.add_patient(&caller, &req.name)).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(patient))))
}

// ─── Storage Backend Selection ──────────────────────────────────────────────

/// Build the client for a `--storage` value. A backend that cannot be opened
/// is a startup failure; there is no silent in-memory fallback.
pub fn create_client(storage: &str) -> Result<SlotClient, String> {
    if storage == "memory" {
        tracing::info!("💾 Storage backend: in-memory (appointments will not persist)");
        return Ok(SlotClient::new());
    }
    let Some(path) = storage.strip_prefix("sqlite:") else {
        return Err(format!(
            "unknown storage backend '{}'. Use 'memory' or 'sqlite:<path>'",
            storage
        ));
    };

    #[cfg(feature = "sqlite")]
    {
        tracing::info!("💾 Storage backend: SQLite ({})", path);
        SlotClient::with_sqlite(path).map_err(|e| format!("failed to open SQLite '{}': {}", path, e))
    }
    #[cfg(not(feature = "sqlite"))]
    {
        Err(format!(
            "SQLite storage '{}' requested but the `sqlite` feature is not enabled. \
             Rebuild with: cargo build --features sqlite",
            path
        ))
    }
}
