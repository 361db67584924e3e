use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::SubjectId;
use super::service::{ScreeningError, ScreeningService};
use super::sources::{ItemSource, RulesetSource};

/// Body of `POST /api/v1/screenings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningRequest {
    pub subject_ids: Vec<SubjectId>,
}

/// Body of `POST /api/v1/ruleset/patterns`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternEdit {
    pub list: String,
    pub pattern: String,
    #[serde(default)]
    pub points: Option<f64>,
}

#[derive(Serialize)]
struct Success<T> {
    ok: bool,
    #[serde(flatten)]
    body: T,
}

fn success<T: Serialize>(body: T) -> Response {
    (StatusCode::OK, Json(Success { ok: true, body })).into_response()
}

fn rejected(status: StatusCode, reason: &str, detail: String) -> Response {
    let payload = json!({
        "ok": false,
        "reason": reason,
        "detail": detail,
    });
    (status, Json(payload)).into_response()
}

fn invalid_body(rejection: JsonRejection) -> Response {
    rejected(rejection.status(), "invalid request body", rejection.body_text())
}

fn failure(error: &ScreeningError) -> Response {
    let status = match error {
        ScreeningError::NoItems(_) => StatusCode::NOT_FOUND,
        ScreeningError::ItemSource { .. } => StatusCode::BAD_GATEWAY,
        ScreeningError::RulesetUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ScreeningError::InvalidListKind(_) | ScreeningError::EmptyPattern => {
            StatusCode::BAD_REQUEST
        }
    };
    rejected(status, error.reason(), error.to_string())
}

/// Router builder exposing screening and ruleset maintenance endpoints.
pub fn screening_router<I, R>(service: Arc<ScreeningService<I, R>>) -> Router
where
    I: ItemSource + 'static,
    R: RulesetSource + 'static,
{
    Router::new()
        .route(
            "/api/v1/subjects/:subject_id/screening",
            get(subject_handler::<I, R>),
        )
        .route("/api/v1/screenings", post(subjects_handler::<I, R>))
        .route("/api/v1/ruleset", get(ruleset_handler::<I, R>))
        .route(
            "/api/v1/ruleset/patterns",
            post(modify_pattern_handler::<I, R>),
        )
        .route("/api/v1/ruleset/refresh", post(refresh_handler::<I, R>))
        .with_state(service)
}

pub(crate) async fn subject_handler<I, R>(
    State(service): State<Arc<ScreeningService<I, R>>>,
    Path(raw_id): Path<String>,
) -> Response
where
    I: ItemSource + 'static,
    R: RulesetSource + 'static,
{
    let Ok(subject_id) = raw_id.parse::<u64>() else {
        return rejected(
            StatusCode::BAD_REQUEST,
            "invalid subject id",
            format!("'{raw_id}' is not a numeric subject id"),
        );
    };

    match service.check_subject(SubjectId(subject_id)).await {
        Ok(report) => success(report),
        Err(error) => failure(&error),
    }
}

pub(crate) async fn subjects_handler<I, R>(
    State(service): State<Arc<ScreeningService<I, R>>>,
    request: Result<Json<ScreeningRequest>, JsonRejection>,
) -> Response
where
    I: ItemSource + 'static,
    R: RulesetSource + 'static,
{
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => return invalid_body(rejection),
    };
    match service.check_subjects(&request.subject_ids).await {
        Ok(report) => success(report),
        Err(error) => failure(&error),
    }
}

pub(crate) async fn modify_pattern_handler<I, R>(
    State(service): State<Arc<ScreeningService<I, R>>>,
    edit: Result<Json<PatternEdit>, JsonRejection>,
) -> Response
where
    I: ItemSource + 'static,
    R: RulesetSource + 'static,
{
    let Json(edit) = match edit {
        Ok(edit) => edit,
        Err(rejection) => return invalid_body(rejection),
    };
    match service
        .modify_pattern(&edit.list, &edit.pattern, edit.points)
        .await
    {
        Ok(snapshot) => success(json!({ "revision": snapshot.revision })),
        Err(error) => failure(&error),
    }
}

pub(crate) async fn ruleset_handler<I, R>(
    State(service): State<Arc<ScreeningService<I, R>>>,
) -> Response
where
    I: ItemSource + 'static,
    R: RulesetSource + 'static,
{
    match service.ruleset().await {
        Ok(snapshot) => success(snapshot.as_ref()),
        Err(error) => failure(&error),
    }
}

pub(crate) async fn refresh_handler<I, R>(
    State(service): State<Arc<ScreeningService<I, R>>>,
) -> Response
where
    I: ItemSource + 'static,
    R: RulesetSource + 'static,
{
    match service.refresh_ruleset().await {
        Ok(snapshot) => success(snapshot.as_ref()),
        Err(error) => failure(&error),
    }
}
