//! `/api/patient`: the node's single patient profile.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tracing::info;

use healthguard_core::validation::validate_patient_update;
use healthguard_core::{CoreError, Patient, PatientUpdate};
use healthguard_db::DbError;

use super::AppState;
use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};

pub fn patient_routes() -> Router<AppState> {
    Router::new().route("/api/patient", get(get_patient).put(update_patient))
}

async fn get_patient(
    State(node): State<AppState>,
    _user: CurrentUser,
) -> ApiResult<Json<Patient>> {
    let patient = node
        .db()
        .patients()
        .get()
        .await?
        .ok_or(CoreError::PatientNotFound)?;
    Ok(Json(patient))
}

async fn update_patient(
    State(node): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(update): Json<PatientUpdate>,
) -> ApiResult<Json<Patient>> {
    validate_patient_update(&update)?;

    let patient = node
        .db()
        .patients()
        .update(&update)
        .await
        .map_err(|e| match e {
            DbError::NotFound { .. } => ApiError::from(CoreError::PatientNotFound),
            other => ApiError::from(other),
        })?;

    info!(patient = %patient.uuid, by = %user.username, "Patient profile updated");
    Ok(Json(patient))
}
