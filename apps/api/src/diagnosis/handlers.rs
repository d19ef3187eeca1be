//! Axum route handlers for consultations and the diagnosis relay.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::diagnosis::relay::DiagnosisReport;
use crate::diagnosis::schema::PatientInput;
use crate::errors::AppError;
use crate::extract::{ApiJson, ApiQuery};
use crate::models::consultation::{
    ConsultationHistory, ConsultationRow, NewConsultation, NewUserFeedback, Severity,
    UserFeedbackRow,
};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DiagnosisRequest {
    #[serde(rename = "consultationId")]
    pub consultation_id: Uuid,
    #[serde(flatten)]
    pub input: PatientInput,
}

#[derive(Debug, Deserialize)]
pub struct CreateConsultationRequest {
    #[serde(rename = "userId")]
    pub user_id: Option<Uuid>,
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub symptom_description: String,
    pub age: i32,
    pub duration_days: i32,
    pub severity: Severity,
    #[serde(default = "default_consent")]
    pub consent_given: bool,
}

fn default_consent() -> bool {
    true
}

impl CreateConsultationRequest {
    fn validate(&self) -> Result<(), AppError> {
        PatientInput {
            symptoms: self.symptoms.clone(),
            symptom_description: self.symptom_description.clone(),
            age: self.age,
            duration_days: self.duration_days,
            severity: self.severity,
            allergies: Vec::new(),
            chronic_conditions: Vec::new(),
        }
        .validate()
    }
}

#[derive(Debug, Deserialize)]
pub struct ConsultationListQuery {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    #[serde(rename = "userId")]
    pub user_id: Option<Uuid>,
    pub consultation_id: Uuid,
    pub diagnosis_id: Option<Uuid>,
    pub is_correct: bool,
    pub actual_condition: Option<String>,
    pub feedback_text: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/consultations
pub async fn handle_create_consultation(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateConsultationRequest>,
) -> Result<(StatusCode, Json<ConsultationRow>), AppError> {
    let user_id = req.user_id.ok_or(AppError::Unauthenticated)?;
    req.validate()?;

    let row = state
        .store
        .create_consultation(NewConsultation {
            user_id,
            symptoms: req.symptoms,
            symptom_description: req.symptom_description,
            age: req.age,
            duration_days: req.duration_days,
            severity: req.severity,
            consent_given: req.consent_given,
        })
        .await?;

    info!("Created consultation {} for user {user_id}", row.id);
    Ok((StatusCode::CREATED, Json(row)))
}

/// POST /api/v1/diagnosis
pub async fn handle_diagnosis(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<DiagnosisRequest>,
) -> Result<Json<DiagnosisReport>, AppError> {
    info!(
        "Diagnosis request for consultation {} ({} symptoms)",
        req.consultation_id,
        req.input.symptoms.len()
    );
    req.input.validate()?;

    if state.store.get_consultation(req.consultation_id).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "consultation {}",
            req.consultation_id
        )));
    }

    let report = state
        .diagnosis_relay()
        .run_diagnosis(req.consultation_id, &req.input)
        .await?;
    Ok(Json(report))
}

/// GET /api/v1/consultations?user_id=…
pub async fn handle_list_consultations(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ConsultationListQuery>,
) -> Result<Json<Vec<ConsultationHistory>>, AppError> {
    let user_id = params.user_id.ok_or(AppError::Unauthenticated)?;
    let history = state.store.list_consultations(user_id).await?;
    info!("Listed {} consultations for user {user_id}", history.len());
    Ok(Json(history))
}

/// POST /api/v1/feedback
pub async fn handle_submit_feedback(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<FeedbackRequest>,
) -> Result<(StatusCode, Json<UserFeedbackRow>), AppError> {
    let user_id = req.user_id.ok_or(AppError::Unauthenticated)?;

    // Another user's consultation is indistinguishable from a missing one.
    match state.store.get_consultation(req.consultation_id).await? {
        Some(consultation) if consultation.user_id == user_id => {}
        _ => {
            return Err(AppError::NotFound(format!(
                "consultation {}",
                req.consultation_id
            )))
        }
    }

    let row = state
        .store
        .insert_feedback(NewUserFeedback {
            user_id,
            consultation_id: req.consultation_id,
            diagnosis_id: req.diagnosis_id,
            is_correct: req.is_correct,
            actual_condition: req.actual_condition,
            feedback_text: req.feedback_text,
        })
        .await?;

    info!(
        "Recorded feedback {} on consultation {} (correct: {})",
        row.id, row.consultation_id, row.is_correct
    );
    Ok((StatusCode::CREATED, Json(row)))
}
