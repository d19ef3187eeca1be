use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        }
    }
}

/// Only ever moves pending → completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    Pending,
    Completed,
}

impl ConsultationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Pending => "pending",
            ConsultationStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Oral,
    Injection,
    Topical,
    Inhalation,
    Sublingual,
    Rectal,
    Transdermal,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Oral => "oral",
            Route::Injection => "injection",
            Route::Topical => "topical",
            Route::Inhalation => "inhalation",
            Route::Sublingual => "sublingual",
            Route::Rectal => "rectal",
            Route::Transdermal => "transdermal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timing {
    BeforeMeal,
    AfterMeal,
    WithMeal,
    EmptyStomach,
    Bedtime,
    AsNeeded,
}

impl Timing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timing::BeforeMeal => "before_meal",
            Timing::AfterMeal => "after_meal",
            Timing::WithMeal => "with_meal",
            Timing::EmptyStomach => "empty_stomach",
            Timing::Bedtime => "bedtime",
            Timing::AsNeeded => "as_needed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConsultationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub symptoms: Vec<String>,
    pub symptom_description: String,
    pub age: i32,
    pub duration_days: i32,
    pub severity: String,
    pub status: String,
    pub consent_given: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewConsultation {
    pub user_id: Uuid,
    pub symptoms: Vec<String>,
    pub symptom_description: String,
    pub age: i32,
    pub duration_days: i32,
    pub severity: Severity,
    pub consent_given: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DiagnosisRow {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub disease_name: String,
    pub confidence_score: f64,
    pub ranking: i32,
    /// symptom name → relevance in [0, 1]
    pub symptom_relevance: Value,
    pub explanation: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDiagnosis {
    pub consultation_id: Uuid,
    pub disease_name: String,
    pub confidence_score: f64,
    pub ranking: i32,
    pub symptom_relevance: Value,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DrugRecommendationRow {
    pub id: Uuid,
    pub diagnosis_id: Uuid,
    pub drug_name: String,
    pub generic_name: String,
    pub drug_class: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub route: String,
    pub timing: String,
    pub contraindications: Vec<String>,
    pub side_effects: Vec<String>,
    pub warnings: Vec<String>,
    pub is_safe: bool,
    pub safety_notes: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDrugRecommendation {
    pub diagnosis_id: Uuid,
    pub drug_name: String,
    pub generic_name: String,
    pub drug_class: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub route: Route,
    pub timing: Timing,
    pub contraindications: Vec<String>,
    pub side_effects: Vec<String>,
    pub warnings: Vec<String>,
    pub is_safe: bool,
    pub safety_notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLogRow {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub action: String,
    pub model_version: String,
    pub confidence_scores: Value,
    pub input_data: Value,
    pub output_data: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub consultation_id: Uuid,
    pub action: String,
    pub model_version: String,
    pub confidence_scores: Value,
    pub input_data: Value,
    pub output_data: Value,
}

/// A persisted diagnosis together with the drugs persisted under it.
#[derive(Debug, Clone, Serialize)]
pub struct StoredDiagnosis {
    #[serde(flatten)]
    pub diagnosis: DiagnosisRow,
    pub drugs: Vec<DrugRecommendationRow>,
}

/// One consultation with everything recorded under it, as the dashboard reads it.
#[derive(Debug, Clone, Serialize)]
pub struct ConsultationHistory {
    #[serde(flatten)]
    pub consultation: ConsultationRow,
    pub diagnoses: Vec<StoredDiagnosis>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserFeedbackRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub consultation_id: Uuid,
    pub diagnosis_id: Option<Uuid>,
    pub is_correct: bool,
    pub actual_condition: Option<String>,
    pub feedback_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUserFeedback {
    pub user_id: Uuid,
    pub consultation_id: Uuid,
    pub diagnosis_id: Option<Uuid>,
    pub is_correct: bool,
    pub actual_condition: Option<String>,
    pub feedback_text: Option<String>,
}
