//! Persistence seam for both relays.
//!
//! Every operation is a single-row statement that commits on its own. There is
//! no transaction spanning a diagnosis and its drugs; callers handle partial
//! failure themselves.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::chat::{ChatMessageRow, NewChatMessage};
use crate::models::consultation::{
    AuditLogRow, ConsultationHistory, ConsultationRow, DiagnosisRow, DrugRecommendationRow,
    NewAuditLog, NewConsultation, NewDiagnosis, NewDrugRecommendation, NewUserFeedback,
    UserFeedbackRow,
};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Write rejected: {0}")]
    Rejected(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait RelayStore: Send + Sync {
    // --- Chat ---
    async fn insert_chat_message(&self, message: NewChatMessage) -> StoreResult<ChatMessageRow>;

    async fn list_chat_messages(
        &self,
        user_id: Uuid,
        consultation_id: Option<Uuid>,
    ) -> StoreResult<Vec<ChatMessageRow>>;

    // --- Consultations ---
    async fn create_consultation(
        &self,
        consultation: NewConsultation,
    ) -> StoreResult<ConsultationRow>;

    async fn get_consultation(&self, consultation_id: Uuid)
        -> StoreResult<Option<ConsultationRow>>;

    /// The user's consultations, newest first, each with its diagnoses
    /// (by ranking) and their drugs.
    async fn list_consultations(&self, user_id: Uuid) -> StoreResult<Vec<ConsultationHistory>>;

    /// Marks a pending consultation completed. Already-completed rows are left alone.
    async fn complete_consultation(&self, consultation_id: Uuid) -> StoreResult<()>;

    // --- Diagnosis results ---
    async fn insert_diagnosis(&self, diagnosis: NewDiagnosis) -> StoreResult<DiagnosisRow>;

    async fn insert_drug_recommendation(
        &self,
        drug: NewDrugRecommendation,
    ) -> StoreResult<DrugRecommendationRow>;

    async fn insert_audit_log(&self, entry: NewAuditLog) -> StoreResult<AuditLogRow>;

    // --- Feedback ---
    async fn insert_feedback(&self, feedback: NewUserFeedback) -> StoreResult<UserFeedbackRow>;
}
