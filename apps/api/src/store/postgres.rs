use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::chat::{ChatMessageRow, NewChatMessage};
use crate::models::consultation::{
    AuditLogRow, ConsultationHistory, ConsultationRow, ConsultationStatus, DiagnosisRow,
    DrugRecommendationRow, NewAuditLog, NewConsultation, NewDiagnosis, NewDrugRecommendation,
    NewUserFeedback, StoredDiagnosis, UserFeedbackRow,
};
use crate::store::{RelayStore, StoreResult};

/// `RelayStore` over a Postgres pool. Each call is one auto-committed statement.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RelayStore for PgStore {
    async fn insert_chat_message(&self, message: NewChatMessage) -> StoreResult<ChatMessageRow> {
        Ok(sqlx::query_as::<_, ChatMessageRow>(
            r#"
            INSERT INTO chat_messages (user_id, consultation_id, role, content)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(message.user_id)
        .bind(message.consultation_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_chat_messages(
        &self,
        user_id: Uuid,
        consultation_id: Option<Uuid>,
    ) -> StoreResult<Vec<ChatMessageRow>> {
        Ok(sqlx::query_as::<_, ChatMessageRow>(
            r#"
            SELECT * FROM chat_messages
            WHERE user_id = $1
              AND ($2::uuid IS NULL OR consultation_id = $2)
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .bind(consultation_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_consultation(
        &self,
        consultation: NewConsultation,
    ) -> StoreResult<ConsultationRow> {
        Ok(sqlx::query_as::<_, ConsultationRow>(
            r#"
            INSERT INTO consultations
                (user_id, symptoms, symptom_description, age, duration_days,
                 severity, status, consent_given)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(consultation.user_id)
        .bind(&consultation.symptoms)
        .bind(&consultation.symptom_description)
        .bind(consultation.age)
        .bind(consultation.duration_days)
        .bind(consultation.severity.as_str())
        .bind(ConsultationStatus::Pending.as_str())
        .bind(consultation.consent_given)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn get_consultation(
        &self,
        consultation_id: Uuid,
    ) -> StoreResult<Option<ConsultationRow>> {
        Ok(
            sqlx::query_as::<_, ConsultationRow>("SELECT * FROM consultations WHERE id = $1")
                .bind(consultation_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_consultations(&self, user_id: Uuid) -> StoreResult<Vec<ConsultationHistory>> {
        let consultations = sqlx::query_as::<_, ConsultationRow>(
            "SELECT * FROM consultations WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let consultation_ids: Vec<Uuid> = consultations.iter().map(|c| c.id).collect();
        let diagnoses = sqlx::query_as::<_, DiagnosisRow>(
            r#"
            SELECT * FROM diagnoses
            WHERE consultation_id = ANY($1)
            ORDER BY ranking ASC, created_at ASC
            "#,
        )
        .bind(&consultation_ids)
        .fetch_all(&self.pool)
        .await?;

        let diagnosis_ids: Vec<Uuid> = diagnoses.iter().map(|d| d.id).collect();
        let drugs = sqlx::query_as::<_, DrugRecommendationRow>(
            r#"
            SELECT * FROM drug_recommendations
            WHERE diagnosis_id = ANY($1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(&diagnosis_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(assemble_history(consultations, diagnoses, drugs))
    }

    async fn complete_consultation(&self, consultation_id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE consultations SET status = $1 WHERE id = $2 AND status = $3")
            .bind(ConsultationStatus::Completed.as_str())
            .bind(consultation_id)
            .bind(ConsultationStatus::Pending.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_diagnosis(&self, diagnosis: NewDiagnosis) -> StoreResult<DiagnosisRow> {
        Ok(sqlx::query_as::<_, DiagnosisRow>(
            r#"
            INSERT INTO diagnoses
                (consultation_id, disease_name, confidence_score, ranking,
                 symptom_relevance, explanation)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(diagnosis.consultation_id)
        .bind(&diagnosis.disease_name)
        .bind(diagnosis.confidence_score)
        .bind(diagnosis.ranking)
        .bind(&diagnosis.symptom_relevance)
        .bind(&diagnosis.explanation)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn insert_drug_recommendation(
        &self,
        drug: NewDrugRecommendation,
    ) -> StoreResult<DrugRecommendationRow> {
        Ok(sqlx::query_as::<_, DrugRecommendationRow>(
            r#"
            INSERT INTO drug_recommendations
                (diagnosis_id, drug_name, generic_name, drug_class, dosage, frequency,
                 duration, route, timing, contraindications, side_effects, warnings,
                 is_safe, safety_notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(drug.diagnosis_id)
        .bind(&drug.drug_name)
        .bind(&drug.generic_name)
        .bind(&drug.drug_class)
        .bind(&drug.dosage)
        .bind(&drug.frequency)
        .bind(&drug.duration)
        .bind(drug.route.as_str())
        .bind(drug.timing.as_str())
        .bind(&drug.contraindications)
        .bind(&drug.side_effects)
        .bind(&drug.warnings)
        .bind(drug.is_safe)
        .bind(&drug.safety_notes)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn insert_audit_log(&self, entry: NewAuditLog) -> StoreResult<AuditLogRow> {
        Ok(sqlx::query_as::<_, AuditLogRow>(
            r#"
            INSERT INTO audit_logs
                (consultation_id, action, model_version, confidence_scores,
                 input_data, output_data)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(entry.consultation_id)
        .bind(&entry.action)
        .bind(&entry.model_version)
        .bind(&entry.confidence_scores)
        .bind(&entry.input_data)
        .bind(&entry.output_data)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn insert_feedback(&self, feedback: NewUserFeedback) -> StoreResult<UserFeedbackRow> {
        Ok(sqlx::query_as::<_, UserFeedbackRow>(
            r#"
            INSERT INTO user_feedback
                (user_id, consultation_id, diagnosis_id, is_correct,
                 actual_condition, feedback_text)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(feedback.user_id)
        .bind(feedback.consultation_id)
        .bind(feedback.diagnosis_id)
        .bind(feedback.is_correct)
        .bind(&feedback.actual_condition)
        .bind(&feedback.feedback_text)
        .fetch_one(&self.pool)
        .await?)
    }
}

/// Nests drugs under their diagnoses and diagnoses under their consultations,
/// keeping the order of each input list.
pub(crate) fn assemble_history(
    consultations: Vec<ConsultationRow>,
    diagnoses: Vec<DiagnosisRow>,
    drugs: Vec<DrugRecommendationRow>,
) -> Vec<ConsultationHistory> {
    let mut drugs_by_diagnosis: HashMap<Uuid, Vec<DrugRecommendationRow>> = HashMap::new();
    for drug in drugs {
        drugs_by_diagnosis.entry(drug.diagnosis_id).or_default().push(drug);
    }

    let mut diagnoses_by_consultation: HashMap<Uuid, Vec<StoredDiagnosis>> = HashMap::new();
    for diagnosis in diagnoses {
        let drugs = drugs_by_diagnosis.remove(&diagnosis.id).unwrap_or_default();
        diagnoses_by_consultation
            .entry(diagnosis.consultation_id)
            .or_default()
            .push(StoredDiagnosis { diagnosis, drugs });
    }

    consultations
        .into_iter()
        .map(|consultation| ConsultationHistory {
            diagnoses: diagnoses_by_consultation
                .remove(&consultation.id)
                .unwrap_or_default(),
            consultation,
        })
        .collect()
}
