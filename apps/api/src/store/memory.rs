//! In-memory `RelayStore` with failure injection, for relay and route tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::chat::{ChatMessageRow, ChatRole, NewChatMessage};
use crate::models::consultation::{
    AuditLogRow, ConsultationHistory, ConsultationRow, ConsultationStatus, DiagnosisRow,
    DrugRecommendationRow, NewAuditLog, NewConsultation, NewDiagnosis, NewDrugRecommendation,
    NewUserFeedback, UserFeedbackRow,
};
use crate::store::postgres::assemble_history;
use crate::store::{RelayStore, StoreError, StoreResult};

#[derive(Default)]
pub struct Tables {
    pub chat_messages: Vec<ChatMessageRow>,
    pub consultations: Vec<ConsultationRow>,
    pub diagnoses: Vec<DiagnosisRow>,
    pub drugs: Vec<DrugRecommendationRow>,
    pub audit_logs: Vec<AuditLogRow>,
    pub feedback: Vec<UserFeedbackRow>,
    diagnosis_attempts: usize,
    failing_diagnosis_attempts: HashSet<usize>,
    failing_drug_names: HashSet<String>,
    failing_chat_roles: HashSet<&'static str>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The nth diagnosis insert (1-based) fails.
    pub fn fail_diagnosis_attempt(self, n: usize) -> Self {
        self.tables.lock().unwrap().failing_diagnosis_attempts.insert(n);
        self
    }

    pub fn fail_drug(self, drug_name: &str) -> Self {
        self.tables
            .lock()
            .unwrap()
            .failing_drug_names
            .insert(drug_name.to_string());
        self
    }

    pub fn fail_chat_role(self, role: ChatRole) -> Self {
        self.tables
            .lock()
            .unwrap()
            .failing_chat_roles
            .insert(role.as_str());
        self
    }

    pub fn with<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        f(&self.tables.lock().unwrap())
    }

    pub fn seed_consultation(&self, user_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.lock().unwrap().consultations.push(ConsultationRow {
            id,
            user_id,
            symptoms: vec!["Headache".to_string()],
            symptom_description: "Dull ache".to_string(),
            age: 30,
            duration_days: 2,
            severity: "mild".to_string(),
            status: ConsultationStatus::Pending.as_str().to_string(),
            consent_given: true,
            created_at: Utc::now(),
        });
        id
    }

    pub fn consultation_status(&self, id: Uuid) -> Option<String> {
        self.with(|t| {
            t.consultations
                .iter()
                .find(|c| c.id == id)
                .map(|c| c.status.clone())
        })
    }
}

#[async_trait]
impl RelayStore for MemoryStore {
    async fn insert_chat_message(&self, message: NewChatMessage) -> StoreResult<ChatMessageRow> {
        let mut tables = self.tables.lock().unwrap();
        if tables.failing_chat_roles.contains(message.role.as_str()) {
            return Err(StoreError::Rejected("chat insert failed".to_string()));
        }
        let row = ChatMessageRow {
            id: Uuid::new_v4(),
            user_id: message.user_id,
            consultation_id: message.consultation_id,
            role: message.role.as_str().to_string(),
            content: message.content,
            created_at: Utc::now(),
        };
        tables.chat_messages.push(row.clone());
        Ok(row)
    }

    async fn list_chat_messages(
        &self,
        user_id: Uuid,
        consultation_id: Option<Uuid>,
    ) -> StoreResult<Vec<ChatMessageRow>> {
        Ok(self.with(|t| {
            t.chat_messages
                .iter()
                .filter(|m| m.user_id == user_id)
                .filter(|m| consultation_id.is_none() || m.consultation_id == consultation_id)
                .cloned()
                .collect()
        }))
    }

    async fn create_consultation(
        &self,
        consultation: NewConsultation,
    ) -> StoreResult<ConsultationRow> {
        let row = ConsultationRow {
            id: Uuid::new_v4(),
            user_id: consultation.user_id,
            symptoms: consultation.symptoms,
            symptom_description: consultation.symptom_description,
            age: consultation.age,
            duration_days: consultation.duration_days,
            severity: consultation.severity.as_str().to_string(),
            status: ConsultationStatus::Pending.as_str().to_string(),
            consent_given: consultation.consent_given,
            created_at: Utc::now(),
        };
        self.tables.lock().unwrap().consultations.push(row.clone());
        Ok(row)
    }

    async fn get_consultation(
        &self,
        consultation_id: Uuid,
    ) -> StoreResult<Option<ConsultationRow>> {
        Ok(self.with(|t| {
            t.consultations
                .iter()
                .find(|c| c.id == consultation_id)
                .cloned()
        }))
    }

    async fn list_consultations(&self, user_id: Uuid) -> StoreResult<Vec<ConsultationHistory>> {
        let (consultations, diagnoses, drugs) = self.with(|t| {
            // Insertion order breaks timestamp ties.
            let mut consultations: Vec<ConsultationRow> = t
                .consultations
                .iter()
                .rev()
                .filter(|c| c.user_id == user_id)
                .cloned()
                .collect();
            consultations.sort_by(|a, b| b.created_at.cmp(&a.created_at));

            let mut diagnoses: Vec<DiagnosisRow> = t
                .diagnoses
                .iter()
                .filter(|d| consultations.iter().any(|c| c.id == d.consultation_id))
                .cloned()
                .collect();
            diagnoses.sort_by_key(|d| d.ranking);

            let drugs: Vec<DrugRecommendationRow> = t
                .drugs
                .iter()
                .filter(|r| diagnoses.iter().any(|d| d.id == r.diagnosis_id))
                .cloned()
                .collect();
            (consultations, diagnoses, drugs)
        });
        Ok(assemble_history(consultations, diagnoses, drugs))
    }

    async fn complete_consultation(&self, consultation_id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(row) = tables
            .consultations
            .iter_mut()
            .find(|c| c.id == consultation_id && c.status == ConsultationStatus::Pending.as_str())
        {
            row.status = ConsultationStatus::Completed.as_str().to_string();
        }
        Ok(())
    }

    async fn insert_diagnosis(&self, diagnosis: NewDiagnosis) -> StoreResult<DiagnosisRow> {
        let mut tables = self.tables.lock().unwrap();
        tables.diagnosis_attempts += 1;
        if tables
            .failing_diagnosis_attempts
            .contains(&tables.diagnosis_attempts)
        {
            return Err(StoreError::Rejected("diagnosis insert failed".to_string()));
        }
        let row = DiagnosisRow {
            id: Uuid::new_v4(),
            consultation_id: diagnosis.consultation_id,
            disease_name: diagnosis.disease_name,
            confidence_score: diagnosis.confidence_score,
            ranking: diagnosis.ranking,
            symptom_relevance: diagnosis.symptom_relevance,
            explanation: diagnosis.explanation,
            created_at: Utc::now(),
        };
        tables.diagnoses.push(row.clone());
        Ok(row)
    }

    async fn insert_drug_recommendation(
        &self,
        drug: NewDrugRecommendation,
    ) -> StoreResult<DrugRecommendationRow> {
        let mut tables = self.tables.lock().unwrap();
        if tables.failing_drug_names.contains(&drug.drug_name) {
            return Err(StoreError::Rejected("drug insert failed".to_string()));
        }
        let row = DrugRecommendationRow {
            id: Uuid::new_v4(),
            diagnosis_id: drug.diagnosis_id,
            drug_name: drug.drug_name,
            generic_name: drug.generic_name,
            drug_class: drug.drug_class,
            dosage: drug.dosage,
            frequency: drug.frequency,
            duration: drug.duration,
            route: drug.route.as_str().to_string(),
            timing: drug.timing.as_str().to_string(),
            contraindications: drug.contraindications,
            side_effects: drug.side_effects,
            warnings: drug.warnings,
            is_safe: drug.is_safe,
            safety_notes: drug.safety_notes,
            created_at: Utc::now(),
        };
        tables.drugs.push(row.clone());
        Ok(row)
    }

    async fn insert_audit_log(&self, entry: NewAuditLog) -> StoreResult<AuditLogRow> {
        let row = AuditLogRow {
            id: Uuid::new_v4(),
            consultation_id: entry.consultation_id,
            action: entry.action,
            model_version: entry.model_version,
            confidence_scores: entry.confidence_scores,
            input_data: entry.input_data,
            output_data: entry.output_data,
            created_at: Utc::now(),
        };
        self.tables.lock().unwrap().audit_logs.push(row.clone());
        Ok(row)
    }

    async fn insert_feedback(&self, feedback: NewUserFeedback) -> StoreResult<UserFeedbackRow> {
        let row = UserFeedbackRow {
            id: Uuid::new_v4(),
            user_id: feedback.user_id,
            consultation_id: feedback.consultation_id,
            diagnosis_id: feedback.diagnosis_id,
            is_correct: feedback.is_correct,
            actual_condition: feedback.actual_condition,
            feedback_text: feedback.feedback_text,
            created_at: Utc::now(),
        };
        self.tables.lock().unwrap().feedback.push(row.clone());
        Ok(row)
    }
}
