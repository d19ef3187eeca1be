//! Diagnosis relay: one structured gateway call, then row-by-row persistence.
//!
//! Flow: build prompt → gateway (JSON mode) → parse + validate →
//!       insert diagnoses and their drugs → complete consultation → audit → return.
//!
//! Rows commit independently. A failed diagnosis insert skips that entry (and its
//! drugs); a failed drug insert skips only that drug. The caller receives
//! whatever was stored.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::diagnosis::prompts::{build_diagnosis_prompt, diagnosis_system};
use crate::diagnosis::schema::{
    ModelDiagnosis, ModelDiagnosisResponse, ModelDrug, PatientInput, UrgencyLevel,
};
use crate::errors::AppError;
use crate::llm_client::{CompletionGateway, GatewayMessage, MODEL};
use crate::models::consultation::{
    NewAuditLog, NewDiagnosis, NewDrugRecommendation, StoredDiagnosis,
};
use crate::store::RelayStore;

pub const AUDIT_ACTION: &str = "diagnosis_generated";

// ────────────────────────────────────────────────────────────────────────────
// Result models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisReport {
    pub diagnoses: Vec<StoredDiagnosis>,
    pub clinical_notes: String,
    pub recommended_tests: Vec<String>,
    pub urgency_level: UrgencyLevel,
    pub follow_up_questions: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Relay
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DiagnosisRelay {
    store: Arc<dyn RelayStore>,
    gateway: Arc<dyn CompletionGateway>,
}

impl DiagnosisRelay {
    pub fn new(store: Arc<dyn RelayStore>, gateway: Arc<dyn CompletionGateway>) -> Self {
        Self { store, gateway }
    }

    /// Runs one diagnosis for an existing consultation.
    ///
    /// Gateway failures and unparseable output return before anything is written.
    /// From the first insert onwards the call always succeeds.
    pub async fn run_diagnosis(
        &self,
        consultation_id: Uuid,
        input: &PatientInput,
    ) -> Result<DiagnosisReport, AppError> {
        let messages = [
            GatewayMessage::system(&diagnosis_system()),
            GatewayMessage::user(&build_diagnosis_prompt(input)),
        ];

        info!("Requesting diagnosis for consultation {consultation_id}");
        let content = self.gateway.complete_json(&messages).await?;
        let parsed = ModelDiagnosisResponse::parse(&content)?;
        info!(
            "Model returned {} diagnoses for consultation {consultation_id}",
            parsed.diagnoses.len()
        );

        let mut stored = Vec::with_capacity(parsed.diagnoses.len());
        for (index, diagnosis) in parsed.diagnoses.iter().enumerate() {
            if let Some(entry) = self.persist_diagnosis(consultation_id, index, diagnosis).await {
                stored.push(entry);
            }
        }

        if stored.len() < parsed.diagnoses.len() {
            warn!(
                "Consultation {consultation_id}: stored {}/{} diagnoses",
                stored.len(),
                parsed.diagnoses.len()
            );
        }

        if let Err(e) = self.store.complete_consultation(consultation_id).await {
            error!("Failed to mark consultation {consultation_id} completed: {e}");
        }

        let audit = NewAuditLog {
            consultation_id,
            action: AUDIT_ACTION.to_string(),
            model_version: MODEL.to_string(),
            confidence_scores: json!(parsed
                .diagnoses
                .iter()
                .map(|d| json!({ "disease": d.disease_name, "score": d.confidence_score }))
                .collect::<Vec<_>>()),
            input_data: json!({
                "symptoms": input.symptoms,
                "symptom_description": input.symptom_description,
                "age": input.age,
                "duration_days": input.duration_days,
                "severity": input.severity,
            }),
            output_data: json!({ "diagnoses_count": stored.len() }),
        };
        if let Err(e) = self.store.insert_audit_log(audit).await {
            error!("Failed to write audit log for consultation {consultation_id}: {e}");
        }

        info!(
            "Diagnosis complete for consultation {consultation_id}: {} stored",
            stored.len()
        );

        let ModelDiagnosisResponse {
            clinical_notes,
            recommended_tests,
            urgency_level,
            follow_up_questions,
            ..
        } = parsed;

        Ok(DiagnosisReport {
            diagnoses: stored,
            clinical_notes,
            recommended_tests,
            urgency_level,
            follow_up_questions,
        })
    }

    /// Inserts one diagnosis and then each of its drugs. `None` if the diagnosis itself failed.
    async fn persist_diagnosis(
        &self,
        consultation_id: Uuid,
        index: usize,
        diagnosis: &ModelDiagnosis,
    ) -> Option<StoredDiagnosis> {
        let row = match self
            .store
            .insert_diagnosis(NewDiagnosis {
                consultation_id,
                disease_name: diagnosis.disease_name.clone(),
                confidence_score: diagnosis.confidence_score,
                ranking: diagnosis.ranking,
                symptom_relevance: json!(diagnosis.symptom_relevance),
                explanation: diagnosis.explanation.clone(),
            })
            .await
        {
            Ok(row) => row,
            Err(e) => {
                error!(
                    "Error storing diagnosis #{index} ({}) for consultation {consultation_id}: {e}",
                    diagnosis.disease_name
                );
                return None;
            }
        };

        let mut drugs = Vec::with_capacity(diagnosis.drugs.len());
        for drug in &diagnosis.drugs {
            match self
                .store
                .insert_drug_recommendation(new_drug(row.id, drug))
                .await
            {
                Ok(drug_row) => drugs.push(drug_row),
                Err(e) => error!(
                    "Error storing drug {} for diagnosis {}: {e}",
                    drug.drug_name, row.id
                ),
            }
        }

        Some(StoredDiagnosis {
            diagnosis: row,
            drugs,
        })
    }
}

fn new_drug(diagnosis_id: Uuid, drug: &ModelDrug) -> NewDrugRecommendation {
    NewDrugRecommendation {
        diagnosis_id,
        drug_name: drug.drug_name.clone(),
        generic_name: drug.generic_name.clone(),
        drug_class: drug.drug_class.clone(),
        dosage: drug.dosage.clone(),
        frequency: drug.frequency.clone(),
        duration: drug.duration.clone(),
        route: drug.route,
        timing: drug.timing,
        contraindications: drug.contraindications.clone(),
        side_effects: drug.side_effects.clone(),
        warnings: drug.warnings.clone(),
        is_safe: drug.is_safe,
        safety_notes: drug.safety_notes.clone(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
