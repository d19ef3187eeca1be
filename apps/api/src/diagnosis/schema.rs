//! Wire types for the diagnosis relay: the patient input it accepts and the
//! structured output it demands from the model.
//!
//! The model's JSON is deserialized into typed structs and then range-checked.
//! Anything that does not fit is rejected before a single row is written.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::AppError;
use crate::models::consultation::{Route, Severity, Timing};

// ────────────────────────────────────────────────────────────────────────────
// Patient input
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientInput {
    pub symptoms: Vec<String>,
    pub symptom_description: String,
    pub age: i32,
    pub duration_days: i32,
    pub severity: Severity,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub allergies: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub chronic_conditions: Vec<String>,
}

impl PatientInput {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.symptoms.iter().all(|s| s.trim().is_empty()) {
            return Err(AppError::Validation(
                "at least one symptom is required".to_string(),
            ));
        }
        if !(0..=150).contains(&self.age) {
            return Err(AppError::Validation(format!("age {} is out of range", self.age)));
        }
        if self.duration_days < 0 {
            return Err(AppError::Validation(
                "duration_days cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Model output
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    Routine,
    Urgent,
    Emergency,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelDiagnosisResponse {
    pub diagnoses: Vec<ModelDiagnosis>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub clinical_notes: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub recommended_tests: Vec<String>,
    pub urgency_level: UrgencyLevel,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub follow_up_questions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelDiagnosis {
    pub disease_name: String,
    pub confidence_score: f64,
    pub ranking: i32,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub symptom_relevance: BTreeMap<String, f64>,
    pub explanation: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub drugs: Vec<ModelDrug>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelDrug {
    pub drug_name: String,
    pub generic_name: String,
    pub drug_class: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub route: Route,
    pub timing: Timing,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub contraindications: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub side_effects: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub warnings: Vec<String>,
    #[serde(default = "default_is_safe")]
    pub is_safe: bool,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub safety_notes: String,
}

fn default_is_safe() -> bool {
    true
}

/// Treats an explicit JSON `null` like a missing field.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ModelDiagnosisResponse {
    /// Parses and range-checks the model's JSON content.
    pub fn parse(content: &str) -> Result<Self, AppError> {
        let response: Self = serde_json::from_str(content)
            .map_err(|e| AppError::InvalidModelOutput(format!("malformed diagnosis JSON: {e}")))?;
        response.validate().map_err(AppError::InvalidModelOutput)?;
        Ok(response)
    }

    fn validate(&self) -> Result<(), String> {
        for (index, diagnosis) in self.diagnoses.iter().enumerate() {
            diagnosis
                .validate()
                .map_err(|reason| format!("diagnoses[{index}]: {reason}"))?;
        }
        Ok(())
    }
}

impl ModelDiagnosis {
    fn validate(&self) -> Result<(), String> {
        if self.disease_name.trim().is_empty() {
            return Err("disease_name is blank".to_string());
        }
        if !(0.0..=1.0).contains(&self.confidence_score) {
            return Err(format!(
                "confidence_score {} outside [0, 1]",
                self.confidence_score
            ));
        }
        if self.ranking < 1 {
            return Err(format!("ranking {} is not positive", self.ranking));
        }
        if let Some((symptom, value)) = self
            .symptom_relevance
            .iter()
            .find(|(_, v)| !(0.0..=1.0).contains(*v))
        {
            return Err(format!("symptom_relevance[{symptom}] = {value} outside [0, 1]"));
        }
        for (index, drug) in self.drugs.iter().enumerate() {
            if drug.drug_name.trim().is_empty() {
                return Err(format!("drugs[{index}]: drug_name is blank"));
            }
        }
        Ok(())
    }
}
