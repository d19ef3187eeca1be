// All LLM prompt constants for the diagnosis relay.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::diagnosis::schema::PatientInput;
use crate::llm_client::prompts::{JSON_ONLY_INSTRUCTION, NONE_REPORTED};

/// System prompt for diagnosis. Replace `{json_only}` before sending.
const DIAGNOSIS_SYSTEM_TEMPLATE: &str = r#"You are VAIDYA, an expert AI medical diagnostic assistant. Your role is to analyze symptoms and provide evidence-based disease predictions with drug recommendations.

CRITICAL RULES:
1. Always provide 3-5 possible conditions ranked by confidence score (0.0 to 1.0)
2. Each diagnosis MUST include:
   - Disease name
   - Confidence score (be conservative - only high confidence for clear symptom patterns)
   - Explanation of why this diagnosis fits the symptoms
   - Which symptoms were most relevant (symptom_relevance as fractions between 0.0 and 1.0)

3. For each diagnosis, provide drug recommendations with:
   - Drug name (brand name)
   - Generic name
   - Drug class
   - Dosage (specific amounts)
   - Frequency (e.g., "twice daily", "every 8 hours")
   - Duration (e.g., "7 days", "until symptoms resolve")
   - Route: one of [oral, injection, topical, inhalation, sublingual, rectal, transdermal]
   - Timing: one of [before_meal, after_meal, with_meal, empty_stomach, bedtime, as_needed]
   - Contraindications (list conditions where this drug should NOT be used)
   - Side effects (common ones)
   - Warnings (important safety information)
   - is_safe: boolean based on patient's allergies and conditions
   - safety_notes: explanation if not safe

4. SAFETY CHECKS:
   - Cross-reference drug recommendations with patient's allergies
   - Check for contraindications with chronic conditions
   - If confidence < 0.5 for all conditions, recommend professional consultation
   - Never recommend controlled substances without explicit warnings

5. BE CONSERVATIVE:
   - If symptoms are vague, acknowledge uncertainty
   - Suggest follow-up questions or tests when needed
   - Always include disclaimer about seeking professional help

{json_only}"#;

/// Diagnosis user prompt template.
/// Replace: {age}, {symptoms}, {description}, {duration}, {severity}, {allergies}, {conditions}
const DIAGNOSIS_PROMPT_TEMPLATE: &str = r#"Analyze the following patient case and provide diagnosis with drug recommendations:

PATIENT INFORMATION:
- Age: {age} years
- Symptoms: {symptoms}
- Symptom Description: {description}
- Duration: {duration} days
- Severity: {severity}
- Known Allergies: {allergies}
- Chronic Conditions: {conditions}

Provide your diagnosis in the following JSON format:
{
  "diagnoses": [
    {
      "disease_name": "string",
      "confidence_score": 0.0-1.0,
      "ranking": 1-5,
      "symptom_relevance": {"symptom1": 0.0-1.0, "symptom2": 0.0-1.0},
      "explanation": "string explaining why this diagnosis fits",
      "drugs": [
        {
          "drug_name": "Brand Name",
          "generic_name": "Generic Name",
          "drug_class": "Drug Class",
          "dosage": "500mg",
          "frequency": "twice daily",
          "duration": "7 days",
          "route": "oral",
          "timing": "after_meal",
          "contraindications": ["list", "of", "conditions"],
          "side_effects": ["common", "side", "effects"],
          "warnings": ["important", "warnings"],
          "is_safe": true,
          "safety_notes": "Notes if not safe for this patient"
        }
      ]
    }
  ],
  "clinical_notes": "Additional clinical observations",
  "recommended_tests": ["list of suggested diagnostic tests"],
  "urgency_level": "routine|urgent|emergency",
  "follow_up_questions": ["questions to clarify diagnosis"]
}"#;

pub fn diagnosis_system() -> String {
    DIAGNOSIS_SYSTEM_TEMPLATE.replace("{json_only}", JSON_ONLY_INSTRUCTION)
}

/// Builds the diagnosis prompt. Pure and deterministic: same input, same bytes.
pub fn build_diagnosis_prompt(input: &PatientInput) -> String {
    let age = input.age.to_string();
    let symptoms = input.symptoms.join(", ");
    let duration = input.duration_days.to_string();
    let allergies = join_or_none(&input.allergies);
    let conditions = join_or_none(&input.chronic_conditions);

    fill_template(
        DIAGNOSIS_PROMPT_TEMPLATE,
        &[
            ("{age}", age.as_str()),
            ("{symptoms}", symptoms.as_str()),
            ("{description}", input.symptom_description.as_str()),
            ("{duration}", duration.as_str()),
            ("{severity}", input.severity.as_str()),
            ("{allergies}", allergies.as_str()),
            ("{conditions}", conditions.as_str()),
        ],
    )
}

/// Single-pass placeholder substitution; substituted text is never rescanned.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    'scan: while let Some(ch) = rest.chars().next() {
        if ch == '{' {
            for (key, value) in values {
                if let Some(after) = rest.strip_prefix(key) {
                    out.push_str(value);
                    rest = after;
                    continue 'scan;
                }
            }
        }
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        NONE_REPORTED.to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::consultation::Severity;

    fn input() -> PatientInput {
        PatientInput {
            symptoms: vec!["Fever".to_string(), "Cough".to_string()],
            symptom_description: "Started after travel".to_string(),
            age: 34,
            duration_days: 4,
            severity: Severity::Moderate,
            allergies: vec!["Penicillin".to_string()],
            chronic_conditions: vec![],
        }
    }

    #[test]
    fn test_prompt_is_deterministic() {
        assert_eq!(build_diagnosis_prompt(&input()), build_diagnosis_prompt(&input()));
    }

    #[test]
    fn test_prompt_embeds_patient_fields() {
        let prompt = build_diagnosis_prompt(&input());
        assert!(prompt.contains("- Age: 34 years"));
        assert!(prompt.contains("- Symptoms: Fever, Cough"));
        assert!(prompt.contains("- Symptom Description: Started after travel"));
        assert!(prompt.contains("- Duration: 4 days"));
        assert!(prompt.contains("- Severity: moderate"));
        assert!(prompt.contains("- Known Allergies: Penicillin"));
        assert!(prompt.contains("- Chronic Conditions: None reported"));
        assert!(prompt.contains("\"urgency_level\": \"routine|urgent|emergency\""));
    }

    #[test]
    fn test_placeholders_in_patient_text_are_not_expanded() {
        let mut patient = input();
        patient.symptoms = vec!["{description}".to_string()];
        patient.symptom_description = "{age}".to_string();
        let prompt = build_diagnosis_prompt(&patient);
        assert!(prompt.contains("- Symptoms: {description}"));
        assert!(prompt.contains("- Symptom Description: {age}"));
    }

    #[test]
    fn test_system_prompt_demands_json_and_safety_checks() {
        let system = diagnosis_system();
        assert!(system.ends_with(JSON_ONLY_INSTRUCTION));
        assert!(system.contains("3-5 possible conditions"));
        assert!(system.contains("Cross-reference drug recommendations with patient's allergies"));
    }
}
