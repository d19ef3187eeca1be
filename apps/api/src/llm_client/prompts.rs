// Shared prompt fragments.
// Each relay that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting fragments.

/// Persona line shared by every system prompt.
pub const PERSONA: &str = "You are VAIDYA";

/// Closing instruction for structured (JSON-mode) prompts.
pub const JSON_ONLY_INSTRUCTION: &str = "You must respond in valid JSON format only.";

/// Placeholder used when the patient reported nothing for an optional list.
pub const NONE_REPORTED: &str = "None reported";
