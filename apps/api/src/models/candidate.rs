use serde::{Deserialize, Serialize};

/// Candidate resume snapshot. Read-only during a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub candidate_name: String,
    pub resume_summary: String,
    pub experience_years: String,
    #[serde(default)]
    pub highlighted_experiences: Vec<String>,
}

/// Interviewer persona shaping prompt tone. Read-only during a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaConfig {
    pub name: String,
    pub probing_style: String,
    pub hint_style: String,
    pub encouragement: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        PersonaConfig {
            name: "Friendly Expert".to_string(),
            probing_style: "Curious, specific, grounded in the candidate's own projects".to_string(),
            hint_style: "Nudge towards fundamentals without giving the answer away".to_string(),
            encouragement: "Acknowledge effort before pressing deeper".to_string(),
        }
    }
}
