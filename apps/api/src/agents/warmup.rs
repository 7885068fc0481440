//! Warmup agent — emits the opening interviewer message, and doubles as the
//! wrapup questioner and the closing-statement writer. The mode only swaps
//! the stage objective; wording always belongs to the agent.

use serde::Deserialize;

use super::{bullet_list, clamp_text, persona_block, prompts, render_conversation};
use crate::config::LlmRoute;
use crate::llm_gateway::{Gateway, LlmError};
use crate::models::candidate::{CandidateProfile, PersonaConfig};
use crate::models::context::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmupMode {
    Opening,
    Wrapup,
    Closing,
}

impl WarmupMode {
    fn objective(self) -> &'static str {
        match self {
            WarmupMode::Opening => prompts::WARMUP_OBJECTIVE,
            WarmupMode::Wrapup => prompts::WRAPUP_OBJECTIVE,
            WarmupMode::Closing => prompts::CLOSING_OBJECTIVE,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WarmupPlan {
    pub question: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub follow_up_prompt: String,
    #[serde(default)]
    pub tone: String,
}

impl WarmupPlan {
    /// Tones outside the allowed set collapse to neutral.
    pub fn normalized_tone(&self) -> String {
        let tone = self.tone.trim().to_lowercase();
        if tone == "positive" || tone == "neutral" {
            tone
        } else {
            "neutral".to_string()
        }
    }
}

pub struct WarmupAgent {
    route: LlmRoute,
}

impl WarmupAgent {
    pub fn new(route: LlmRoute) -> Self {
        WarmupAgent { route }
    }

    pub async fn invoke(
        &self,
        gateway: &Gateway,
        mode: WarmupMode,
        persona: &PersonaConfig,
        profile: &CandidateProfile,
        job_title: &str,
        transcript: &[Message],
    ) -> Result<WarmupPlan, LlmError> {
        let task = prompts::WARMUP_TEMPLATE
            .replace("{persona_block}", &persona_block(persona))
            .replace("{objective}", mode.objective())
            .replace("{candidate_name}", &profile.candidate_name)
            .replace("{job_title}", job_title)
            .replace("{resume_summary}", &clamp_text(&profile.resume_summary, 600))
            .replace(
                "{highlighted}",
                &bullet_list(profile.highlighted_experiences.iter().map(String::as_str)),
            )
            .replace("{conversation}", &render_conversation(transcript));

        gateway
            .call_json(
                &self.route,
                prompts::WARMUP_SYSTEM,
                &task,
                prompts::WARMUP_SCHEMA,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_route;
    use crate::llm_gateway::testing::gateway_with;

    fn profile() -> CandidateProfile {
        CandidateProfile {
            candidate_name: "Ada".to_string(),
            resume_summary: "Platform engineer, ten years".to_string(),
            experience_years: "10+".to_string(),
            highlighted_experiences: vec!["Led the storage migration".to_string()],
        }
    }

    #[test]
    fn test_unknown_tone_normalizes_to_neutral() {
        let plan = WarmupPlan {
            question: "q".to_string(),
            reasoning: String::new(),
            follow_up_prompt: String::new(),
            tone: "Enthusiastic!!".to_string(),
        };
        assert_eq!(plan.normalized_tone(), "neutral");
        let plan = WarmupPlan {
            tone: " Positive ".to_string(),
            ..plan
        };
        assert_eq!(plan.normalized_tone(), "positive");
    }

    #[tokio::test]
    async fn test_invoke_parses_warmup_plan() {
        let gateway = gateway_with(vec![Ok(r#"{
            "question": "Tell me about a project you're proud of.",
            "reasoning": "Opens broad",
            "follow_up_prompt": "What made it hard?",
            "tone": "positive"
        }"#
        .to_string())]);
        let agent = WarmupAgent::new(test_route("warmup"));
        let plan = agent
            .invoke(
                &gateway,
                WarmupMode::Opening,
                &PersonaConfig::default(),
                &profile(),
                "Backend Engineer",
                &[],
            )
            .await
            .unwrap();
        assert!(plan.question.contains("proud of"));
        assert_eq!(plan.normalized_tone(), "positive");
    }
}
