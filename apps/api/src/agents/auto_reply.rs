//! Candidate auto-reply agent — produces a candidate answer at a requested
//! competence level, used for end-to-end simulation runs.

use serde::Deserialize;

use super::{bullet_list, clamp_text, prompts, render_conversation};
use crate::config::LlmRoute;
use crate::llm_gateway::{Gateway, LlmError};
use crate::models::context::Message;

pub const DEFAULT_LEVEL: u8 = 3;

#[derive(Debug, Deserialize)]
pub struct AutoReplyPlan {
    pub answer: String,
    #[serde(default)]
    pub tone: String,
}

pub struct AutoReplyAgent {
    route: LlmRoute,
}

impl AutoReplyAgent {
    pub fn new(route: LlmRoute) -> Self {
        AutoReplyAgent { route }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn invoke(
        &self,
        gateway: &Gateway,
        question: &str,
        resume_summary: &str,
        competency: Option<&str>,
        project_anchor: &str,
        targeted_criteria: &[String],
        transcript: &[Message],
        level: u8,
    ) -> Result<String, LlmError> {
        let anchor = if project_anchor.trim().is_empty() {
            "(no shared project anchor)"
        } else {
            project_anchor
        };
        let task = prompts::AUTO_REPLY_TEMPLATE
            .replace("{persona}", persona_for_level(level))
            .replace("{resume_summary}", &clamp_text(resume_summary, 600))
            .replace(
                "{competency}",
                competency.unwrap_or("general competency focus"),
            )
            .replace("{project_anchor}", anchor)
            .replace(
                "{targeted}",
                &bullet_list(targeted_criteria.iter().map(String::as_str)),
            )
            .replace("{conversation}", &render_conversation(transcript))
            .replace("{question}", question.trim())
            .replace("{level}", &clamp_level(level).to_string());

        let plan: AutoReplyPlan = gateway
            .call_json(
                &self.route,
                prompts::AUTO_REPLY_SYSTEM,
                &task,
                prompts::AUTO_REPLY_SCHEMA,
            )
            .await?;
        Ok(plan.answer.trim().to_string())
    }
}

/// Clamp a requested level into 1..=5.
pub fn clamp_level(level: u8) -> u8 {
    level.clamp(1, 5)
}

fn persona_for_level(level: u8) -> &'static str {
    prompts::LEVEL_PERSONAS[(clamp_level(level) - 1) as usize]
}
