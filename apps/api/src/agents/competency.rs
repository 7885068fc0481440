//! Competency questioner — emits the next interviewer prompt bound to the
//! active competency, its project anchor, and the criteria still uncovered.

use serde::Deserialize;

use super::{bullet_list, clean_line, persona_block, prompts, render_conversation};
use crate::config::LlmRoute;
use crate::llm_gateway::{Gateway, LlmError};
use crate::models::candidate::PersonaConfig;
use crate::models::context::{Escalation, Message};

#[derive(Debug, Deserialize)]
pub struct CompetencyPlan {
    pub question: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub follow_up_prompt: String,
    pub escalation: Escalation,
    #[serde(default)]
    pub targeted_criteria: Vec<String>,
    #[serde(default)]
    pub tone: String,
}

impl CompetencyPlan {
    pub fn normalized_tone(&self) -> String {
        let tone = self.tone.trim().to_lowercase();
        if tone == "positive" || tone == "neutral" {
            tone
        } else {
            "neutral".to_string()
        }
    }

    /// Keeps only targeted criteria that actually appear in the remaining
    /// list (case-insensitive exact match, canonical casing restored). An
    /// empty result falls back to the first remaining criterion so every
    /// prompt targets something auditable.
    pub fn resolved_targets(&self, remaining: &[String]) -> Vec<String> {
        let mut targets: Vec<String> = Vec::new();
        for raw in &self.targeted_criteria {
            let wanted = clean_line(raw).to_lowercase();
            if wanted.is_empty() {
                continue;
            }
            if let Some(canonical) = remaining
                .iter()
                .find(|name| name.to_lowercase() == wanted)
            {
                if !targets.contains(canonical) {
                    targets.push(canonical.clone());
                }
            }
        }
        if targets.is_empty() {
            if let Some(first) = remaining.first() {
                targets.push(first.clone());
            }
        }
        targets
    }
}

pub struct CompetencyAgent {
    route: LlmRoute,
}

impl CompetencyAgent {
    pub fn new(route: LlmRoute) -> Self {
        CompetencyAgent { route }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn invoke(
        &self,
        gateway: &Gateway,
        persona: &PersonaConfig,
        job_title: &str,
        candidate_name: &str,
        competency: &str,
        project_anchor: &str,
        remaining: &[String],
        transcript: &[Message],
        question_index: u32,
        escalation_guidance: Escalation,
    ) -> Result<CompetencyPlan, LlmError> {
        let instruction = if question_index == 0 {
            prompts::COMPETENCY_INTRO_FIRST
        } else {
            prompts::COMPETENCY_INTRO_FOLLOW_UP
        };
        let anchor = if project_anchor.trim().is_empty() {
            "(use a hypothetical if needed)"
        } else {
            project_anchor
        };
        let task = prompts::COMPETENCY_TEMPLATE
            .replace("{persona_block}", &persona_block(persona))
            .replace("{job_title}", job_title)
            .replace("{candidate_name}", candidate_name)
            .replace("{competency}", competency)
            .replace("{project_anchor}", anchor)
            .replace(
                "{remaining_criteria}",
                &bullet_list(remaining.iter().map(String::as_str)),
            )
            .replace("{conversation}", &render_conversation(transcript))
            .replace("{question_index}", &question_index.to_string())
            .replace("{escalation_guidance}", &escalation_guidance.to_string())
            .replace("{instruction_block}", instruction);

        gateway
            .call_json(
                &self.route,
                prompts::COMPETENCY_SYSTEM,
                &task,
                prompts::COMPETENCY_SCHEMA,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(targets: &[&str]) -> CompetencyPlan {
        CompetencyPlan {
            question: "How did you shard the store?".to_string(),
            reasoning: String::new(),
            follow_up_prompt: String::new(),
            escalation: Escalation::How,
            targeted_criteria: targets.iter().map(|t| t.to_string()).collect(),
            tone: "neutral".to_string(),
        }
    }

    fn remaining(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_targets_filtered_to_remaining_with_canonical_casing() {
        let plan = plan(&["scalability", "Made Up Criterion"]);
        let targets = plan.resolved_targets(&remaining(&["Scalability", "Trade-offs"]));
        assert_eq!(targets, vec!["Scalability".to_string()]);
    }

    #[test]
    fn test_empty_targets_fall_back_to_first_remaining() {
        let plan = plan(&[]);
        let targets = plan.resolved_targets(&remaining(&["Scalability", "Trade-offs"]));
        assert_eq!(targets, vec!["Scalability".to_string()]);
    }

    #[test]
    fn test_duplicate_targets_are_deduped() {
        let plan = plan(&["Scalability", "SCALABILITY "]);
        let targets = plan.resolved_targets(&remaining(&["Scalability"]));
        assert_eq!(targets.len(), 1);
    }

    #[test]
    fn test_no_remaining_yields_no_targets() {
        let plan = plan(&["Scalability"]);
        assert!(plan.resolved_targets(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_invoke_parses_escalation_variants() {
        use crate::config::test_route;
        use crate::llm_gateway::testing::gateway_with;

        let gateway = gateway_with(vec![Ok(r#"{
            "question": "What breaks first under 10x load?",
            "reasoning": "Push to the edge",
            "follow_up_prompt": "And at 100x?",
            "escalation": "edge",
            "targeted_criteria": ["Scalability"],
            "tone": "neutral"
        }"#
        .to_string())]);
        let agent = CompetencyAgent::new(test_route("competency"));
        let plan = agent
            .invoke(
                &gateway,
                &PersonaConfig::default(),
                "Backend Engineer",
                "Ada",
                "System Design",
                "The event bus rebuild",
                &remaining(&["Scalability"]),
                &[],
                2,
                Escalation::Edge,
            )
            .await
            .unwrap();
        assert_eq!(plan.escalation, Escalation::Edge);
    }
}
