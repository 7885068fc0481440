//! Interview agents. Each agent is a small struct holding its LLM route and
//! composing a prompt template, the gateway, and a typed output schema —
//! there is no shared agent trait. Agents never mutate session state; they
//! return structured plans the flow manager applies.

pub mod auto_reply;
pub mod competency;
pub mod evaluator;
pub mod primer;
pub mod prompts;
pub mod warmup;

use crate::models::candidate::PersonaConfig;
use crate::models::context::{Message, Speaker};

pub const PRIMER_AGENT_KEY: &str = "flow.primer";
pub const WARMUP_AGENT_KEY: &str = "flow.warmup";
pub const COMPETENCY_AGENT_KEY: &str = "flow.competency";
pub const EVALUATOR_AGENT_KEY: &str = "flow.evaluator";
pub const AUTO_REPLY_AGENT_KEY: &str = "candidate.auto_reply";

/// Every agent key the route registry must resolve at startup.
pub const AGENT_KEYS: &[&str] = &[
    PRIMER_AGENT_KEY,
    WARMUP_AGENT_KEY,
    COMPETENCY_AGENT_KEY,
    EVALUATOR_AGENT_KEY,
    AUTO_REPLY_AGENT_KEY,
];

// ────────────────────────────────────────────────────────────────────────────
// Shared prompt-shaping helpers
// ────────────────────────────────────────────────────────────────────────────

/// Compact whitespace and clip length for prompt hygiene.
pub(crate) fn clamp_text(text: &str, limit: usize) -> String {
    let compact = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if compact.chars().count() <= limit {
        return compact;
    }
    let mut clipped: String = compact.chars().take(limit.saturating_sub(1)).collect();
    clipped = clipped.trim_end().to_string();
    clipped.push('…');
    clipped
}

/// Render entries as a bullet list, or a placeholder when empty.
pub(crate) fn bullet_list<'a>(entries: impl IntoIterator<Item = &'a str>) -> String {
    let lines: Vec<String> = entries
        .into_iter()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| format!("- {line}"))
        .collect();
    if lines.is_empty() {
        "(none)".to_string()
    } else {
        lines.join("\n")
    }
}

/// Render transcript history as speaker-prefixed lines.
pub(crate) fn render_conversation(messages: &[Message]) -> String {
    let lines: Vec<String> = messages
        .iter()
        .filter(|turn| !turn.content.trim().is_empty())
        .map(|turn| {
            let speaker = match turn.speaker {
                Speaker::Interviewer => "Interviewer",
                Speaker::Candidate => "Candidate",
                Speaker::System => "System",
            };
            format!("{speaker}: {}", turn.content.trim())
        })
        .collect();
    if lines.is_empty() {
        "(none)".to_string()
    } else {
        lines.join("\n")
    }
}

/// Normalize a free-form line for plan outputs.
pub(crate) fn clean_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Render the persona header shared by the question-producing agents.
pub(crate) fn persona_block(persona: &PersonaConfig) -> String {
    prompts::PERSONA_BLOCK_TEMPLATE
        .replace("{name}", &persona.name)
        .replace("{probing_style}", &persona.probing_style)
        .replace("{hint_style}", &persona.hint_style)
        .replace("{encouragement}", &persona.encouragement)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_text_compacts_and_clips() {
        assert_eq!(clamp_text("  a   b \n c ", 100), "a b c");
        let clipped = clamp_text("abcdefghij", 5);
        assert!(clipped.ends_with('…'));
        assert!(clipped.chars().count() <= 5);
    }

    #[test]
    fn test_bullet_list_placeholder_when_empty() {
        assert_eq!(bullet_list([]), "(none)");
        assert_eq!(bullet_list(["x", " ", "y"]), "- x\n- y");
    }

    #[test]
    fn test_render_conversation_skips_blank_turns() {
        let messages = vec![
            Message {
                speaker: Speaker::Interviewer,
                content: "Hello".to_string(),
                tone: "positive".to_string(),
                competency: None,
                targeted_criteria: vec![],
                project_anchor: String::new(),
            },
            Message {
                speaker: Speaker::Candidate,
                content: "   ".to_string(),
                tone: "neutral".to_string(),
                competency: None,
                targeted_criteria: vec![],
                project_anchor: String::new(),
            },
        ];
        assert_eq!(render_conversation(&messages), "Interviewer: Hello");
    }
}
