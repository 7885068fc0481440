//! Competency primer — pre-seeds a concrete project anchor per competency
//! from the resume and job description, called once before the first turn.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::{bullet_list, clamp_text, clean_line, prompts};
use crate::config::LlmRoute;
use crate::llm_gateway::{Gateway, LlmError};
use crate::models::candidate::CandidateProfile;

/// Fallback anchor used when the primer cannot produce one.
pub const PLACEHOLDER_ANCHOR: &str = "Draw on a recent relevant project";

#[derive(Debug, Deserialize)]
pub struct PrimerPlan {
    #[serde(default)]
    pub projects: BTreeMap<String, String>,
}

pub struct PrimerAgent {
    route: LlmRoute,
}

impl PrimerAgent {
    pub fn new(route: LlmRoute) -> Self {
        PrimerAgent { route }
    }

    /// Returns a full competency → anchor mapping. Blank anchors from the
    /// model are dropped and every missing competency is backfilled with the
    /// placeholder, so callers never see an empty anchor.
    pub async fn invoke(
        &self,
        gateway: &Gateway,
        job_title: &str,
        job_description: &str,
        profile: &CandidateProfile,
        competencies: &[String],
    ) -> Result<BTreeMap<String, String>, LlmError> {
        let task = prompts::PRIMER_TEMPLATE
            .replace("{job_title}", job_title)
            .replace("{job_description}", &clamp_text(job_description, 900))
            .replace("{resume_summary}", &clamp_text(&profile.resume_summary, 900))
            .replace(
                "{highlighted}",
                &bullet_list(profile.highlighted_experiences.iter().map(String::as_str)),
            )
            .replace(
                "{competencies}",
                &bullet_list(competencies.iter().map(String::as_str)),
            );

        let plan: PrimerPlan = gateway
            .call_json(
                &self.route,
                prompts::PRIMER_SYSTEM,
                &task,
                prompts::PRIMER_SCHEMA,
            )
            .await?;

        Ok(seed_anchors(competencies, plan.projects))
    }
}

/// Merge the model's anchor map over the competency list, matching names
/// case-insensitively and backfilling gaps with the placeholder.
pub fn seed_anchors(
    competencies: &[String],
    proposed: BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let lookup: BTreeMap<String, String> = proposed
        .into_iter()
        .filter_map(|(name, anchor)| {
            let anchor = clean_line(&anchor);
            if anchor.is_empty() {
                None
            } else {
                Some((clean_line(&name).to_lowercase(), anchor))
            }
        })
        .collect();

    competencies
        .iter()
        .map(|name| {
            let anchor = lookup
                .get(&clean_line(name).to_lowercase())
                .cloned()
                .unwrap_or_else(|| PLACEHOLDER_ANCHOR.to_string());
            (name.clone(), anchor)
        })
        .collect()
}

/// Full placeholder seeding for the degraded path after retry exhaustion.
pub fn placeholder_anchors(competencies: &[String]) -> BTreeMap<String, String> {
    competencies
        .iter()
        .map(|name| (name.clone(), PLACEHOLDER_ANCHOR.to_string()))
        .collect()
}
