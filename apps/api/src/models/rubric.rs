//! Rubric data model — the read-only scoring artifact consumed by a session.

use serde::{Deserialize, Serialize};

/// Level-specific description the evaluator uses to place the candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricAnchor {
    pub level: u8,
    pub text: String,
}

/// A single criterion with its weight and the five level anchors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricCriterion {
    pub name: String,
    pub weight: f64,
    pub anchors: Vec<RubricAnchor>,
}

/// The full scoring artifact for one competency. Produced by the rubric
/// generator before the session starts; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    pub competency: String,
    pub band: String,
    pub band_notes: Vec<String>,
    pub criteria: Vec<RubricCriterion>,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub evidence: Vec<String>,
    pub min_pass_score: f64,
}

impl Rubric {
    /// Structural validation: each criterion carries exactly the anchor
    /// levels 1..=5, and the criterion weights sum to something positive.
    pub fn validate(&self) -> Result<(), String> {
        if self.criteria.is_empty() {
            return Err(format!("rubric '{}' has no criteria", self.competency));
        }
        for criterion in &self.criteria {
            let mut levels: Vec<u8> = criterion.anchors.iter().map(|a| a.level).collect();
            levels.sort_unstable();
            if levels != [1, 2, 3, 4, 5] {
                return Err(format!(
                    "criterion '{}' of '{}' must carry anchor levels 1..5",
                    criterion.name, self.competency
                ));
            }
        }
        if self.total_weight() <= 0.0 {
            return Err(format!(
                "rubric '{}' criterion weights must sum > 0",
                self.competency
            ));
        }
        Ok(())
    }

    /// Criterion names whose label survives whitespace normalization.
    /// A rubric with none is treated as degraded by the flow.
    pub fn usable_criteria(&self) -> Vec<String> {
        self.criteria
            .iter()
            .map(|c| normalize(&c.name))
            .filter(|name| !name.is_empty())
            .collect()
    }

    pub fn total_weight(&self) -> f64 {
        self.criteria.iter().map(|c| c.weight).sum()
    }

    /// Weight of a criterion, matched case-insensitively on the exact name.
    pub fn weight_of(&self, name: &str) -> f64 {
        let target = normalize(name).to_lowercase();
        self.criteria
            .iter()
            .find(|c| normalize(&c.name).to_lowercase() == target)
            .map(|c| c.weight)
            .unwrap_or(0.0)
    }
}

/// Collapse internal whitespace so criterion names compare stably.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
pub(crate) fn make_rubric(competency: &str, criteria: &[&str]) -> Rubric {
    Rubric {
        competency: competency.to_string(),
        band: "4-6".to_string(),
        band_notes: vec!["Expect hands-on delivery stories".to_string()],
        criteria: criteria
            .iter()
            .map(|name| RubricCriterion {
                name: name.to_string(),
                weight: 1.0,
                anchors: (1..=5)
                    .map(|level| RubricAnchor {
                        level,
                        text: format!("{name} at level {level}"),
                    })
                    .collect(),
            })
            .collect(),
        red_flags: vec![],
        evidence: vec!["Concrete project walkthrough".to_string()],
        min_pass_score: 3.0,
    }
}
