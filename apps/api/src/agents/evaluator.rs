//! Evaluator agent — scores the latest candidate answer against the rubric
//! and maintains the running interview summary.
//!
//! The model's JSON is the only source of structured scoring, so everything
//! it returns is normalized before the flow manager sees it: scores are
//! clamped into 0..=5, criterion names must match the rubric exactly
//! (case-insensitive) or the entry is dropped, and neither criterion levels
//! nor competency totals may regress below previously observed values.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::{clamp_text, clean_line, prompts, render_conversation};
use crate::config::LlmRoute;
use crate::llm_gateway::{Gateway, LlmError};
use crate::models::context::{
    CompetencyScore, CriterionScore, EvaluatorState, Message, Stage,
};
use crate::models::rubric::Rubric;

#[derive(Debug, Deserialize)]
struct RawCriterionScore {
    criterion: String,
    score: f64,
    #[serde(default)]
    rationale: String,
}

#[derive(Debug, Deserialize)]
struct RawCompetencyScore {
    #[serde(default)]
    competency: String,
    #[serde(default)]
    total_score: f64,
    #[serde(default)]
    rubric_filled: bool,
    #[serde(default)]
    criterion_scores: Vec<RawCriterionScore>,
    #[serde(default)]
    hints: Vec<String>,
    #[serde(default)]
    follow_up_needed: bool,
}

#[derive(Debug, Deserialize)]
struct RawEvaluationPlan {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    anchors_delta: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    rubric_updates: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    competency_score: Option<RawCompetencyScore>,
}

/// Normalized evaluator output applied by the flow manager.
#[derive(Debug, Clone)]
pub struct EvaluationPlan {
    pub summary: String,
    pub anchors_delta: BTreeMap<String, Vec<String>>,
    pub rubric_updates: BTreeMap<String, Vec<String>>,
    pub competency_score: Option<CompetencyScore>,
}

pub struct EvaluatorAgent {
    route: LlmRoute,
}

impl EvaluatorAgent {
    pub fn new(route: LlmRoute) -> Self {
        EvaluatorAgent { route }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn invoke(
        &self,
        gateway: &Gateway,
        stage: Stage,
        competency: Option<&str>,
        rubric: Option<&Rubric>,
        state: &EvaluatorState,
        transcript: &[Message],
        window: usize,
        question: &str,
        answer: &str,
        job_title: &str,
    ) -> Result<EvaluationPlan, LlmError> {
        let summary = if state.summary.trim().is_empty() {
            "(no summary yet)".to_string()
        } else {
            state.summary.clone()
        };
        let rubric_json = match rubric {
            Some(rubric) => serde_json::to_string_pretty(rubric)
                .unwrap_or_else(|_| "(rubric unavailable)".to_string()),
            None => "(no rubric for this stage)".to_string(),
        };
        let baseline = competency
            .map(|name| baseline_levels(rubric, state, name))
            .unwrap_or_default();
        let prior = competency.and_then(|name| state.scores.get(name));

        let task = prompts::EVALUATOR_TEMPLATE
            .replace("{stage}", &stage.to_string())
            .replace("{active_competency}", competency.unwrap_or("(not set)"))
            .replace("{job_title}", job_title)
            .replace("{summary}", &summary)
            .replace("{rubric}", &rubric_json)
            .replace("{levels}", &format_levels(&baseline))
            .replace("{existing_score}", &format_score(prior))
            .replace(
                "{conversation}",
                &render_conversation(&bounded_window(transcript, window)),
            )
            .replace("{question}", &clamp_text(question, 600))
            .replace("{answer}", &clamp_text(answer, 2000));

        let raw: RawEvaluationPlan = gateway
            .call_json(
                &self.route,
                prompts::EVALUATOR_SYSTEM,
                &task,
                prompts::EVALUATOR_SCHEMA,
            )
            .await?;

        Ok(normalize_plan(raw, competency, rubric, state, &baseline))
    }
}

/// The evaluator sees the opening warmup exchange plus the most recent
/// `window` messages, bounding prompt growth over long sessions.
pub fn bounded_window(transcript: &[Message], window: usize) -> Vec<Message> {
    if transcript.len() <= window + 2 {
        return transcript.to_vec();
    }
    let mut selected: Vec<Message> = transcript.iter().take(2).cloned().collect();
    selected.extend(transcript[transcript.len() - window..].iter().cloned());
    selected
}

fn normalize_plan(
    raw: RawEvaluationPlan,
    competency: Option<&str>,
    rubric: Option<&Rubric>,
    state: &EvaluatorState,
    baseline: &BTreeMap<String, u8>,
) -> EvaluationPlan {
    let anchors_delta = clean_string_map(raw.anchors_delta);
    let rubric_updates = clean_string_map(raw.rubric_updates);

    let competency_score = match (competency, rubric, raw.competency_score) {
        (Some(name), Some(rubric), Some(score)) if names_match(&score.competency, name) => {
            Some(normalize_score(
                score,
                name,
                rubric,
                state.scores.get(name),
                baseline,
            ))
        }
        _ => None,
    };

    EvaluationPlan {
        summary: clean_line(&raw.summary),
        anchors_delta,
        rubric_updates,
        competency_score,
    }
}

/// A score entry applies to the active competency when it names it
/// (case-insensitive) or leaves the name blank.
fn names_match(reported: &str, active: &str) -> bool {
    let reported = reported.trim();
    reported.is_empty() || reported.to_lowercase() == active.trim().to_lowercase()
}

/// Clamp, canonicalize, and enforce monotonicity on a raw competency score.
fn normalize_score(
    raw: RawCompetencyScore,
    competency: &str,
    rubric: &Rubric,
    prior: Option<&CompetencyScore>,
    baseline: &BTreeMap<String, u8>,
) -> CompetencyScore {
    let criteria = rubric.usable_criteria();
    let mut incoming: BTreeMap<String, (u8, String)> = BTreeMap::new();
    for item in raw.criterion_scores {
        let wanted = clean_line(&item.criterion).to_lowercase();
        let canonical = criteria.iter().find(|name| name.to_lowercase() == wanted);
        // Case-insensitive exact match only; anything fuzzier would make the
        // scoring trail unauditable.
        if let Some(canonical) = canonical {
            incoming.insert(
                canonical.clone(),
                (clamp_level(item.score), clean_line(&item.rationale)),
            );
        }
    }

    let mut criterion_scores = Vec::new();
    for name in &criteria {
        let prior_level = baseline.get(name).copied().unwrap_or(0);
        match incoming.get(name) {
            Some((level, rationale)) => {
                let level = (*level).max(prior_level);
                criterion_scores.push(CriterionScore {
                    criterion: name.clone(),
                    score: level as f64,
                    weight: rubric.weight_of(name),
                    rationale: rationale.clone(),
                });
            }
            None if prior_level > 0 => {
                let rationale = prior
                    .and_then(|p| {
                        p.criterion_scores
                            .iter()
                            .find(|c| c.criterion == *name)
                            .map(|c| c.rationale.clone())
                    })
                    .unwrap_or_default();
                criterion_scores.push(CriterionScore {
                    criterion: name.clone(),
                    score: prior_level as f64,
                    weight: rubric.weight_of(name),
                    rationale,
                });
            }
            None => {}
        }
    }

    let total = if criterion_scores.is_empty() {
        raw.total_score.clamp(0.0, 5.0)
    } else {
        weighted_total(&criterion_scores)
    };
    let total = match prior {
        Some(prior) => total.max(prior.total_score),
        None => total,
    };

    CompetencyScore {
        competency: competency.to_string(),
        total_score: total,
        rubric_filled: raw.rubric_filled,
        criterion_scores,
        hints: raw
            .hints
            .iter()
            .map(|h| clean_line(h))
            .filter(|h| !h.is_empty())
            .collect(),
        follow_up_needed: raw.follow_up_needed,
    }
}

/// Weight-normalized average of per-criterion scores (weights sum to 1).
pub fn weighted_total(scores: &[CriterionScore]) -> f64 {
    let weight_sum: f64 = scores.iter().map(|s| s.weight).sum();
    if weight_sum <= 0.0 {
        let count = scores.len() as f64;
        return scores.iter().map(|s| s.score).sum::<f64>() / count.max(1.0);
    }
    scores.iter().map(|s| s.score * s.weight).sum::<f64>() / weight_sum
}

/// Round a raw score into an integer anchor level within 0..=5.
fn clamp_level(value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(0.0, 5.0) as u8
}

/// Highest level observed per criterion across prior state, keyed canonically.
fn baseline_levels(
    rubric: Option<&Rubric>,
    state: &EvaluatorState,
    competency: &str,
) -> BTreeMap<String, u8> {
    let criteria = match rubric {
        Some(rubric) => rubric.usable_criteria(),
        None => return BTreeMap::new(),
    };
    let mut levels: BTreeMap<String, u8> = BTreeMap::new();
    if let Some(prior) = state.scores.get(competency) {
        for item in &prior.criterion_scores {
            let wanted = item.criterion.to_lowercase();
            if let Some(canonical) = criteria.iter().find(|name| name.to_lowercase() == wanted) {
                let level = clamp_level(item.score);
                let entry = levels.entry(canonical.clone()).or_insert(0);
                *entry = (*entry).max(level);
            }
        }
    }
    levels
}

fn clean_string_map(map: BTreeMap<String, Vec<String>>) -> BTreeMap<String, Vec<String>> {
    map.into_iter()
        .filter_map(|(key, values)| {
            let key = clean_line(&key);
            let values: Vec<String> = values
                .iter()
                .map(|v| clean_line(v))
                .filter(|v| !v.is_empty())
                .collect();
            if key.is_empty() || values.is_empty() {
                None
            } else {
                Some((key, values))
            }
        })
        .collect()
}

fn format_levels(levels: &BTreeMap<String, u8>) -> String {
    if levels.is_empty() {
        return "(no criterion levels recorded yet)".to_string();
    }
    levels
        .iter()
        .map(|(name, level)| format!("- {name}: level {level}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_score(existing: Option<&CompetencyScore>) -> String {
    match existing {
        Some(score) => format!("{:.2} / 5.00", score.total_score),
        None => "No prior competency score recorded.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::context::Speaker;
    use crate::models::rubric::make_rubric;

    fn raw_score(entries: &[(&str, f64, &str)]) -> RawCompetencyScore {
        RawCompetencyScore {
            competency: "System Design".to_string(),
            total_score: 0.0,
            rubric_filled: false,
            criterion_scores: entries
                .iter()
                .map(|(criterion, score, rationale)| RawCriterionScore {
                    criterion: criterion.to_string(),
                    score: *score,
                    rationale: rationale.to_string(),
                })
                .collect(),
            hints: vec![],
            follow_up_needed: false,
        }
    }

    #[test]
    fn test_unknown_criterion_is_dropped() {
        let rubric = make_rubric("System Design", &["Scalability"]);
        let score = normalize_score(
            raw_score(&[("Scalability", 4.0, "solid"), ("Vibes", 5.0, "great vibes")]),
            "System Design",
            &rubric,
            None,
            &BTreeMap::new(),
        );
        assert_eq!(score.criterion_scores.len(), 1);
        assert_eq!(score.criterion_scores[0].criterion, "Scalability");
    }

    #[test]
    fn test_scores_are_clamped_and_rounded() {
        let rubric = make_rubric("System Design", &["Scalability"]);
        let score = normalize_score(
            raw_score(&[("scalability", 17.4, "off the chart")]),
            "System Design",
            &rubric,
            None,
            &BTreeMap::new(),
        );
        assert!((score.criterion_scores[0].score - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_levels_never_regress() {
        let rubric = make_rubric("System Design", &["Scalability"]);
        let mut baseline = BTreeMap::new();
        baseline.insert("Scalability".to_string(), 4);
        let score = normalize_score(
            raw_score(&[("Scalability", 2.0, "weaker this round")]),
            "System Design",
            &rubric,
            None,
            &baseline,
        );
        assert!((score.criterion_scores[0].score - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_total_is_weight_normalized_average() {
        let mut rubric = make_rubric("System Design", &["Scalability", "Trade-offs"]);
        rubric.criteria[0].weight = 3.0;
        rubric.criteria[1].weight = 1.0;
        let score = normalize_score(
            raw_score(&[("Scalability", 4.0, "good"), ("Trade-offs", 2.0, "thin")]),
            "System Design",
            &rubric,
            None,
            &BTreeMap::new(),
        );
        // (4*3 + 2*1) / 4 = 3.5
        assert!((score.total_score - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_total_never_regresses_below_prior() {
        let rubric = make_rubric("System Design", &["Scalability"]);
        let prior = CompetencyScore {
            competency: "System Design".to_string(),
            total_score: 4.0,
            rubric_filled: false,
            criterion_scores: vec![],
            hints: vec![],
            follow_up_needed: false,
        };
        let score = normalize_score(
            raw_score(&[("Scalability", 2.0, "weak")]),
            "System Design",
            &rubric,
            Some(&prior),
            &BTreeMap::new(),
        );
        assert!((score.total_score - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_prior_levels_carry_forward_when_not_rescored() {
        let rubric = make_rubric("System Design", &["Scalability", "Trade-offs"]);
        let mut baseline = BTreeMap::new();
        baseline.insert("Trade-offs".to_string(), 3);
        let score = normalize_score(
            raw_score(&[("Scalability", 4.0, "good")]),
            "System Design",
            &rubric,
            None,
            &baseline,
        );
        let tradeoffs = score
            .criterion_scores
            .iter()
            .find(|c| c.criterion == "Trade-offs")
            .unwrap();
        assert!((tradeoffs.score - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_score_for_wrong_competency_is_dropped() {
        let rubric = make_rubric("System Design", &["Scalability"]);
        let mut score = raw_score(&[("Scalability", 4.0, "good")]);
        score.competency = "Some Other Pillar".to_string();
        let plan = normalize_plan(
            RawEvaluationPlan {
                summary: "s".to_string(),
                anchors_delta: BTreeMap::new(),
                rubric_updates: BTreeMap::new(),
                competency_score: Some(score),
            },
            Some("System Design"),
            Some(&rubric),
            &EvaluatorState::default(),
            &BTreeMap::new(),
        );
        assert!(plan.competency_score.is_none());
    }

    #[test]
    fn test_blank_competency_name_applies_to_active() {
        let rubric = make_rubric("System Design", &["Scalability"]);
        let mut score = raw_score(&[("Scalability", 4.0, "good")]);
        score.competency = String::new();
        let plan = normalize_plan(
            RawEvaluationPlan {
                summary: "s".to_string(),
                anchors_delta: BTreeMap::new(),
                rubric_updates: BTreeMap::new(),
                competency_score: Some(score),
            },
            Some("System Design"),
            Some(&rubric),
            &EvaluatorState::default(),
            &BTreeMap::new(),
        );
        assert!(plan.competency_score.is_some());
    }

    #[test]
    fn test_bounded_window_keeps_opening_exchange() {
        let make = |idx: usize| Message {
            speaker: Speaker::Candidate,
            content: format!("message {idx}"),
            tone: "neutral".to_string(),
            competency: None,
            targeted_criteria: vec![],
            project_anchor: String::new(),
        };
        let transcript: Vec<Message> = (0..20).map(make).collect();
        let window = bounded_window(&transcript, 6);
        assert_eq!(window.len(), 8);
        assert_eq!(window[0].content, "message 0");
        assert_eq!(window[1].content, "message 1");
        assert_eq!(window.last().unwrap().content, "message 19");
    }

    #[test]
    fn test_bounded_window_returns_short_transcripts_whole() {
        let transcript = vec![Message {
            speaker: Speaker::Interviewer,
            content: "hi".to_string(),
            tone: "neutral".to_string(),
            competency: None,
            targeted_criteria: vec![],
            project_anchor: String::new(),
        }];
        assert_eq!(bounded_window(&transcript, 6).len(), 1);
    }

    #[tokio::test]
    async fn test_invoke_normalizes_model_output() {
        use crate::config::test_route;
        use crate::llm_gateway::testing::gateway_with;

        let gateway = gateway_with(vec![Ok(r#"{
            "summary": "Strong on scaling stories",
            "anchors_delta": {"System Design": ["Led event bus rebuild"]},
            "rubric_updates": {"System Design": ["Scalability evidenced via rebuild"]},
            "competency_score": {
                "competency": "System Design",
                "total_score": 9.9,
                "rubric_filled": false,
                "criterion_scores": [
                    {"criterion": "SCALABILITY", "score": 4, "rationale": "clear p99 story"}
                ],
                "hints": [],
                "follow_up_needed": true
            }
        }"#
        .to_string())]);
        let agent = EvaluatorAgent::new(test_route("evaluator"));
        let rubric = make_rubric("System Design", &["Scalability"]);
        let plan = agent
            .invoke(
                &gateway,
                Stage::Competency,
                Some("System Design"),
                Some(&rubric),
                &EvaluatorState::default(),
                &[],
                6,
                "How did it scale?",
                "We resharded by tenant.",
                "Backend Engineer",
            )
            .await
            .unwrap();
        let score = plan.competency_score.unwrap();
        assert_eq!(score.criterion_scores[0].criterion, "Scalability");
        assert!((score.total_score - 4.0).abs() < f64::EPSILON);
        assert!(score.follow_up_needed);
    }
}
