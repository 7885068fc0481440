//! Coverage accounting and transition arithmetic — pure functions over the
//! session context, kept separate from the orchestration so the decision
//! table stays directly testable.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::FlowSettings;
use crate::models::context::{CompetencyScore, Escalation, InterviewContext};

/// Why a competency advanced. Drives the hint event on low-score streaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceReason {
    FullCoverage,
    MostlyCovered,
    FollowUpLimit,
    LowScoreStreak,
}

impl AdvanceReason {
    pub fn label(self) -> &'static str {
        match self {
            AdvanceReason::FullCoverage => "full_coverage",
            AdvanceReason::MostlyCovered => "mostly_covered",
            AdvanceReason::FollowUpLimit => "follow_up_limit",
            AdvanceReason::LowScoreStreak => "low_score_streak",
        }
    }
}

/// The advance decision for the active competency, or `None` to stay.
pub fn advance_reason(
    total: usize,
    covered: usize,
    question_count: u32,
    low_streak: u32,
    settings: &FlowSettings,
) -> Option<AdvanceReason> {
    if covered >= total {
        return Some(AdvanceReason::FullCoverage);
    }
    if covered + 1 >= total && question_count >= settings.coverage_min_questions {
        return Some(AdvanceReason::MostlyCovered);
    }
    if question_count >= settings.follow_up_limit {
        return Some(AdvanceReason::FollowUpLimit);
    }
    if low_streak >= settings.low_score_streak_limit {
        return Some(AdvanceReason::LowScoreStreak);
    }
    None
}

/// Remaining criteria ordered by lowest observed level, ties broken by
/// rubric order. This is the probe priority handed to the questioner.
pub fn prioritize_remaining(
    criteria: &[String],
    covered: &[String],
    levels: &BTreeMap<String, u8>,
) -> Vec<String> {
    let covered_lower: Vec<String> = covered.iter().map(|c| c.to_lowercase()).collect();
    let mut remaining: Vec<String> = criteria
        .iter()
        .filter(|name| !covered_lower.contains(&name.to_lowercase()))
        .cloned()
        .collect();
    remaining.sort_by_key(|name| levels.get(name).copied().unwrap_or(0));
    remaining
}

/// Escalation guidance for the next competency prompt: the first question is
/// broad, later ones cycle why → how → challenge → edge, and a hint is
/// inserted when the last score for a targeted criterion came in at 2 or
/// below.
pub fn escalation_for(question_index: u32, last_targeted_level: Option<u8>) -> Escalation {
    if question_index == 0 {
        return Escalation::Broad;
    }
    if matches!(last_targeted_level, Some(level) if level > 0 && level <= 2) {
        return Escalation::Hint;
    }
    const CYCLE: [Escalation; 4] = [
        Escalation::Why,
        Escalation::How,
        Escalation::Challenge,
        Escalation::Edge,
    ];
    CYCLE[((question_index - 1) % 4) as usize]
}

/// Criteria evidenced by this evaluation: a criterion score of at least 1
/// with a non-empty rationale, or an explicit mention in the competency's
/// rubric updates. Matching is case-insensitive on the exact name.
pub fn criteria_hits(
    criteria: &[String],
    score: Option<&CompetencyScore>,
    rubric_updates: Option<&Vec<String>>,
) -> Vec<String> {
    let mut hits: Vec<String> = Vec::new();
    if let Some(score) = score {
        for item in &score.criterion_scores {
            if item.score >= 1.0 && !item.rationale.trim().is_empty() {
                if let Some(canonical) = find_canonical(criteria, &item.criterion) {
                    push_unique(&mut hits, canonical);
                }
            }
        }
    }
    if let Some(updates) = rubric_updates {
        for note in updates {
            let note_lower = note.to_lowercase();
            for name in criteria {
                if note_lower.contains(&name.to_lowercase()) {
                    push_unique(&mut hits, name.clone());
                }
            }
        }
    }
    hits
}

/// Append `incoming` entries not already present, case-insensitively,
/// preserving first-seen order for display.
pub fn merge_unique(existing: &mut Vec<String>, incoming: impl IntoIterator<Item = String>) {
    for item in incoming {
        push_unique(existing, item);
    }
}

fn push_unique(items: &mut Vec<String>, candidate: String) {
    let lower = candidate.to_lowercase();
    if !items.iter().any(|item| item.to_lowercase() == lower) {
        items.push(candidate);
    }
}

fn find_canonical(criteria: &[String], name: &str) -> Option<String> {
    let wanted = name.trim().to_lowercase();
    criteria
        .iter()
        .find(|item| item.to_lowercase() == wanted)
        .cloned()
}

// ────────────────────────────────────────────────────────────────────────────
// Score aggregation and the snapshot returned to clients
// ────────────────────────────────────────────────────────────────────────────

/// Per-competency snapshot included in every response.
#[derive(Debug, Clone, Serialize)]
pub struct CompetencySnapshot {
    pub competency: String,
    pub total_score: Option<f64>,
    pub rubric_filled: bool,
    pub covered: Vec<String>,
    pub criteria: Vec<String>,
    pub question_count: u32,
    pub criterion_levels: BTreeMap<String, u8>,
}

pub fn competency_snapshots(ctx: &InterviewContext) -> Vec<CompetencySnapshot> {
    ctx.competency_order
        .iter()
        .map(|name| {
            let score = ctx.evaluator.scores.get(name);
            CompetencySnapshot {
                competency: name.clone(),
                total_score: score.map(|s| s.total_score),
                rubric_filled: score.map(|s| s.rubric_filled).unwrap_or(false),
                covered: ctx.competency_covered.get(name).cloned().unwrap_or_default(),
                criteria: ctx
                    .competency_criteria
                    .get(name)
                    .cloned()
                    .unwrap_or_default(),
                question_count: ctx.question_count(name),
                criterion_levels: ctx
                    .competency_criterion_levels
                    .get(name)
                    .cloned()
                    .unwrap_or_default(),
            }
        })
        .collect()
}

/// Overall score: the rubric-weight-weighted mean of competencies whose
/// rubric is filled, falling back to a simple mean across any competency
/// with a score, and 0.0 before any scoring. Deterministic over the
/// snapshot and always within [0, 5].
pub fn overall_score(ctx: &InterviewContext) -> f64 {
    let filled: Vec<(&CompetencyScore, f64)> = ctx
        .evaluator
        .scores
        .values()
        .filter(|score| score.rubric_filled)
        .map(|score| {
            let weight = ctx
                .rubric_for(&score.competency)
                .map(|r| r.total_weight())
                .unwrap_or(1.0);
            (score, weight.max(0.0))
        })
        .collect();

    let score = if !filled.is_empty() && filled.iter().map(|(_, w)| w).sum::<f64>() > 0.0 {
        let weight_sum: f64 = filled.iter().map(|(_, w)| w).sum();
        filled
            .iter()
            .map(|(s, w)| s.total_score * w)
            .sum::<f64>()
            / weight_sum
    } else if !ctx.evaluator.scores.is_empty() {
        let count = ctx.evaluator.scores.len() as f64;
        ctx.evaluator
            .scores
            .values()
            .map(|s| s.total_score)
            .sum::<f64>()
            / count
    } else {
        0.0
    };

    score.clamp(0.0, 5.0)
}
