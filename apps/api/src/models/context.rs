//! Session state — the mutable `InterviewContext` owned by the session
//! manager, mutated only by the flow manager through small atomic steps.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::candidate::{CandidateProfile, PersonaConfig};
use super::rubric::Rubric;

/// Interview stage. Advances monotonically and never regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Warmup,
    Competency,
    Wrapup,
    Complete,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Stage::Warmup => "warmup",
            Stage::Competency => "competency",
            Stage::Wrapup => "wrapup",
            Stage::Complete => "complete",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StageEntered,
    Question,
    Answer,
    Evaluation,
    Hint,
    FollowUp,
    Checkpoint,
}

/// Rhetorical mode of the next interviewer prompt within a competency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Escalation {
    Broad,
    Why,
    How,
    Challenge,
    Hint,
    Edge,
}

impl std::fmt::Display for Escalation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Escalation::Broad => "broad",
            Escalation::Why => "why",
            Escalation::How => "how",
            Escalation::Challenge => "challenge",
            Escalation::Hint => "hint",
            Escalation::Edge => "edge",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Interviewer,
    Candidate,
    System,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub speaker: Speaker,
    pub content: String,
    pub tone: String,
    pub competency: Option<String>,
    #[serde(default)]
    pub targeted_criteria: Vec<String>,
    #[serde(default)]
    pub project_anchor: String,
}

/// Timeline event. Event ids are strictly increasing within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: u64,
    pub created_at: DateTime<Utc>,
    pub stage: Stage,
    pub competency: Option<String>,
    pub event_type: EventType,
    #[serde(default)]
    pub payload: Value,
}

/// One scored criterion inside a competency score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion: String,
    pub score: f64,
    pub weight: f64,
    pub rationale: String,
}

/// Evaluator verdict for one competency, normalized by the evaluator agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyScore {
    pub competency: String,
    pub total_score: f64,
    pub rubric_filled: bool,
    pub criterion_scores: Vec<CriterionScore>,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default)]
    pub follow_up_needed: bool,
}

/// Evaluator memory: running summary, anchor notes, rubric deltas, scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorState {
    pub summary: String,
    pub anchors: BTreeMap<String, Vec<String>>,
    pub rubric_updates: BTreeMap<String, Vec<String>>,
    pub scores: BTreeMap<String, CompetencyScore>,
}

/// The per-session mutable state. The session manager owns the instance;
/// the flow manager mutates a working copy and commits it atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewContext {
    pub interview_id: String,
    pub job_title: String,
    pub job_description: String,
    pub persona: PersonaConfig,
    pub profile: CandidateProfile,

    pub stage: Stage,
    pub competency_order: Vec<String>,
    pub competency_index: usize,
    pub rubrics: BTreeMap<String, Rubric>,

    pub competency_projects: BTreeMap<String, String>,
    pub competency_criteria: BTreeMap<String, Vec<String>>,
    pub competency_covered: BTreeMap<String, Vec<String>>,
    pub competency_criterion_levels: BTreeMap<String, BTreeMap<String, u8>>,
    pub competency_question_counts: BTreeMap<String, u32>,
    pub competency_low_scores: BTreeMap<String, u32>,

    pub targeted_criteria: Vec<String>,
    pub project_anchor: String,
    pub warmup_count: u32,
    pub wrapup_count: u32,
    pub questions_asked: u32,

    pub transcript: Vec<Message>,
    pub events: Vec<Event>,
    pub next_event_id: u64,

    pub evaluator: EvaluatorState,
    pub last_checkpoint: Option<DateTime<Utc>>,
}

impl InterviewContext {
    pub fn new(
        interview_id: String,
        job_title: String,
        job_description: String,
        persona: PersonaConfig,
        profile: CandidateProfile,
        rubrics: Vec<Rubric>,
    ) -> Self {
        let competency_order: Vec<String> =
            rubrics.iter().map(|r| r.competency.clone()).collect();
        let competency_criteria = rubrics
            .iter()
            .map(|r| (r.competency.clone(), r.usable_criteria()))
            .collect();
        let rubrics = rubrics
            .into_iter()
            .map(|r| (r.competency.clone(), r))
            .collect();
        InterviewContext {
            interview_id,
            job_title,
            job_description,
            persona,
            profile,
            stage: Stage::Warmup,
            competency_order,
            competency_index: 0,
            rubrics,
            competency_projects: BTreeMap::new(),
            competency_criteria,
            competency_covered: BTreeMap::new(),
            competency_criterion_levels: BTreeMap::new(),
            competency_question_counts: BTreeMap::new(),
            competency_low_scores: BTreeMap::new(),
            targeted_criteria: Vec::new(),
            project_anchor: String::new(),
            warmup_count: 0,
            wrapup_count: 0,
            questions_asked: 0,
            transcript: Vec::new(),
            events: Vec::new(),
            next_event_id: 1,
            evaluator: EvaluatorState::default(),
            last_checkpoint: None,
        }
    }

    /// The competency under probe, or `None` outside the competency stage.
    pub fn active_competency(&self) -> Option<&str> {
        if self.stage != Stage::Competency {
            return None;
        }
        self.competency_order
            .get(self.competency_index)
            .map(String::as_str)
    }

    pub fn rubric_for(&self, competency: &str) -> Option<&Rubric> {
        self.rubrics.get(competency)
    }

    /// Appends a timeline event, assigning the next monotonic id.
    pub fn record_event(
        &mut self,
        event_type: EventType,
        competency: Option<String>,
        payload: Value,
    ) -> u64 {
        let event_id = self.next_event_id;
        self.events.push(Event {
            event_id,
            created_at: Utc::now(),
            stage: self.stage,
            competency,
            event_type,
            payload,
        });
        self.next_event_id += 1;
        event_id
    }

    pub fn push_message(&mut self, message: Message) {
        self.transcript.push(message);
    }

    pub fn question_count(&self, competency: &str) -> u32 {
        self.competency_question_counts
            .get(competency)
            .copied()
            .unwrap_or(0)
    }

    pub fn low_score_streak(&self, competency: &str) -> u32 {
        self.competency_low_scores
            .get(competency)
            .copied()
            .unwrap_or(0)
    }

    pub fn criterion_level(&self, competency: &str, criterion: &str) -> u8 {
        self.competency_criterion_levels
            .get(competency)
            .and_then(|levels| levels.get(criterion))
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rubric::make_rubric;

    fn make_context() -> InterviewContext {
        InterviewContext::new(
            "int-1".to_string(),
            "Senior Backend Engineer".to_string(),
            "Own the ingestion platform".to_string(),
            PersonaConfig::default(),
            CandidateProfile {
                candidate_name: "Ada".to_string(),
                resume_summary: "Ten years building data platforms".to_string(),
                experience_years: "10+".to_string(),
                highlighted_experiences: vec!["Rebuilt the ETL pipeline".to_string()],
            },
            vec![
                make_rubric("System Design", &["Scalability", "Trade-offs"]),
                make_rubric("Data Modeling", &["Normalization"]),
            ],
        )
    }

    #[test]
    fn test_event_ids_are_strictly_increasing() {
        let mut ctx = make_context();
        let first = ctx.record_event(EventType::StageEntered, None, Value::Null);
        let second = ctx.record_event(EventType::Question, None, Value::Null);
        let third = ctx.record_event(EventType::Answer, None, Value::Null);
        assert!(first < second && second < third);
        assert_eq!(ctx.events.len(), 3);
    }

    #[test]
    fn test_active_competency_follows_stage_and_index() {
        let mut ctx = make_context();
        assert_eq!(ctx.active_competency(), None);
        ctx.stage = Stage::Competency;
        assert_eq!(ctx.active_competency(), Some("System Design"));
        ctx.competency_index = 1;
        assert_eq!(ctx.active_competency(), Some("Data Modeling"));
        ctx.stage = Stage::Wrapup;
        assert_eq!(ctx.active_competency(), None);
    }

    #[test]
    fn test_stage_ordering_supports_monotonicity_checks() {
        assert!(Stage::Warmup < Stage::Competency);
        assert!(Stage::Competency < Stage::Wrapup);
        assert!(Stage::Wrapup < Stage::Complete);
    }

    #[test]
    fn test_context_round_trips_through_json() {
        let mut ctx = make_context();
        ctx.record_event(
            EventType::StageEntered,
            None,
            serde_json::json!({"stage": "warmup"}),
        );
        ctx.push_message(Message {
            speaker: Speaker::Interviewer,
            content: "Tell me about a recent project.".to_string(),
            tone: "positive".to_string(),
            competency: None,
            targeted_criteria: vec![],
            project_anchor: String::new(),
        });
        let raw = serde_json::to_string(&ctx).unwrap();
        let restored: InterviewContext = serde_json::from_str(&raw).unwrap();
        assert_eq!(ctx, restored);
    }

    #[test]
    fn test_stage_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Stage::Wrapup).unwrap(), "\"wrapup\"");
        assert_eq!(
            serde_json::to_string(&EventType::StageEntered).unwrap(),
            "\"stage_entered\""
        );
        assert_eq!(
            serde_json::to_string(&Escalation::Challenge).unwrap(),
            "\"challenge\""
        );
    }
}
