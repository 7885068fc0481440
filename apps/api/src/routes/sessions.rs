//! Axum route handlers for the session API: `/sessions/start` and
//! `/sessions/turn`.
//!
//! A turn runs on a working copy of the session context under the
//! per-session mutex and commits only on success, so an LLM failure or a
//! deadline overrun leaves the stored session exactly as it was.

use std::time::Instant;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agents::auto_reply::DEFAULT_LEVEL;
use crate::errors::AppError;
use crate::flow::coverage::{competency_snapshots, overall_score, CompetencySnapshot};
use crate::flow::QuestionOut;
use crate::models::candidate::{CandidateProfile, PersonaConfig};
use crate::models::context::{CompetencyScore, Event, InterviewContext, Stage};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub interview_id: String,
    pub candidate_id: String,
    #[serde(default)]
    pub persona: Option<PersonaConfig>,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub session_id: Uuid,
    pub stage: Stage,
    pub persona: PersonaConfig,
    pub profile: CandidateProfile,
    pub question: Option<QuestionOut>,
    pub events: Vec<Event>,
    pub competencies: Vec<CompetencySnapshot>,
    pub overall_score: f64,
    pub questions_asked: u32,
    pub elapsed_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub session_id: Uuid,
    #[serde(default)]
    pub answer: Option<String>,
    /// When false together with `auto_generate`, the drafted answer is
    /// returned without being submitted.
    #[serde(default)]
    pub auto_send: Option<bool>,
    #[serde(default)]
    pub auto_generate: Option<bool>,
    /// Requested depth for the auto-generated answer, 1..=5.
    #[serde(default)]
    pub candidate_level: Option<u8>,
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub stage: Stage,
    pub question: Option<QuestionOut>,
    pub evaluation: Option<CompetencyScore>,
    pub draft_answer: Option<String>,
    pub events: Vec<Event>,
    pub competencies: Vec<CompetencySnapshot>,
    pub overall_score: f64,
    pub questions_asked: u32,
    pub elapsed_ms: u64,
    pub completed: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /sessions/start
///
/// Builds the interview context from the stored rubric bundle and candidate
/// profile, runs the primer and the opening warmup question, and registers
/// the live session.
pub async fn handle_start(
    State(state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> Result<Json<StartResponse>, AppError> {
    let started_at = Instant::now();
    if request.interview_id.trim().is_empty() {
        return Err(AppError::InvalidPayload(
            "interview_id cannot be empty".to_string(),
        ));
    }
    if request.candidate_id.trim().is_empty() {
        return Err(AppError::InvalidPayload(
            "candidate_id cannot be empty".to_string(),
        ));
    }

    let plan = state
        .rubrics
        .get_by_interview(&request.interview_id)
        .await
        .ok_or_else(|| AppError::InterviewNotFound(request.interview_id.clone()))?;
    let profile = state
        .candidates
        .get(&request.candidate_id)
        .await
        .ok_or_else(|| AppError::CandidateNotFound(request.candidate_id.clone()))?;

    for rubric in &plan.rubrics {
        if let Err(reason) = rubric.validate() {
            tracing::warn!(interview_id = %plan.interview_id, %reason, "rubric failed validation");
        }
    }

    let context = InterviewContext::new(
        plan.interview_id,
        plan.job_title,
        plan.job_description,
        request.persona.unwrap_or_default(),
        profile,
        plan.rubrics,
    );

    let deadline = std::time::Duration::from_millis(state.flow.settings().turn_deadline_ms);
    let outcome = tokio::time::timeout(deadline, state.flow.start(context))
        .await
        .map_err(|_| AppError::Llm("turn deadline exceeded".to_string()))??;

    let (session_id, entry) = state.sessions.insert(outcome.context).await;
    let mut guard = entry.lock().await;
    let events = guard.take_new_events();
    let context = &guard.context;

    Ok(Json(StartResponse {
        session_id,
        stage: context.stage,
        persona: context.persona.clone(),
        profile: context.profile.clone(),
        question: Some(outcome.question),
        events,
        competencies: competency_snapshots(context),
        overall_score: overall_score(context),
        questions_asked: context.questions_asked,
        elapsed_ms: started_at.elapsed().as_millis() as u64,
    }))
}

/// POST /sessions/turn
///
/// Applies one candidate answer: evaluate, update coverage and stage, and
/// ask the next question. With `auto_generate`, the candidate answer itself
/// is synthesized at the requested depth level first.
pub async fn handle_turn(
    State(state): State<AppState>,
    Json(request): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, AppError> {
    let started_at = Instant::now();
    let entry = state.sessions.checkout(request.session_id).await?;
    let mut guard = entry.lock().await;

    if guard.completed_at.is_some() || guard.context.stage == Stage::Complete {
        return Err(AppError::SessionComplete);
    }

    let deadline = std::time::Duration::from_millis(state.flow.settings().turn_deadline_ms);
    let provided = request
        .answer
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string);
    let auto_generate = request.auto_generate.unwrap_or(false);

    let answer = match provided {
        Some(answer) => answer,
        None if auto_generate => {
            let level = request.candidate_level.unwrap_or(DEFAULT_LEVEL);
            let draft = tokio::time::timeout(
                deadline,
                state.flow.auto_answer(&guard.context, level),
            )
            .await
            .map_err(|_| AppError::Llm("turn deadline exceeded".to_string()))??;
            if !request.auto_send.unwrap_or(true) {
                // Draft-only mode: hand the generated answer back without
                // mutating the session.
                let events = guard.take_new_events();
                let context = &guard.context;
                return Ok(Json(TurnResponse {
                    stage: context.stage,
                    question: None,
                    evaluation: None,
                    draft_answer: Some(draft),
                    events,
                    competencies: competency_snapshots(context),
                    overall_score: overall_score(context),
                    questions_asked: context.questions_asked,
                    elapsed_ms: started_at.elapsed().as_millis() as u64,
                    completed: false,
                }));
            }
            draft
        }
        None => {
            return Err(AppError::InvalidPayload(
                "answer is required unless auto_generate is set".to_string(),
            ))
        }
    };

    let working = guard.context.clone();
    let outcome = tokio::time::timeout(deadline, state.flow.turn(working, &answer))
        .await
        .map_err(|_| AppError::Llm("turn deadline exceeded".to_string()))??;

    guard.commit(outcome.context);
    let events = guard.take_new_events();
    let context = &guard.context;
    let completed = context.stage == Stage::Complete;

    Ok(Json(TurnResponse {
        stage: context.stage,
        question: outcome.question,
        evaluation: outcome.evaluation,
        draft_answer: None,
        events,
        competencies: competency_snapshots(context),
        overall_score: overall_score(context),
        questions_asked: context.questions_asked,
        elapsed_ms: started_at.elapsed().as_millis() as u64,
        completed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_request_accepts_minimal_payload() {
        let raw = format!(r#"{{"session_id": "{}"}}"#, Uuid::new_v4());
        let request: TurnRequest = serde_json::from_str(&raw).unwrap();
        assert!(request.answer.is_none());
        assert!(request.auto_generate.is_none());
    }

    #[test]
    fn test_turn_request_parses_auto_fields() {
        let raw = format!(
            r#"{{"session_id": "{}", "auto_generate": true, "auto_send": false, "candidate_level": 4}}"#,
            Uuid::new_v4()
        );
        let request: TurnRequest = serde_json::from_str(&raw).unwrap();
        assert_eq!(request.auto_generate, Some(true));
        assert_eq!(request.auto_send, Some(false));
        assert_eq!(request.candidate_level, Some(4));
    }

    #[test]
    fn test_start_request_persona_is_optional() {
        let raw = r#"{"interview_id": "int-1", "candidate_id": "cand-1"}"#;
        let request: StartRequest = serde_json::from_str(raw).unwrap();
        assert!(request.persona.is_none());
    }
}
