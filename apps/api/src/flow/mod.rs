//! Flow manager — the stage state machine at the center of the engine.
//!
//! Owns every transition (warmup → competency[k] → wrapup → complete),
//! the per-turn algorithm, coverage accounting, and advance decisions.
//! Agents never declare stage; they only return plans this module applies.
//!
//! Both `start` and `turn` consume an owned context and return the mutated
//! copy: callers commit it to the session registry only on success, so a
//! failed turn leaves the stored session untouched.

pub mod coverage;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::agents::auto_reply::AutoReplyAgent;
use crate::agents::competency::CompetencyAgent;
use crate::agents::evaluator::{EvaluationPlan, EvaluatorAgent};
use crate::agents::primer::{placeholder_anchors, PrimerAgent};
use crate::agents::warmup::{WarmupAgent, WarmupMode};
use crate::agents::{
    AUTO_REPLY_AGENT_KEY, COMPETENCY_AGENT_KEY, EVALUATOR_AGENT_KEY, PRIMER_AGENT_KEY,
    WARMUP_AGENT_KEY,
};
use crate::config::{FlowSettings, RouteRegistry};
use crate::llm_gateway::{Gateway, LlmError};
use crate::models::context::{
    CompetencyScore, Escalation, EventType, InterviewContext, Message, Speaker, Stage,
};
use coverage::{
    advance_reason, criteria_hits, escalation_for, merge_unique, overall_score,
    prioritize_remaining, AdvanceReason,
};

/// The interviewer prompt returned to clients, with its audit metadata.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionOut {
    pub content: String,
    pub metadata: QuestionMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionMetadata {
    pub stage: Stage,
    pub competency: Option<String>,
    pub reasoning: String,
    pub escalation: Escalation,
    pub follow_up_prompt: String,
    pub targeted_criteria: Vec<String>,
}

pub struct StartOutcome {
    pub context: InterviewContext,
    pub question: QuestionOut,
}

pub struct TurnOutcome {
    pub context: InterviewContext,
    pub question: Option<QuestionOut>,
    pub evaluation: Option<CompetencyScore>,
}

pub struct FlowManager {
    gateway: Gateway,
    settings: FlowSettings,
    primer: PrimerAgent,
    warmup: WarmupAgent,
    competency: CompetencyAgent,
    evaluator: EvaluatorAgent,
    auto_reply: AutoReplyAgent,
}

impl FlowManager {
    pub fn new(gateway: Gateway, registry: &RouteRegistry, settings: FlowSettings) -> Self {
        FlowManager {
            primer: PrimerAgent::new(registry.route_for(PRIMER_AGENT_KEY).clone()),
            warmup: WarmupAgent::new(registry.route_for(WARMUP_AGENT_KEY).clone()),
            competency: CompetencyAgent::new(registry.route_for(COMPETENCY_AGENT_KEY).clone()),
            evaluator: EvaluatorAgent::new(registry.route_for(EVALUATOR_AGENT_KEY).clone()),
            auto_reply: AutoReplyAgent::new(registry.route_for(AUTO_REPLY_AGENT_KEY).clone()),
            gateway,
            settings,
        }
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    /// Runs the pre-turn stage of a fresh session: seeds project anchors via
    /// the primer (degrading to placeholders on failure) and asks the
    /// opening warmup question.
    pub async fn start(&self, mut ctx: InterviewContext) -> Result<StartOutcome, LlmError> {
        ctx.record_event(EventType::StageEntered, None, json!({"stage": "warmup"}));

        match self
            .primer
            .invoke(
                &self.gateway,
                &ctx.job_title,
                &ctx.job_description,
                &ctx.profile,
                &ctx.competency_order,
            )
            .await
        {
            Ok(anchors) => ctx.competency_projects = anchors,
            Err(err) => {
                warn!(error = %err, "primer exhausted retries; seeding placeholder anchors");
                ctx.competency_projects = placeholder_anchors(&ctx.competency_order);
                ctx.record_event(
                    EventType::Hint,
                    None,
                    json!({
                        "message": "Project anchors degraded to a generic prompt after primer retries were exhausted"
                    }),
                );
            }
        }

        self.maybe_checkpoint(&mut ctx);
        let question = self.ask_warmup(&mut ctx).await?;
        Ok(StartOutcome {
            context: ctx,
            question,
        })
    }

    /// The per-turn algorithm: record the answer, evaluate it, update
    /// coverage and streaks, decide stage transitions, and ask the next
    /// question for whatever stage the session landed in.
    pub async fn turn(
        &self,
        mut ctx: InterviewContext,
        answer: &str,
    ) -> Result<TurnOutcome, LlmError> {
        let answered_stage = ctx.stage;
        let active = ctx.active_competency().map(str::to_string);
        let question_text = last_question(&ctx);

        ctx.push_message(Message {
            speaker: Speaker::Candidate,
            content: answer.to_string(),
            tone: "neutral".to_string(),
            competency: active.clone(),
            targeted_criteria: ctx.targeted_criteria.clone(),
            project_anchor: ctx.project_anchor.clone(),
        });
        ctx.record_event(EventType::Answer, active.clone(), json!({"answer": answer}));

        let rubric = active.as_ref().and_then(|c| ctx.rubric_for(c)).cloned();
        let plan = self
            .evaluator
            .invoke(
                &self.gateway,
                answered_stage,
                active.as_deref(),
                rubric.as_ref(),
                &ctx.evaluator,
                &ctx.transcript,
                self.settings.evaluator_window_messages,
                &question_text,
                answer,
                &ctx.job_title,
            )
            .await?;
        let evaluation = self.apply_evaluation(&mut ctx, plan, active.as_deref());

        match answered_stage {
            Stage::Competency => {
                if let Some(comp) = &active {
                    self.maybe_advance(&mut ctx, comp);
                }
            }
            Stage::Warmup => {
                if ctx.warmup_count >= self.settings.warmup_limit {
                    self.activate_competency(&mut ctx, 0);
                }
            }
            Stage::Wrapup => {
                self.close_out(&mut ctx).await?;
            }
            Stage::Complete => {}
        }

        let question = match ctx.stage {
            Stage::Warmup => Some(self.ask_warmup(&mut ctx).await?),
            Stage::Competency => Some(self.ask_competency(&mut ctx).await?),
            Stage::Wrapup if ctx.wrapup_count == 0 => Some(self.ask_wrapup(&mut ctx).await?),
            _ => None,
        };

        self.maybe_checkpoint(&mut ctx);
        Ok(TurnOutcome {
            context: ctx,
            question,
            evaluation,
        })
    }

    /// Synthesizes a candidate answer for the pending question at the
    /// requested depth level (auto-answer simulation mode).
    pub async fn auto_answer(
        &self,
        ctx: &InterviewContext,
        level: u8,
    ) -> Result<String, LlmError> {
        let question = last_question(ctx);
        if question.is_empty() {
            return Err(LlmError::Invalid(
                "no pending interviewer question to answer".to_string(),
            ));
        }
        self.auto_reply
            .invoke(
                &self.gateway,
                &question,
                &ctx.profile.resume_summary,
                ctx.active_competency(),
                &ctx.project_anchor,
                &ctx.targeted_criteria,
                &ctx.transcript,
                level,
            )
            .await
    }

    // ── evaluation application ──────────────────────────────────────────────

    fn apply_evaluation(
        &self,
        ctx: &mut InterviewContext,
        plan: EvaluationPlan,
        active: Option<&str>,
    ) -> Option<CompetencyScore> {
        if !plan.summary.is_empty() {
            ctx.evaluator.summary = plan.summary;
        }
        for (key, bullets) in plan.anchors_delta {
            merge_unique(ctx.evaluator.anchors.entry(key).or_default(), bullets);
        }
        for (key, notes) in &plan.rubric_updates {
            merge_unique(
                ctx.evaluator.rubric_updates.entry(key.clone()).or_default(),
                notes.clone(),
            );
        }

        let (comp, score) = match (active, plan.competency_score) {
            (Some(comp), Some(score)) => (comp.to_string(), score),
            (active, _) => {
                ctx.record_event(
                    EventType::Evaluation,
                    active.map(str::to_string),
                    json!({"summary": ctx.evaluator.summary.clone()}),
                );
                return None;
            }
        };

        let criteria = ctx.competency_criteria.get(&comp).cloned().unwrap_or_default();
        let hits = criteria_hits(&criteria, Some(&score), plan.rubric_updates.get(&comp));

        let levels = ctx
            .competency_criterion_levels
            .entry(comp.clone())
            .or_default();
        for item in &score.criterion_scores {
            if item.score >= 1.0 {
                let level = item.score.round().clamp(0.0, 5.0) as u8;
                let entry = levels.entry(item.criterion.clone()).or_insert(0);
                *entry = (*entry).max(level);
            }
        }
        merge_unique(ctx.competency_covered.entry(comp.clone()).or_default(), hits);

        ctx.evaluator.scores.insert(comp.clone(), score.clone());

        let streak = ctx.competency_low_scores.entry(comp.clone()).or_insert(0);
        if score.total_score <= self.settings.low_score_threshold {
            *streak += 1;
        } else {
            *streak = 0;
        }

        ctx.record_event(
            EventType::Evaluation,
            Some(comp.clone()),
            serde_json::to_value(&score).unwrap_or(Value::Null),
        );

        if score.follow_up_needed && !score.rubric_filled {
            let note = "Evaluator suggests a probing follow-up.";
            ctx.push_message(system_message(note, Some(comp.clone())));
            ctx.record_event(
                EventType::FollowUp,
                Some(comp.clone()),
                json!({"message": note}),
            );
        }
        for hint in &score.hints {
            ctx.push_message(system_message(&format!("Hint: {hint}"), Some(comp.clone())));
            ctx.record_event(EventType::Hint, Some(comp.clone()), json!({"hint": hint}));
        }

        Some(score)
    }

    // ── stage transitions ───────────────────────────────────────────────────

    fn maybe_advance(&self, ctx: &mut InterviewContext, comp: &str) {
        let total = ctx.competency_criteria.get(comp).map(Vec::len).unwrap_or(0);
        let covered = ctx.competency_covered.get(comp).map(Vec::len).unwrap_or(0);
        let reason = advance_reason(
            total,
            covered,
            ctx.question_count(comp),
            ctx.low_score_streak(comp),
            &self.settings,
        );
        let reason = match reason {
            Some(reason) => reason,
            None => return,
        };
        if reason == AdvanceReason::LowScoreStreak {
            let streak = ctx.low_score_streak(comp);
            ctx.record_event(
                EventType::Hint,
                Some(comp.to_string()),
                json!({
                    "message": format!(
                        "Moving on from {comp} after {streak} consecutive low-scoring answers"
                    ),
                    "reason": reason.label()
                }),
            );
        }
        self.activate_competency(ctx, ctx.competency_index + 1);
    }

    /// Activates the first usable competency at or after `index`, skipping
    /// degraded rubrics with a hint event; past the end the session enters
    /// wrapup.
    fn activate_competency(&self, ctx: &mut InterviewContext, index: usize) {
        ctx.stage = Stage::Competency;
        let mut index = index;
        loop {
            if index >= ctx.competency_order.len() {
                ctx.stage = Stage::Wrapup;
                ctx.competency_index = index;
                ctx.project_anchor = String::new();
                ctx.targeted_criteria.clear();
                ctx.record_event(EventType::StageEntered, None, json!({"stage": "wrapup"}));
                return;
            }
            let name = ctx.competency_order[index].clone();
            let usable = ctx
                .competency_criteria
                .get(&name)
                .map(|criteria| !criteria.is_empty())
                .unwrap_or(false);
            if !usable {
                warn!(competency = %name, "rubric has no usable criteria; skipping");
                ctx.record_event(
                    EventType::Hint,
                    Some(name.clone()),
                    json!({
                        "message": format!("Skipped {name}: rubric has no usable criteria"),
                        "reason": "rubric_degraded"
                    }),
                );
                index += 1;
                continue;
            }
            ctx.competency_index = index;
            ctx.project_anchor = ctx
                .competency_projects
                .get(&name)
                .cloned()
                .unwrap_or_default();
            ctx.targeted_criteria.clear();
            ctx.competency_question_counts.entry(name.clone()).or_insert(0);
            ctx.competency_low_scores.entry(name.clone()).or_insert(0);
            ctx.record_event(
                EventType::StageEntered,
                Some(name),
                json!({"stage": "competency"}),
            );
            return;
        }
    }

    async fn close_out(&self, ctx: &mut InterviewContext) -> Result<(), LlmError> {
        let plan = self
            .warmup
            .invoke(
                &self.gateway,
                WarmupMode::Closing,
                &ctx.persona,
                &ctx.profile,
                &ctx.job_title,
                &ctx.transcript,
            )
            .await?;
        let tone = plan.normalized_tone();
        ctx.push_message(Message {
            speaker: Speaker::Interviewer,
            content: plan.question.trim().to_string(),
            tone,
            competency: None,
            targeted_criteria: vec![],
            project_anchor: String::new(),
        });
        ctx.record_event(
            EventType::Question,
            None,
            json!({"content": plan.question.trim(), "closing": true}),
        );
        ctx.stage = Stage::Complete;
        ctx.record_event(EventType::StageEntered, None, json!({"stage": "complete"}));
        Ok(())
    }

    // ── question emission ───────────────────────────────────────────────────

    async fn ask_warmup(&self, ctx: &mut InterviewContext) -> Result<QuestionOut, LlmError> {
        let plan = self
            .warmup
            .invoke(
                &self.gateway,
                WarmupMode::Opening,
                &ctx.persona,
                &ctx.profile,
                &ctx.job_title,
                &ctx.transcript,
            )
            .await?;
        ctx.warmup_count += 1;
        let metadata = QuestionMetadata {
            stage: Stage::Warmup,
            competency: None,
            reasoning: plan.reasoning.clone(),
            escalation: Escalation::Broad,
            follow_up_prompt: plan.follow_up_prompt.clone(),
            targeted_criteria: vec![],
        };
        Ok(self.emit_question(ctx, plan.question.trim().to_string(), plan.normalized_tone(), metadata))
    }

    async fn ask_wrapup(&self, ctx: &mut InterviewContext) -> Result<QuestionOut, LlmError> {
        let plan = self
            .warmup
            .invoke(
                &self.gateway,
                WarmupMode::Wrapup,
                &ctx.persona,
                &ctx.profile,
                &ctx.job_title,
                &ctx.transcript,
            )
            .await?;
        ctx.wrapup_count += 1;
        let metadata = QuestionMetadata {
            stage: Stage::Wrapup,
            competency: None,
            reasoning: plan.reasoning.clone(),
            escalation: Escalation::Broad,
            follow_up_prompt: plan.follow_up_prompt.clone(),
            targeted_criteria: vec![],
        };
        Ok(self.emit_question(ctx, plan.question.trim().to_string(), plan.normalized_tone(), metadata))
    }

    async fn ask_competency(&self, ctx: &mut InterviewContext) -> Result<QuestionOut, LlmError> {
        let comp = ctx
            .active_competency()
            .expect("stage=competency implies an active competency")
            .to_string();
        let criteria = ctx.competency_criteria.get(&comp).cloned().unwrap_or_default();
        let covered = ctx.competency_covered.get(&comp).cloned().unwrap_or_default();
        let levels = ctx
            .competency_criterion_levels
            .get(&comp)
            .cloned()
            .unwrap_or_default();
        let remaining = prioritize_remaining(&criteria, &covered, &levels);
        let question_index = ctx.question_count(&comp);
        let last_targeted_level = ctx
            .targeted_criteria
            .iter()
            .map(|criterion| ctx.criterion_level(&comp, criterion))
            .min();
        let guidance = escalation_for(question_index, last_targeted_level);

        let plan = self
            .competency
            .invoke(
                &self.gateway,
                &ctx.persona,
                &ctx.job_title,
                &ctx.profile.candidate_name,
                &comp,
                &ctx.project_anchor,
                &remaining,
                &ctx.transcript,
                question_index,
                guidance,
            )
            .await?;
        let targets = plan.resolved_targets(&remaining);
        ctx.targeted_criteria = targets.clone();
        *ctx
            .competency_question_counts
            .entry(comp.clone())
            .or_insert(0) += 1;
        let metadata = QuestionMetadata {
            stage: Stage::Competency,
            competency: Some(comp),
            reasoning: plan.reasoning.clone(),
            escalation: plan.escalation,
            follow_up_prompt: plan.follow_up_prompt.clone(),
            targeted_criteria: targets,
        };
        Ok(self.emit_question(ctx, plan.question.trim().to_string(), plan.normalized_tone(), metadata))
    }

    fn emit_question(
        &self,
        ctx: &mut InterviewContext,
        content: String,
        tone: String,
        metadata: QuestionMetadata,
    ) -> QuestionOut {
        ctx.push_message(Message {
            speaker: Speaker::Interviewer,
            content: content.clone(),
            tone,
            competency: metadata.competency.clone(),
            targeted_criteria: metadata.targeted_criteria.clone(),
            project_anchor: ctx.project_anchor.clone(),
        });
        ctx.questions_asked += 1;
        ctx.record_event(
            EventType::Question,
            metadata.competency.clone(),
            json!({
                "content": content.clone(),
                "metadata": serde_json::to_value(&metadata).unwrap_or(Value::Null)
            }),
        );
        QuestionOut { content, metadata }
    }

    /// Emits a checkpoint event when the configured wall-time interval has
    /// elapsed (and once at session start).
    fn maybe_checkpoint(&self, ctx: &mut InterviewContext) {
        let now = chrono::Utc::now();
        let interval = chrono::Duration::milliseconds(
            (self.settings.checkpoint_interval_minutes * 60_000.0) as i64,
        );
        let due = match ctx.last_checkpoint {
            None => true,
            Some(last) => now - last >= interval,
        };
        if !due {
            return;
        }
        let scores: std::collections::BTreeMap<&String, f64> = ctx
            .evaluator
            .scores
            .iter()
            .map(|(name, score)| (name, score.total_score))
            .collect();
        let payload = json!({
            "competency_scores": scores,
            "overall_score": overall_score(ctx)
        });
        ctx.record_event(EventType::Checkpoint, None, payload);
        ctx.last_checkpoint = Some(now);
    }
}

fn last_question(ctx: &InterviewContext) -> String {
    ctx.transcript
        .iter()
        .rev()
        .find(|m| m.speaker == Speaker::Interviewer)
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

fn system_message(content: &str, competency: Option<String>) -> Message {
    Message {
        speaker: Speaker::System,
        content: content.to_string(),
        tone: "neutral".to_string(),
        competency,
        targeted_criteria: vec![],
        project_anchor: String::new(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests — scripted end-to-end scenarios through the flow
// ────────────────────────────────────────────────────────────────────────────
