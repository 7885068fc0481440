//! Session registry — the only long-lived mutable store in the engine.
//!
//! Each live session is an `Arc<Mutex<SessionEntry>>`: the outer map lock is
//! held only for lookup and insert, while the per-session mutex serializes
//! turns so a given context is mutated by one turn at a time. Idle sessions
//! are evicted lazily on access; completed sessions stay readable for a
//! grace period but reject new turns at the handler.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::context::{Event, InterviewContext, Stage};

pub struct SessionEntry {
    pub context: InterviewContext,
    pub last_touched: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Highest event id already handed to the client; `/turn` responses only
    /// carry events past this cursor.
    event_cursor: u64,
}

impl SessionEntry {
    fn new(context: InterviewContext) -> Self {
        SessionEntry {
            context,
            last_touched: Utc::now(),
            completed_at: None,
            event_cursor: 0,
        }
    }

    /// Replaces the context with a successfully mutated working copy.
    /// This is the single commit point of a turn.
    pub fn commit(&mut self, context: InterviewContext) {
        self.last_touched = Utc::now();
        if context.stage == Stage::Complete && self.completed_at.is_none() {
            self.completed_at = Some(self.last_touched);
        }
        self.context = context;
    }

    /// Events appended since the last response, advancing the cursor.
    pub fn take_new_events(&mut self) -> Vec<Event> {
        let fresh: Vec<Event> = self
            .context
            .events
            .iter()
            .filter(|event| event.event_id > self.event_cursor)
            .cloned()
            .collect();
        if let Some(last) = fresh.last() {
            self.event_cursor = last.event_id;
        }
        fresh
    }
}

pub struct SessionRegistry {
    inner: RwLock<HashMap<Uuid, Arc<Mutex<SessionEntry>>>>,
    idle_timeout: Duration,
    complete_grace: Duration,
}

impl SessionRegistry {
    pub fn new(session_timeout_minutes: f64, complete_grace_minutes: f64) -> Self {
        SessionRegistry {
            inner: RwLock::new(HashMap::new()),
            idle_timeout: minutes(session_timeout_minutes),
            complete_grace: minutes(complete_grace_minutes),
        }
    }

    pub async fn insert(&self, context: InterviewContext) -> (Uuid, Arc<Mutex<SessionEntry>>) {
        let session_id = Uuid::new_v4();
        let entry = Arc::new(Mutex::new(SessionEntry::new(context)));
        self.inner.write().await.insert(session_id, entry.clone());
        (session_id, entry)
    }

    /// Fetches a live session, evicting it first when it idled out (or, for
    /// completed sessions, when the read grace period lapsed).
    pub async fn checkout(&self, session_id: Uuid) -> Result<Arc<Mutex<SessionEntry>>, AppError> {
        let entry = {
            let map = self.inner.read().await;
            map.get(&session_id).cloned()
        };
        let entry = entry.ok_or(AppError::SessionUnknown)?;

        let expired = {
            let guard = entry.lock().await;
            let now = Utc::now();
            match guard.completed_at {
                Some(completed) => now - completed > self.complete_grace,
                None => now - guard.last_touched > self.idle_timeout,
            }
        };
        if expired {
            self.inner.write().await.remove(&session_id);
            return Err(AppError::SessionExpired);
        }
        Ok(entry)
    }

    pub async fn live_count(&self) -> usize {
        self.inner.read().await.len()
    }
}

fn minutes(value: f64) -> Duration {
    Duration::milliseconds((value * 60_000.0) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::candidate::{CandidateProfile, PersonaConfig};
    use crate::models::context::EventType;
    use crate::models::rubric::make_rubric;
    use serde_json::Value;

    fn context() -> InterviewContext {
        InterviewContext::new(
            "int-1".to_string(),
            "Engineer".to_string(),
            String::new(),
            PersonaConfig::default(),
            CandidateProfile {
                candidate_name: "Ada".to_string(),
                resume_summary: String::new(),
                experience_years: "5".to_string(),
                highlighted_experiences: vec![],
            },
            vec![make_rubric("A", &["X"])],
        )
    }

    #[tokio::test]
    async fn test_insert_then_checkout_round_trips() {
        let registry = SessionRegistry::new(30.0, 30.0);
        let (session_id, _) = registry.insert(context()).await;
        let entry = registry.checkout(session_id).await.unwrap();
        assert_eq!(entry.lock().await.context.interview_id, "int-1");
        assert_eq!(registry.live_count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_session_is_rejected() {
        let registry = SessionRegistry::new(30.0, 30.0);
        let result = registry.checkout(Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::SessionUnknown)));
    }

    #[tokio::test]
    async fn test_idle_session_expires_and_is_evicted() {
        let registry = SessionRegistry::new(0.0001, 30.0); // ~6ms idle budget
        let (session_id, _) = registry.insert(context()).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let result = registry.checkout(session_id).await;
        assert!(matches!(result, Err(AppError::SessionExpired)));
        assert_eq!(registry.live_count().await, 0);
        // a second checkout sees the eviction, not the stale entry
        let result = registry.checkout(session_id).await;
        assert!(matches!(result, Err(AppError::SessionUnknown)));
    }

    #[tokio::test]
    async fn test_completed_session_survives_idle_until_grace_lapses() {
        let registry = SessionRegistry::new(0.0001, 30.0);
        let (session_id, entry) = registry.insert(context()).await;
        {
            let mut guard = entry.lock().await;
            let mut ctx = guard.context.clone();
            ctx.stage = Stage::Complete;
            guard.commit(ctx);
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        // idle timeout elapsed, but the completion grace keeps it readable
        assert!(registry.checkout(session_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_completed_session_expires_after_grace() {
        let registry = SessionRegistry::new(30.0, 0.0001);
        let (session_id, entry) = registry.insert(context()).await;
        {
            let mut guard = entry.lock().await;
            let mut ctx = guard.context.clone();
            ctx.stage = Stage::Complete;
            guard.commit(ctx);
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let result = registry.checkout(session_id).await;
        assert!(matches!(result, Err(AppError::SessionExpired)));
    }

    #[tokio::test]
    async fn test_take_new_events_returns_only_fresh_ones() {
        let registry = SessionRegistry::new(30.0, 30.0);
        let (_, entry) = registry.insert(context()).await;
        let mut guard = entry.lock().await;

        let mut ctx = guard.context.clone();
        ctx.record_event(EventType::StageEntered, None, Value::Null);
        ctx.record_event(EventType::Question, None, Value::Null);
        guard.commit(ctx);
        assert_eq!(guard.take_new_events().len(), 2);
        assert!(guard.take_new_events().is_empty());

        let mut ctx = guard.context.clone();
        ctx.record_event(EventType::Answer, None, Value::Null);
        guard.commit(ctx);
        let fresh = guard.take_new_events();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].event_type, EventType::Answer);
    }

    #[tokio::test]
    async fn test_commit_marks_completion() {
        let registry = SessionRegistry::new(30.0, 30.0);
        let (_, entry) = registry.insert(context()).await;
        let mut guard = entry.lock().await;
        assert!(guard.completed_at.is_none());
        let mut ctx = guard.context.clone();
        ctx.stage = Stage::Complete;
        guard.commit(ctx);
        assert!(guard.completed_at.is_some());
    }
}
