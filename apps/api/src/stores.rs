//! Collaborator contracts consumed by the engine: rubric bundles keyed by
//! interview and candidate profiles keyed by candidate id. Relational
//! persistence lives outside the core, so the default backends here are
//! in-memory maps seeded at startup.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::models::candidate::CandidateProfile;
use crate::models::rubric::Rubric;

/// The rubric bundle produced for one interview before any session starts.
#[derive(Debug, Clone, Deserialize)]
pub struct InterviewPlan {
    pub interview_id: String,
    pub job_title: String,
    #[serde(default)]
    pub job_description: String,
    pub rubrics: Vec<Rubric>,
}

#[async_trait]
pub trait RubricStore: Send + Sync {
    async fn get_by_interview(&self, interview_id: &str) -> Option<InterviewPlan>;
}

#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn get(&self, candidate_id: &str) -> Option<CandidateProfile>;
}

#[derive(Default)]
pub struct InMemoryRubricStore {
    inner: RwLock<HashMap<String, InterviewPlan>>,
}

impl InMemoryRubricStore {
    pub async fn insert(&self, plan: InterviewPlan) {
        self.inner
            .write()
            .await
            .insert(plan.interview_id.clone(), plan);
    }
}

#[async_trait]
impl RubricStore for InMemoryRubricStore {
    async fn get_by_interview(&self, interview_id: &str) -> Option<InterviewPlan> {
        self.inner.read().await.get(interview_id).cloned()
    }
}

#[derive(Default)]
pub struct InMemoryCandidateStore {
    inner: RwLock<HashMap<String, CandidateProfile>>,
}

impl InMemoryCandidateStore {
    pub async fn insert(&self, candidate_id: String, profile: CandidateProfile) {
        self.inner.write().await.insert(candidate_id, profile);
    }
}

#[async_trait]
impl CandidateStore for InMemoryCandidateStore {
    async fn get(&self, candidate_id: &str) -> Option<CandidateProfile> {
        self.inner.read().await.get(candidate_id).cloned()
    }
}

/// Seed document loaded at startup when `PARLEY_SEED` is set.
#[derive(Debug, Deserialize)]
pub struct SeedDoc {
    #[serde(default)]
    pub interviews: Vec<InterviewPlan>,
    #[serde(default)]
    pub candidates: HashMap<String, CandidateProfile>,
}

impl SeedDoc {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read seed file at {}", path.display()))?;
        serde_json::from_str(&raw).context("Seed file is not valid JSON")
    }

    pub async fn apply(
        self,
        rubrics: &InMemoryRubricStore,
        candidates: &InMemoryCandidateStore,
    ) -> (usize, usize) {
        let counts = (self.interviews.len(), self.candidates.len());
        for plan in self.interviews {
            rubrics.insert(plan).await;
        }
        for (candidate_id, profile) in self.candidates {
            candidates.insert(candidate_id, profile).await;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rubric::make_rubric;

    #[tokio::test]
    async fn test_in_memory_stores_round_trip() {
        let rubrics = InMemoryRubricStore::default();
        rubrics
            .insert(InterviewPlan {
                interview_id: "int-1".to_string(),
                job_title: "Engineer".to_string(),
                job_description: String::new(),
                rubrics: vec![make_rubric("A", &["X"])],
            })
            .await;
        assert!(rubrics.get_by_interview("int-1").await.is_some());
        assert!(rubrics.get_by_interview("int-2").await.is_none());

        let candidates = InMemoryCandidateStore::default();
        candidates
            .insert(
                "cand-1".to_string(),
                CandidateProfile {
                    candidate_name: "Ada".to_string(),
                    resume_summary: String::new(),
                    experience_years: "5".to_string(),
                    highlighted_experiences: vec![],
                },
            )
            .await;
        assert!(candidates.get("cand-1").await.is_some());
        assert!(candidates.get("cand-2").await.is_none());
    }

    #[tokio::test]
    async fn test_seed_doc_applies_to_stores() {
        let raw = r#"{
            "interviews": [{
                "interview_id": "int-1",
                "job_title": "Engineer",
                "rubrics": []
            }],
            "candidates": {
                "cand-1": {
                    "candidate_name": "Ada",
                    "resume_summary": "Platforms",
                    "experience_years": "10+",
                    "highlighted_experiences": []
                }
            }
        }"#;
        let seed: SeedDoc = serde_json::from_str(raw).unwrap();
        let rubrics = InMemoryRubricStore::default();
        let candidates = InMemoryCandidateStore::default();
        let (interviews, people) = seed.apply(&rubrics, &candidates).await;
        assert_eq!((interviews, people), (1, 1));
        assert!(rubrics.get_by_interview("int-1").await.is_some());
    }
}
