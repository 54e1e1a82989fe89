//! In-memory store backed by `tokio::sync::RwLock`.
//!
//! Used by the API binary in single-node deployments and by every engine
//! test. Record-level conditional updates hold the map's write lock for the
//! whole read-decide-write step, which is what gives `update_job_if` its
//! atomicity.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use reel_models::{Job, JobId, JobKind, Project, ProjectId, RunRef};

use crate::error::{StoreError, StoreResult};
use crate::store::{JobMutation, JobStore, JobUpdate, ProjectStore};

/// In-memory project + job store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    projects: Arc<RwLock<HashMap<ProjectId, Project>>>,
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn get_project(&self, id: &ProjectId) -> StoreResult<Option<Project>> {
        Ok(self.projects.read().await.get(id).cloned())
    }

    async fn insert_project(&self, project: &Project) -> StoreResult<()> {
        let mut projects = self.projects.write().await;
        if projects.contains_key(&project.id) {
            return Err(StoreError::already_exists(project.id.as_str()));
        }
        projects.insert(project.id.clone(), project.clone());
        debug!(project_id = %project.id, "inserted project");
        Ok(())
    }

    async fn update_project(&self, project: &Project) -> StoreResult<()> {
        let mut projects = self.projects.write().await;
        if !projects.contains_key(&project.id) {
            return Err(StoreError::not_found(project.id.as_str()));
        }
        projects.insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn delete_project(&self, id: &ProjectId) -> StoreResult<()> {
        self.projects.write().await.remove(id);
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn get_job(&self, id: &JobId) -> StoreResult<Option<Job>> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn insert_job(&self, job: &Job) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::already_exists(job.id.as_str()));
        }
        jobs.insert(job.id.clone(), job.clone());
        debug!(job_id = %job.id, kind = %job.kind, "inserted job");
        Ok(())
    }

    async fn update_job(&self, job: &Job) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        if !jobs.contains_key(&job.id) {
            return Err(StoreError::not_found(job.id.as_str()));
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn update_job_if(&self, id: &JobId, apply: JobMutation<'_>) -> StoreResult<JobUpdate> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(id.as_str()))?;

        let mut candidate = job.clone();
        if apply(&mut candidate) {
            *job = candidate.clone();
            Ok(JobUpdate::Applied(candidate))
        } else {
            Ok(JobUpdate::Skipped(job.clone()))
        }
    }

    async fn find_by_run_ref(&self, run_ref: &RunRef) -> StoreResult<Option<Job>> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .find(|j| j.run_ref.as_ref() == Some(run_ref))
            .cloned())
    }

    async fn list_jobs(
        &self,
        project_id: &ProjectId,
        kind: Option<JobKind>,
    ) -> StoreResult<Vec<Job>> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<Job> = jobs
            .values()
            .filter(|j| &j.project_id == project_id)
            .filter(|j| kind.map_or(true, |k| j.kind == k))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.0.cmp(&b.id.0)));
        Ok(matching)
    }

    async fn delete_jobs_for_project(&self, project_id: &ProjectId) -> StoreResult<()> {
        self.jobs
            .write()
            .await
            .retain(|_, j| &j.project_id != project_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::JobStatus;

    #[tokio::test]
    async fn test_project_roundtrip() {
        let store = MemoryStore::new();
        let project = Project::new("sess-1", "desk lamp ad");

        store.insert_project(&project).await.unwrap();
        assert!(store.insert_project(&project).await.is_err());

        let fetched = store.get_project(&project.id).await.unwrap().unwrap();
        assert_eq!(fetched.product_prompt, "desk lamp ad");

        store.delete_project(&project.id).await.unwrap();
        assert!(store.get_project(&project.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_run_ref() {
        let store = MemoryStore::new();
        let mut job = Job::new_video_gen(ProjectId::from("proj-1"));
        job.start(RunRef::from("run-42"));
        store.insert_job(&job).await.unwrap();

        let found = store
            .find_by_run_ref(&RunRef::from("run-42"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, job.id);
        assert!(store
            .find_by_run_ref(&RunRef::from("run-missing"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_conditional_update_skips_terminal() {
        let store = MemoryStore::new();
        let mut job = Job::new_video_gen(ProjectId::from("proj-1"));
        job.succeed(vec!["https://cdn.example/a.mp4".into()], None, None);
        store.insert_job(&job).await.unwrap();

        let outcome = store
            .update_job_if(&job.id, &|j| {
                if j.is_terminal() {
                    return false;
                }
                j.fail("should never apply");
                true
            })
            .await
            .unwrap();

        assert!(!outcome.was_applied());
        assert_eq!(outcome.into_job().status, JobStatus::Success);
    }

    #[tokio::test]
    async fn test_list_jobs_creation_order_and_kind_filter() {
        let store = MemoryStore::new();
        let project_id = ProjectId::from("proj-1");

        let mut first = Job::new_video_gen(project_id.clone());
        first.created_at = chrono::Utc::now() - chrono::Duration::seconds(10);
        let second = Job::new_video_gen(project_id.clone());
        let compose = Job::new_compose(project_id.clone());

        store.insert_job(&second).await.unwrap();
        store.insert_job(&first).await.unwrap();
        store.insert_job(&compose).await.unwrap();

        let video_jobs = store
            .list_jobs(&project_id, Some(JobKind::VideoGen))
            .await
            .unwrap();
        assert_eq!(video_jobs.len(), 2);
        assert_eq!(video_jobs[0].id, first.id);

        let all = store.list_jobs(&project_id, None).await.unwrap();
        assert_eq!(all.len(), 3);

        store.delete_jobs_for_project(&project_id).await.unwrap();
        assert!(store.list_jobs(&project_id, None).await.unwrap().is_empty());
    }
}
