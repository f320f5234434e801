//! Generation job lifecycle and progress ownership.
//!
//! The tracker is the only writer of a job row. State machine:
//! `pending → running → {completed, failed}`; terminal states are final and
//! later transition attempts are ignored. Progress fields are flushed to the
//! database after every change so an external poller sees them mid-job.

use anyhow::Result;
use chrono::Local;
use quizforge_sdk::{
    log_job_complete, log_job_failed, log_job_start, log_topic_complete, log_topic_start,
    JobStatus,
};
use uuid::Uuid;

use crate::database::{Database, GenerationJob};
use crate::generation::types::GenerationSummary;

/// Owns one job row for the duration of a generation run
pub struct JobTracker<'a> {
    db: &'a Database,
    job: GenerationJob,
}

impl<'a> JobTracker<'a> {
    /// Insert a new pending job row
    pub fn create(db: &'a Database, material_id: &str, owner: Option<String>) -> Result<Self> {
        let now = Local::now();
        let job = GenerationJob {
            id: Uuid::new_v4(),
            material_id: material_id.to_string(),
            owner,
            status: JobStatus::Pending,
            topics_total: 0,
            topics_completed: 0,
            questions_total: 0,
            questions_generated: 0,
            current_item: None,
            progress_message: Some("Waiting for topic matching".to_string()),
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        db.insert_job(&job)?;
        Ok(Self { db, job })
    }

    pub fn id(&self) -> Uuid {
        self.job.id
    }

    pub fn job_id_string(&self) -> String {
        self.job.id.to_string()
    }

    /// Transition to running once matching resolved the totals.
    ///
    /// `topics_matched` becomes the job's topic total (the count progress is
    /// measured against); `topics_considered` is the full platform topic
    /// count, reported in the start event only.
    pub fn start(
        &mut self,
        topics_matched: usize,
        topics_considered: usize,
        questions_total: usize,
    ) -> Result<()> {
        if self.job.status.is_terminal() {
            return Ok(());
        }
        self.job.status = JobStatus::Running;
        self.job.topics_total = topics_matched;
        self.job.questions_total = questions_total;
        self.job.progress_message = Some(format!(
            "Matched {} of {} topics, starting generation",
            topics_matched, topics_considered
        ));
        self.db.update_job(&self.job)?;
        log_job_start!(
            self.job_id_string(),
            self.job.material_id,
            topics_matched,
            topics_considered
        );
        Ok(())
    }

    /// Record the topic currently being processed
    pub fn topic_started(&mut self, topic_title: &str, index: usize) -> Result<()> {
        self.job.current_item = Some(topic_title.to_string());
        self.job.progress_message = Some(format!(
            "Processing topic {}/{}: {}",
            index + 1,
            self.job.topics_total,
            topic_title
        ));
        self.db.update_job(&self.job)?;
        log_topic_start!(
            self.job_id_string(),
            topic_title,
            index,
            self.job.topics_total
        );
        Ok(())
    }

    /// Record one fully attempted topic and its question yield
    pub fn topic_finished(&mut self, topic_title: &str, questions: usize) -> Result<()> {
        self.job.topics_completed += 1;
        self.job.questions_generated += questions;
        self.job.progress_message = Some(format!(
            "Generated {} questions across {}/{} topics",
            self.job.questions_generated, self.job.topics_completed, self.job.topics_total
        ));
        self.db.update_job(&self.job)?;
        log_topic_complete!(self.job_id_string(), topic_title, questions);
        Ok(())
    }

    /// Terminal success: all matched topics were attempted.
    ///
    /// Zero questions across all topics is still a completed job with a low
    /// count, never a failure.
    pub fn complete(&mut self, summary: &GenerationSummary) -> Result<()> {
        if self.job.status.is_terminal() {
            return Ok(());
        }
        self.job.status = JobStatus::Completed;
        self.job.current_item = None;
        self.job.progress_message = Some(format!(
            "Completed: {} questions from {}/{} topics",
            summary.questions_generated, summary.topics_matched, summary.topics_total
        ));
        self.job.completed_at = Some(Local::now());
        self.db.update_job(&self.job)?;
        log_job_complete!(self.job_id_string(), summary.questions_generated);
        Ok(())
    }

    /// Terminal failure, setup faults only. Already-persisted questions
    /// remain; there is no rollback.
    pub fn fail(&mut self, error: &str) -> Result<()> {
        if self.job.status.is_terminal() {
            return Ok(());
        }
        self.job.status = JobStatus::Failed;
        self.job.error_message = Some(error.to_string());
        self.job.progress_message = Some("Generation failed".to_string());
        self.job.completed_at = Some(Local::now());
        self.db.update_job(&self.job)?;
        log_job_failed!(self.job_id_string(), error);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        let db = Database::new_in_memory().unwrap();
        db.initialize_schema().unwrap();
        db
    }

    #[test]
    fn lifecycle_reaches_completed_with_visible_progress() {
        let db = db();
        let mut tracker = JobTracker::create(&db, "mat-1", Some("user-1".to_string())).unwrap();
        let id = tracker.id();

        let polled = db.get_job(&id).unwrap().unwrap();
        assert_eq!(polled.status, JobStatus::Pending);

        tracker.start(2, 4, 16).unwrap();
        tracker.topic_started("Limits", 0).unwrap();

        let polled = db.get_job(&id).unwrap().unwrap();
        assert_eq!(polled.status, JobStatus::Running);
        assert_eq!(polled.current_item.as_deref(), Some("Limits"));
        assert_eq!(polled.topics_total, 2);

        tracker.topic_finished("Limits", 3).unwrap();
        tracker.topic_started("Derivatives", 1).unwrap();
        tracker.topic_finished("Derivatives", 0).unwrap();

        let summary = GenerationSummary {
            questions_generated: 3,
            topics_matched: 2,
            topics_total: 4,
        };
        tracker.complete(&summary).unwrap();

        let polled = db.get_job(&id).unwrap().unwrap();
        assert_eq!(polled.status, JobStatus::Completed);
        assert_eq!(polled.topics_completed, 2);
        assert_eq!(polled.questions_generated, 3);
        assert!(polled.completed_at.is_some());
        assert!(polled.error_message.is_none());
    }

    #[test]
    fn failure_records_error_and_timestamp() {
        let db = db();
        let mut tracker = JobTracker::create(&db, "mat-1", None).unwrap();
        tracker.fail("material not found: mat-1").unwrap();

        let polled = db.get_job(&tracker.id()).unwrap().unwrap();
        assert_eq!(polled.status, JobStatus::Failed);
        assert_eq!(
            polled.error_message.as_deref(),
            Some("material not found: mat-1")
        );
        assert!(polled.completed_at.is_some());
    }

    #[test]
    fn terminal_states_are_final() {
        let db = db();
        let mut tracker = JobTracker::create(&db, "mat-1", None).unwrap();
        tracker.start(1, 1, 8).unwrap();
        tracker
            .complete(&GenerationSummary {
                questions_generated: 0,
                topics_matched: 1,
                topics_total: 1,
            })
            .unwrap();

        // A later failure attempt must not overwrite the terminal state.
        tracker.fail("late error").unwrap();
        let polled = db.get_job(&tracker.id()).unwrap().unwrap();
        assert_eq!(polled.status, JobStatus::Completed);
        assert!(polled.error_message.is_none());
    }
}
