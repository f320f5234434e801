//! SQLite persistence for the generation pipeline.
//!
//! Four surfaces, matching how the pipeline touches the store:
//!
//! 1. **materials / analyses** — read-only here; written by the (external)
//!    upload and analysis flows
//! 2. **topics** — read-only here; owned by the topic CRUD
//! 3. **questions** — insert-only here, with provenance and quality fields
//! 4. **generation_jobs** — insert then repeated update; the durable
//!    progress channel an external poller reads mid-job
//!
//! WAL mode is enabled so the poller can read job rows while a job is
//! writing.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use quizforge_sdk::JobStatus;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use uuid::Uuid;

use crate::generation::quality::QualityFlags;
use crate::generation::types::{EvidenceQuote, PlatformTopic};

/// Database wrapper for pipeline persistence
pub struct Database {
    conn: Connection,
}

/// Uploaded course material, read-only to this pipeline
#[derive(Debug, Clone)]
pub struct MaterialRecord {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub created_at: DateTime<Local>,
}

/// Traceability block stored with every generated question
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QuestionProvenance {
    pub claim_id: String,
    pub claim_type: String,
    pub chunk_index: usize,
    pub evidence: Vec<EvidenceQuote>,
}

/// The persisted form of an accepted question.
///
/// Only the Persister creates these for generated content; they always
/// arrive unpublished and flagged for review.
#[derive(Debug, Clone)]
pub struct StoredQuestion {
    pub id: Uuid,
    pub course_id: String,
    pub topic_id: String,
    pub material_id: String,
    pub stem: String,
    pub choices: Vec<String>,
    pub correct_answer: String,
    pub solution: String,
    pub tags: Vec<String>,
    pub difficulty: u8,
    pub quality_score: f64,
    pub quality_flags: QualityFlags,
    pub provenance: QuestionProvenance,
    pub status: String,
    pub published: bool,
    pub created_at: DateTime<Local>,
}

/// Persisted generation job record
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub id: Uuid,
    pub material_id: String,
    pub owner: Option<String>,
    pub status: JobStatus,
    pub topics_total: usize,
    pub topics_completed: usize,
    pub questions_total: usize,
    pub questions_generated: usize,
    pub current_item: Option<String>,
    pub progress_message: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
    pub completed_at: Option<DateTime<Local>>,
}

impl Database {
    /// Open (or create) the database at the specified path
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL mode so progress polling can read during a running job
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self { conn })
    }

    /// Create an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn })
    }

    /// Initialize schema with all tables and indexes
    pub fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS materials (
                id TEXT PRIMARY KEY,
                course_id TEXT NOT NULL,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS analyses (
                material_id TEXT PRIMARY KEY,
                document TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,

                FOREIGN KEY(material_id) REFERENCES materials(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS topics (
                id TEXT PRIMARY KEY,
                course_id TEXT NOT NULL,
                title TEXT NOT NULL,
                code TEXT,
                description TEXT
            );

            CREATE TABLE IF NOT EXISTS questions (
                id TEXT PRIMARY KEY,
                course_id TEXT NOT NULL,
                topic_id TEXT NOT NULL,
                material_id TEXT NOT NULL,
                stem TEXT NOT NULL,
                choices TEXT NOT NULL,
                correct_answer TEXT NOT NULL,
                solution TEXT NOT NULL,
                tags TEXT NOT NULL,
                difficulty INTEGER NOT NULL,
                quality_score REAL NOT NULL,
                quality_flags TEXT NOT NULL,
                provenance TEXT NOT NULL,
                status TEXT NOT NULL,
                published INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS generation_jobs (
                id TEXT PRIMARY KEY,
                material_id TEXT NOT NULL,
                owner TEXT,
                status TEXT NOT NULL,
                topics_total INTEGER NOT NULL DEFAULT 0,
                topics_completed INTEGER NOT NULL DEFAULT 0,
                questions_total INTEGER NOT NULL DEFAULT 0,
                questions_generated INTEGER NOT NULL DEFAULT 0,
                current_item TEXT,
                progress_message TEXT,
                error_message TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                completed_at TEXT
            );

            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;

        self.conn.execute_batch(
            r#"
            CREATE INDEX IF NOT EXISTS idx_topics_course_id ON topics(course_id);
            CREATE INDEX IF NOT EXISTS idx_questions_topic_id ON questions(topic_id);
            CREATE INDEX IF NOT EXISTS idx_questions_material_id ON questions(material_id);
            CREATE INDEX IF NOT EXISTS idx_jobs_material_id ON generation_jobs(material_id);
            CREATE INDEX IF NOT EXISTS idx_jobs_status ON generation_jobs(status);
            CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON generation_jobs(created_at DESC);
            "#,
        )?;

        self.conn.execute(
            "INSERT OR IGNORE INTO schema_version (version) VALUES (1)",
            [],
        )?;

        Ok(())
    }

    /// Get current schema version
    pub fn get_schema_version(&self) -> Result<i32> {
        let version: i32 =
            self.conn
                .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                    row.get(0)
                })?;
        Ok(version)
    }

    // ========================================================================
    // Materials and analyses (read surface; inserts exist for seeding)
    // ========================================================================

    pub fn insert_material(&self, material: &MaterialRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO materials (id, course_id, title, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                material.id,
                material.course_id,
                material.title,
                material.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_material(&self, id: &str) -> Result<Option<MaterialRecord>> {
        let result = self
            .conn
            .query_row(
                "SELECT id, course_id, title, created_at FROM materials WHERE id = ?1",
                params![id],
                |row| {
                    Ok(MaterialRecord {
                        id: row.get(0)?,
                        course_id: row.get(1)?,
                        title: row.get(2)?,
                        created_at: parse_timestamp(row, 3)?,
                    })
                },
            )
            .optional()?;
        Ok(result)
    }

    /// Store (or replace) the analysis document for a material
    pub fn upsert_analysis(&self, material_id: &str, document_json: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO analyses (material_id, document, created_at)
             VALUES (?1, ?2, ?3)",
            params![material_id, document_json, Local::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get_analysis(&self, material_id: &str) -> Result<Option<String>> {
        let result = self
            .conn
            .query_row(
                "SELECT document FROM analyses WHERE material_id = ?1",
                params![material_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(result)
    }

    // ========================================================================
    // Topics (read surface)
    // ========================================================================

    pub fn insert_topic(&self, topic: &PlatformTopic) -> Result<()> {
        self.conn.execute(
            "INSERT INTO topics (id, course_id, title, code, description)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                topic.id,
                topic.course_id,
                topic.title,
                topic.code,
                topic.description,
            ],
        )?;
        Ok(())
    }

    pub fn list_topics(&self, course_id: &str) -> Result<Vec<PlatformTopic>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, course_id, title, code, description
             FROM topics WHERE course_id = ?1 ORDER BY title ASC",
        )?;
        let topics = stmt
            .query_map(params![course_id], |row| {
                Ok(PlatformTopic {
                    id: row.get(0)?,
                    course_id: row.get(1)?,
                    title: row.get(2)?,
                    code: row.get(3)?,
                    description: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(topics)
    }

    // ========================================================================
    // Questions (insert-only surface)
    // ========================================================================

    pub fn insert_question(&self, question: &StoredQuestion) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO questions (
                id, course_id, topic_id, material_id, stem, choices,
                correct_answer, solution, tags, difficulty, quality_score,
                quality_flags, provenance, status, published, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
            params![
                question.id.to_string(),
                question.course_id,
                question.topic_id,
                question.material_id,
                question.stem,
                serde_json::to_string(&question.choices)?,
                question.correct_answer,
                question.solution,
                serde_json::to_string(&question.tags)?,
                question.difficulty,
                question.quality_score,
                serde_json::to_string(&question.quality_flags)?,
                serde_json::to_string(&question.provenance)?,
                question.status,
                question.published,
                question.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn list_questions(&self, material_id: &str) -> Result<Vec<StoredQuestion>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, course_id, topic_id, material_id, stem, choices,
                   correct_answer, solution, tags, difficulty, quality_score,
                   quality_flags, provenance, status, published, created_at
            FROM questions
            WHERE material_id = ?1
            ORDER BY created_at ASC
            "#,
        )?;
        let questions = stmt
            .query_map(params![material_id], map_question_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(questions)
    }

    pub fn count_questions_for_topic(&self, topic_id: &str) -> Result<usize> {
        let count: usize = self.conn.query_row(
            "SELECT COUNT(*) FROM questions WHERE topic_id = ?1",
            params![topic_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ========================================================================
    // Generation jobs (insert + repeated update)
    // ========================================================================

    pub fn insert_job(&self, job: &GenerationJob) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO generation_jobs (
                id, material_id, owner, status, topics_total, topics_completed,
                questions_total, questions_generated, current_item,
                progress_message, error_message, created_at, updated_at, completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                job.id.to_string(),
                job.material_id,
                job.owner,
                status_to_string(&job.status),
                job.topics_total,
                job.topics_completed,
                job.questions_total,
                job.questions_generated,
                job.current_item,
                job.progress_message,
                job.error_message,
                job.created_at.to_rfc3339(),
                job.updated_at.to_rfc3339(),
                job.completed_at.map(|dt| dt.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Write the job's full mutable state; the poller sees this immediately
    pub fn update_job(&self, job: &GenerationJob) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE generation_jobs
            SET status = ?1, topics_total = ?2, topics_completed = ?3,
                questions_total = ?4, questions_generated = ?5,
                current_item = ?6, progress_message = ?7, error_message = ?8,
                updated_at = ?9, completed_at = ?10
            WHERE id = ?11
            "#,
            params![
                status_to_string(&job.status),
                job.topics_total,
                job.topics_completed,
                job.questions_total,
                job.questions_generated,
                job.current_item,
                job.progress_message,
                job.error_message,
                Local::now().to_rfc3339(),
                job.completed_at.map(|dt| dt.to_rfc3339()),
                job.id.to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn get_job(&self, id: &Uuid) -> Result<Option<GenerationJob>> {
        let result = self
            .conn
            .query_row(
                r#"
                SELECT id, material_id, owner, status, topics_total, topics_completed,
                       questions_total, questions_generated, current_item,
                       progress_message, error_message, created_at, updated_at, completed_at
                FROM generation_jobs
                WHERE id = ?1
                "#,
                params![id.to_string()],
                map_job_row,
            )
            .optional()?;
        Ok(result)
    }

    pub fn list_jobs(&self, limit: usize) -> Result<Vec<GenerationJob>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, material_id, owner, status, topics_total, topics_completed,
                   questions_total, questions_generated, current_item,
                   progress_message, error_message, created_at, updated_at, completed_at
            FROM generation_jobs
            ORDER BY created_at DESC
            LIMIT ?1
            "#,
        )?;
        let jobs = stmt
            .query_map(params![limit], map_job_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(jobs)
    }
}

// Helper functions for mapping between database and Rust types

/// Convert JobStatus to database string
fn status_to_string(status: &JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "Pending",
        JobStatus::Running => "Running",
        JobStatus::Completed => "Completed",
        JobStatus::Failed => "Failed",
    }
}

/// Convert database string to JobStatus
fn string_to_status(s: &str) -> Result<JobStatus> {
    match s {
        "Pending" => Ok(JobStatus::Pending),
        "Running" => Ok(JobStatus::Running),
        "Completed" => Ok(JobStatus::Completed),
        "Failed" => Ok(JobStatus::Failed),
        _ => Err(anyhow!("Unknown job status: {}", s)),
    }
}

fn parse_timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Local>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Local))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_json_column<T: serde::de::DeserializeOwned>(
    row: &Row,
    idx: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_uuid(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn map_question_row(row: &Row) -> rusqlite::Result<StoredQuestion> {
    Ok(StoredQuestion {
        id: parse_uuid(row, 0)?,
        course_id: row.get(1)?,
        topic_id: row.get(2)?,
        material_id: row.get(3)?,
        stem: row.get(4)?,
        choices: parse_json_column(row, 5)?,
        correct_answer: row.get(6)?,
        solution: row.get(7)?,
        tags: parse_json_column(row, 8)?,
        difficulty: row.get(9)?,
        quality_score: row.get(10)?,
        quality_flags: parse_json_column(row, 11)?,
        provenance: parse_json_column(row, 12)?,
        status: row.get(13)?,
        published: row.get(14)?,
        created_at: parse_timestamp(row, 15)?,
    })
}

fn map_job_row(row: &Row) -> rusqlite::Result<GenerationJob> {
    let status_str: String = row.get(3)?;
    let status = string_to_status(&status_str)
        .map_err(|_| rusqlite::Error::InvalidQuery)?;
    let completed_at_raw: Option<String> = row.get(13)?;
    let completed_at = completed_at_raw
        .map(|s| DateTime::parse_from_rfc3339(&s))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(13, rusqlite::types::Type::Text, Box::new(e))
        })?
        .map(|dt| dt.with_timezone(&Local));

    Ok(GenerationJob {
        id: parse_uuid(row, 0)?,
        material_id: row.get(1)?,
        owner: row.get(2)?,
        status,
        topics_total: row.get(4)?,
        topics_completed: row.get(5)?,
        questions_total: row.get(6)?,
        questions_generated: row.get(7)?,
        current_item: row.get(8)?,
        progress_message: row.get(9)?,
        error_message: row.get(10)?,
        created_at: parse_timestamp(row, 11)?,
        updated_at: parse_timestamp(row, 12)?,
        completed_at,
    })
}
