use serde::{Deserialize, Serialize};

/// Lifecycle of a generation job.
///
/// `Pending` is the state at row creation, before topic matching has resolved
/// a total. `Completed` and `Failed` are terminal and never transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// True for states that accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Sentinel prefix for structured events on stderr.
///
/// A supervisor process tails stderr and parses lines carrying this prefix;
/// everything else on the stream is free-form console output.
pub const EVENT_PREFIX: &str = "__QF_EVENT__:";

/// Structured progress events emitted by a running generation job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// Job transitioned to running; totals are known
    JobStarted {
        job_id: String,
        material_id: String,
        topics_matched: usize,
        topics_total: usize,
    },
    /// Started processing one matched topic
    TopicStarted {
        job_id: String,
        topic_title: String,
        index: usize,
        total: usize,
    },
    /// Topic attempted but produced nothing usable (no chunks, no claims)
    TopicSkipped {
        job_id: String,
        topic_title: String,
        reason: String,
    },
    /// Topic fully attempted
    TopicCompleted {
        job_id: String,
        topic_title: String,
        questions: usize,
    },
    /// Claim extraction for one chunk failed; the chunk was skipped
    ExtractionFailed {
        job_id: String,
        chunk_index: usize,
        error: String,
    },
    /// One question passed all gates and was persisted
    QuestionAccepted {
        job_id: String,
        claim_id: String,
        quality_score: f64,
    },
    /// One claim did not yield a persisted question
    QuestionRejected {
        job_id: String,
        claim_id: String,
        reason: String,
    },
    /// Persisting an accepted question failed; the question was dropped
    PersistFailed {
        job_id: String,
        claim_id: String,
        error: String,
    },
    /// Job reached its terminal completed state
    JobCompleted {
        job_id: String,
        questions_generated: usize,
    },
    /// Job reached its terminal failed state (setup fault)
    JobFailed { job_id: String, error: String },
}

impl JobEvent {
    /// Emit this event to stderr for supervisor parsing
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            use std::io::Write;
            eprintln!("{}{}", EVENT_PREFIX, json);
            // Force flush stderr in async contexts
            let _ = std::io::stderr().flush();
        }
    }

    /// Parse a stderr line back into an event, if it carries the sentinel prefix
    pub fn parse(line: &str) -> Option<JobEvent> {
        let payload = line.strip_prefix(EVENT_PREFIX)?;
        serde_json::from_str(payload).ok()
    }
}

/// Helper macros for job event logging
#[macro_export]
macro_rules! log_job_start {
    ($job_id:expr, $material_id:expr, $matched:expr, $total:expr) => {
        $crate::JobEvent::JobStarted {
            job_id: $job_id.to_string(),
            material_id: $material_id.to_string(),
            topics_matched: $matched,
            topics_total: $total,
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_topic_start {
    ($job_id:expr, $title:expr, $index:expr, $total:expr) => {
        $crate::JobEvent::TopicStarted {
            job_id: $job_id.to_string(),
            topic_title: $title.to_string(),
            index: $index,
            total: $total,
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_topic_skipped {
    ($job_id:expr, $title:expr, $reason:expr) => {
        $crate::JobEvent::TopicSkipped {
            job_id: $job_id.to_string(),
            topic_title: $title.to_string(),
            reason: $reason.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_topic_complete {
    ($job_id:expr, $title:expr, $questions:expr) => {
        $crate::JobEvent::TopicCompleted {
            job_id: $job_id.to_string(),
            topic_title: $title.to_string(),
            questions: $questions,
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_extraction_failed {
    ($job_id:expr, $chunk_index:expr, $error:expr) => {
        $crate::JobEvent::ExtractionFailed {
            job_id: $job_id.to_string(),
            chunk_index: $chunk_index,
            error: $error.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_question_accepted {
    ($job_id:expr, $claim_id:expr, $score:expr) => {
        $crate::JobEvent::QuestionAccepted {
            job_id: $job_id.to_string(),
            claim_id: $claim_id.to_string(),
            quality_score: $score,
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_question_rejected {
    ($job_id:expr, $claim_id:expr, $reason:expr) => {
        $crate::JobEvent::QuestionRejected {
            job_id: $job_id.to_string(),
            claim_id: $claim_id.to_string(),
            reason: $reason.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_persist_failed {
    ($job_id:expr, $claim_id:expr, $error:expr) => {
        $crate::JobEvent::PersistFailed {
            job_id: $job_id.to_string(),
            claim_id: $claim_id.to_string(),
            error: $error.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_job_complete {
    ($job_id:expr, $questions:expr) => {
        $crate::JobEvent::JobCompleted {
            job_id: $job_id.to_string(),
            questions_generated: $questions,
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_job_failed {
    ($job_id:expr, $error:expr) => {
        $crate::JobEvent::JobFailed {
            job_id: $job_id.to_string(),
            error: $error.to_string(),
        }
        .emit();
    };
}

// ============================================================================
// Console Logging Macros
// ============================================================================
// Human-readable colored output for the CLI, complementing the structured
// JobEvent stream parsed by supervisors.
// ============================================================================

/// Logs an informational message.
///
/// # Example
/// ```
/// use quizforge_sdk::log_info;
/// log_info!("Loading analysis document...");
/// ```
#[macro_export]
macro_rules! log_info {
    ($message:expr) => {
        println!("\x1b[36mℹ {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[36mℹ {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs a warning message.
///
/// # Example
/// ```
/// use quizforge_sdk::log_warning;
/// log_warning!("Insert failed, skipping question");
/// ```
#[macro_export]
macro_rules! log_warning {
    ($message:expr) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs progress of an operation.
///
/// # Example
/// ```
/// use quizforge_sdk::log_progress;
/// log_progress!(3, 5, "topics");
/// ```
#[macro_export]
macro_rules! log_progress {
    ($current:expr, $total:expr, $item_type:expr) => {
        println!(
            "\x1b[36mProgress: {}/{} {}\x1b[0m",
            $current, $total, $item_type
        );
    };
}

/// Logs the number of items found.
///
/// # Example
/// ```
/// use quizforge_sdk::log_found;
/// log_found!(14, "claims to synthesize");
/// ```
#[macro_export]
macro_rules! log_found {
    ($count:expr, $item_type:expr) => {
        println!("\x1b[36mFound {} {}\x1b[0m", $count, $item_type);
    };
}
