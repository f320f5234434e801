//! quizforge CLI
//!
//! Runs generation jobs against a material's stored analysis and exposes the
//! job table for progress polling.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quizforge_sdk::{log_info, log_progress, log_warning};

use quizforge::config::GenerationConfig;
use quizforge::database::Database;
use quizforge::generation::{run_generation, GenerationRequest};
use quizforge::service::HttpGenerationService;

/// Evidence-grounded MCQ generation for analyzed course material
#[derive(Parser, Debug)]
#[command(name = "quizforge")]
#[command(about = "Evidence-grounded MCQ generation for analyzed course material")]
#[command(version)]
struct Cli {
    /// Path to the SQLite database
    ///
    /// Defaults to ~/.quizforge/quizforge.db
    #[arg(long, value_name = "PATH", global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a generation job for one material
    Generate {
        /// Material identifier to generate questions for
        #[arg(long, value_name = "ID")]
        material: String,

        /// Restrict generation to these topic ids (repeatable)
        #[arg(long = "topic", value_name = "ID")]
        topics: Vec<String>,

        /// Job owner recorded on the job row
        #[arg(long, value_name = "NAME")]
        owner: Option<String>,
    },

    /// Poll one job's status and progress
    Status {
        /// Job identifier
        #[arg(long, value_name = "ID")]
        job: String,
    },

    /// List recent generation jobs
    Jobs {
        /// Maximum number of jobs to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn default_db_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("could not resolve home directory")?;
    Ok(home.join(".quizforge").join("quizforge.db"))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let db_path = match cli.db {
        Some(path) => path,
        None => default_db_path()?,
    };
    let db = Database::new(db_path)?;
    db.initialize_schema()?;

    match cli.command {
        Command::Generate {
            material,
            topics,
            owner,
        } => {
            let config = GenerationConfig::default();
            let service = HttpGenerationService::from_env(config.clone())?;
            let request = GenerationRequest {
                material_id: material,
                topic_ids: (!topics.is_empty()).then_some(topics),
                owner,
            };

            log_info!("Starting generation for material {}", request.material_id);
            match run_generation(&db, &service, &config, &request).await {
                Ok(summary) => {
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                    Ok(())
                }
                Err(e) => {
                    log_warning!("generation failed: {:#}", e);
                    std::process::exit(1);
                }
            }
        }

        Command::Status { job } => {
            let id = uuid::Uuid::parse_str(&job).context("invalid job id")?;
            match db.get_job(&id)? {
                Some(job) => {
                    println!("Job {}", job.id);
                    println!("  material: {}", job.material_id);
                    println!("  status:   {:?}", job.status);
                    log_progress!(job.topics_completed, job.topics_total, "topics");
                    log_progress!(job.questions_generated, job.questions_total, "questions");
                    if let Some(current) = &job.current_item {
                        println!("  current:  {}", current);
                    }
                    if let Some(message) = &job.progress_message {
                        println!("  progress: {}", message);
                    }
                    if let Some(error) = &job.error_message {
                        println!("  error:    {}", error);
                    }
                    if let Some(completed_at) = &job.completed_at {
                        println!("  finished: {}", completed_at.to_rfc3339());
                    }
                    Ok(())
                }
                None => {
                    log_warning!("no job found with id {}", id);
                    std::process::exit(1);
                }
            }
        }

        Command::Jobs { limit } => {
            let jobs = db.list_jobs(limit)?;
            if jobs.is_empty() {
                log_info!("no generation jobs recorded yet");
                return Ok(());
            }
            for job in jobs {
                println!(
                    "{}  {:<9}  {:>3}/{:<3} topics  {:>4} questions  {}",
                    job.id,
                    format!("{:?}", job.status),
                    job.topics_completed,
                    job.topics_total,
                    job.questions_generated,
                    job.material_id,
                );
            }
            Ok(())
        }
    }
}
