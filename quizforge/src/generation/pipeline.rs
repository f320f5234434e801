//! The generation job loop.
//!
//! One call to [`run_generation`] runs one job: setup (material, analysis,
//! topic matching), then an explicit fold over matched topics that
//! accumulates the result summary. Only [`SetupError`] values and genuinely
//! unexpected errors unwind to the job-failure handler; every per-chunk,
//! per-claim and per-insert problem is absorbed at its loop site and only
//! degrades the output quantity.

use anyhow::Result;
use quizforge_sdk::{
    log_found, log_persist_failed, log_question_accepted, log_question_rejected,
    log_topic_skipped, log_warning,
};

use crate::config::GenerationConfig;
use crate::database::Database;
use crate::error::SetupError;
use crate::generation::chunks;
use crate::generation::claims;
use crate::generation::job::JobTracker;
use crate::generation::matcher;
use crate::generation::persister;
use crate::generation::quality;
use crate::generation::synthesizer::{self, SynthesisVerdict};
use crate::generation::types::{
    AnalysisDocument, AnalysisTopic, GenerationSummary, PlatformTopic,
};
use crate::service::GenerationService;

/// Caller-facing request: one material, optionally restricted to a subset
/// of its course's topics
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub material_id: String,
    pub topic_ids: Option<Vec<String>>,
    pub owner: Option<String>,
}

/// Run one generation job to its terminal state.
///
/// The job row is created immediately and is the durable progress channel;
/// generation may run long after the triggering call would have returned.
/// The returned summary always reports actual counts.
pub async fn run_generation(
    db: &Database,
    service: &dyn GenerationService,
    config: &GenerationConfig,
    request: &GenerationRequest,
) -> Result<GenerationSummary> {
    let mut tracker = JobTracker::create(db, &request.material_id, request.owner.clone())?;

    match generate(db, service, config, request, &mut tracker).await {
        Ok(summary) => {
            tracker.complete(&summary)?;
            Ok(summary)
        }
        Err(err) => {
            // Partially persisted questions stay; there is no rollback.
            tracker.fail(&format!("{:#}", err))?;
            Err(err)
        }
    }
}

async fn generate(
    db: &Database,
    service: &dyn GenerationService,
    config: &GenerationConfig,
    request: &GenerationRequest,
    tracker: &mut JobTracker<'_>,
) -> Result<GenerationSummary> {
    // Setup: everything that can still fail the whole job.
    let material = db
        .get_material(&request.material_id)?
        .ok_or_else(|| SetupError::MaterialNotFound(request.material_id.clone()))?;

    let analysis_json = db
        .get_analysis(&material.id)?
        .ok_or_else(|| SetupError::AnalysisMissing(material.id.clone()))?;
    let doc = AnalysisDocument::from_json(&analysis_json).map_err(|e| {
        SetupError::AnalysisUnreadable {
            material_id: material.id.clone(),
            detail: e.to_string(),
        }
    })?;

    let mut topics = db.list_topics(&material.course_id)?;
    if let Some(ids) = &request.topic_ids {
        topics.retain(|t| ids.contains(&t.id));
    }
    if topics.is_empty() {
        return Err(SetupError::NoTopics(material.course_id.clone()).into());
    }

    let topics_total = topics.len();
    let matched: Vec<(PlatformTopic, AnalysisTopic)> = topics
        .into_iter()
        .filter_map(|topic| {
            matcher::best_match(&topic, &doc.topics, config.match_score_floor)
                .cloned()
                .map(|analysis_topic| (topic, analysis_topic))
        })
        .collect();
    if matched.is_empty() {
        return Err(SetupError::NoTopicsMatched.into());
    }

    let topics_matched = matched.len();
    tracker.start(
        topics_matched,
        topics_total,
        topics_matched * config.max_questions_per_topic,
    )?;
    let job_id = tracker.job_id_string();

    // The fold: counters accumulate, nothing below here aborts the job
    // except database faults on the job row itself.
    let mut questions_generated = 0usize;

    for (index, (topic, analysis_topic)) in matched.iter().enumerate() {
        tracker.topic_started(&topic.title, index)?;

        let resolved = chunks::select_chunks(
            analysis_topic,
            &doc,
            config.max_chunks_per_topic,
            config.fallback_chunk_count,
        );
        if resolved.is_empty() {
            log_topic_skipped!(job_id, topic.title, "no source chunks resolved");
            tracker.topic_finished(&topic.title, 0)?;
            continue;
        }

        let mut topic_claims = claims::extract_claims(service, &job_id, &resolved, config).await;
        if topic_claims.is_empty() {
            log_topic_skipped!(job_id, topic.title, "no claims extracted");
            tracker.topic_finished(&topic.title, 0)?;
            continue;
        }
        claims::order_by_priority(&mut topic_claims);
        log_found!(topic_claims.len(), "claims to synthesize");

        let mut accepted_for_topic = 0usize;
        for ctx in &topic_claims {
            if accepted_for_topic >= config.max_questions_per_topic {
                break;
            }

            match synthesizer::synthesize_question(service, ctx, &topic.title, config).await {
                SynthesisVerdict::Accepted(question) => {
                    let assessment =
                        quality::assess(&question, &ctx.claim, &config.pipeline_version);
                    match persister::persist_question(
                        db, topic, &material.id, ctx, &question, &assessment,
                    ) {
                        Ok(_) => {
                            accepted_for_topic += 1;
                            log_question_accepted!(job_id, ctx.claim.claim_id, assessment.score);
                        }
                        Err(e) => {
                            log_persist_failed!(job_id, ctx.claim.claim_id, e);
                            log_warning!(
                                "insert failed for claim {}, skipping question",
                                ctx.claim.claim_id
                            );
                        }
                    }
                }
                SynthesisVerdict::Declined { reason } => {
                    log_question_rejected!(
                        job_id,
                        ctx.claim.claim_id,
                        format!("service declined: {}", reason)
                    );
                }
                SynthesisVerdict::Rejected { reason } => {
                    log_question_rejected!(job_id, ctx.claim.claim_id, reason);
                }
                SynthesisVerdict::Failed { detail } => {
                    log_question_rejected!(
                        job_id,
                        ctx.claim.claim_id,
                        format!("synthesis call broke: {}", detail)
                    );
                }
            }
        }

        questions_generated += accepted_for_topic;
        tracker.topic_finished(&topic.title, accepted_for_topic)?;
    }

    Ok(GenerationSummary {
        questions_generated,
        topics_matched,
        topics_total,
    })
}
