//! Autobid orchestration — the per-profile evaluation loop.
//!
//! For each enabled profile: discover candidates → assemble features →
//! predict → decide → submit or skip → append an audit row. Profiles and
//! jobs are processed sequentially on purpose; the external executor is rate
//! limited and the pacer keeps the load smooth. One job's failure never
//! aborts the rest of the run.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio::time;
use tracing::{debug, info, warn};

use crate::autobid::discovery::JobDiscovery;
use crate::autobid::executor::BidExecutor;
use crate::autobid::pacing::Pacer;
use crate::db::models::{DbJob, DbProfile};
use crate::db::queries;
use crate::db::store::{DataStore, NewBidAttempt};
use crate::decision::{decide, Decision};
use crate::error::ModelError;
use crate::events::bus::{BotEvent, EventBus};
use crate::features::assembler::FeatureAssembler;
use crate::features::skills::parse_skill_list;
use crate::features::vector::FeatureVector;
use crate::predict::service::PredictionService;

/// Terminal outcome recorded in the audit log for one candidate job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    BidPlaced,
    SkippedLowProbability,
    SkippedPredictionFailed,
    SkippedFailure,
    QuotaStopped,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::BidPlaced => "bid_placed",
            AttemptOutcome::SkippedLowProbability => "skipped_low_probability",
            AttemptOutcome::SkippedPredictionFailed => "skipped_prediction_failed",
            AttemptOutcome::SkippedFailure => "skipped_failure",
            AttemptOutcome::QuotaStopped => "quota_stopped",
        }
    }
}

/// Counters for one profile run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub evaluated: usize,
    pub placed: i64,
    pub quota_stopped: usize,
}

/// Knobs the orchestrator needs from configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub decision_threshold: f64,
    pub predict_timeout: Duration,
    pub default_daily_limit: i64,
    pub max_candidates_per_run: usize,
}

pub struct AutobidOrchestrator {
    assembler: FeatureAssembler,
    prediction: Arc<PredictionService>,
    store: Arc<dyn DataStore>,
    discovery: Arc<dyn JobDiscovery>,
    executor: Arc<dyn BidExecutor>,
    event_bus: Arc<EventBus>,
    submit_pacer: Pacer,
    settings: OrchestratorSettings,
}

impl AutobidOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        assembler: FeatureAssembler,
        prediction: Arc<PredictionService>,
        store: Arc<dyn DataStore>,
        discovery: Arc<dyn JobDiscovery>,
        executor: Arc<dyn BidExecutor>,
        event_bus: Arc<EventBus>,
        submit_pacer: Pacer,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            assembler,
            prediction,
            store,
            discovery,
            executor,
            event_bus,
            submit_pacer,
            settings,
        }
    }

    /// Run one autobid pass for a single profile.
    pub async fn run_profile(&self, profile: &DbProfile) -> RunSummary {
        let mut summary = RunSummary::default();

        if !profile.autobid_enabled {
            debug!(profile_id = profile.id, "autobid disabled, skipping profile");
            return summary;
        }

        let now = Utc::now();
        let daily_limit = profile
            .daily_bid_limit
            .unwrap_or(self.settings.default_daily_limit);

        let placed_today = match self.store.bids_placed_today(profile.id, now).await {
            Ok(n) => n,
            Err(e) => {
                warn!(profile_id = profile.id, error = %e, "failed to read today's bid count, skipping run");
                self.event_bus.publish(BotEvent::ProfileRunFailed {
                    profile_id: profile.id,
                    reason: format!("quota lookup failed: {}", e),
                });
                return summary;
            }
        };

        let mut remaining = (daily_limit - placed_today).max(0);
        if remaining == 0 {
            info!(
                profile_id = profile.id,
                daily_limit, "daily quota already exhausted"
            );
            self.event_bus.publish(BotEvent::QuotaReached {
                profile_id: profile.id,
                placed_today,
            });
            return summary;
        }

        let mut candidates = match self.discovery.candidate_jobs(profile).await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(profile_id = profile.id, error = %e, "job discovery failed");
                self.event_bus.publish(BotEvent::ProfileRunFailed {
                    profile_id: profile.id,
                    reason: format!("discovery failed: {}", e),
                });
                return summary;
            }
        };
        candidates.truncate(self.settings.max_candidates_per_run);

        info!(
            profile_id = profile.id,
            candidates = candidates.len(),
            remaining_quota = remaining,
            "autobid run starting"
        );

        // Stats are read once per run; the assembler applies the staleness
        // policy per call.
        let stats = match self.store.stats_for(profile.id).await {
            Ok(s) => s,
            Err(e) => {
                warn!(profile_id = profile.id, error = %e, "stats read failed, assembling without stats");
                None
            }
        };

        let mut jobs = candidates.into_iter();

        // Check the quota before drawing a candidate, so the job that would
        // have been evaluated next stays in the iterator for the
        // quota_stopped pass below.
        while remaining > 0 {
            let Some(job) = jobs.next() else {
                break;
            };

            summary.evaluated += 1;
            let outcome = self.evaluate_job(profile, &job, stats.as_ref()).await;
            if outcome == AttemptOutcome::BidPlaced {
                summary.placed += 1;
                remaining -= 1;
            }
        }

        // Quota reached: remaining candidates are not evaluated at all, but
        // each still gets an audit row saying why.
        let leftover: Vec<DbJob> = jobs.collect();
        if !leftover.is_empty() {
            for job in &leftover {
                summary.quota_stopped += 1;
                self.record_attempt(profile.id, job.id, AttemptOutcome::QuotaStopped, None, None)
                    .await;
            }
            info!(
                profile_id = profile.id,
                unevaluated = leftover.len(),
                "daily quota reached mid-run"
            );
            self.event_bus.publish(BotEvent::QuotaReached {
                profile_id: profile.id,
                placed_today: placed_today + summary.placed,
            });
        }

        info!(
            profile_id = profile.id,
            evaluated = summary.evaluated,
            placed = summary.placed,
            quota_stopped = summary.quota_stopped,
            "autobid run complete"
        );

        summary
    }

    /// Evaluate one candidate job through assemble → predict → decide →
    /// submit-or-skip, recording exactly one audit row. Infallible: every
    /// failure mode maps to a skip outcome.
    async fn evaluate_job(
        &self,
        profile: &DbProfile,
        job: &DbJob,
        stats: Option<&crate::db::models::DbHistoricalStats>,
    ) -> AttemptOutcome {
        let features = self.assembler.assemble(job, profile, stats, Utc::now());
        let probability = self.score(features).await;
        let decision = decide(probability, self.settings.decision_threshold);

        let (outcome, bid_text) = match decision {
            Decision::Bid => {
                let text = compose_proposal(profile, job);
                self.submit_pacer.wait().await;

                match self
                    .executor
                    .submit_bid(profile.id, job.id, &text)
                    .await
                {
                    Ok(()) => {
                        let now_ts = Utc::now().timestamp() as f64;
                        if let Err(e) =
                            self.store.record_bid(profile.id, job.id, now_ts).await
                        {
                            warn!(profile_id = profile.id, job_id = job.id, error = %e, "failed to record placed bid");
                        }
                        self.event_bus.publish(BotEvent::BidPlaced {
                            profile_id: profile.id,
                            job_id: job.id,
                            probability: probability.unwrap_or(0.0),
                        });
                        (AttemptOutcome::BidPlaced, Some(text))
                    }
                    Err(e) => {
                        warn!(profile_id = profile.id, job_id = job.id, error = %e, "bid submission failed");
                        self.publish_skip(profile.id, job.id, "submission_failed", probability);
                        (AttemptOutcome::SkippedFailure, Some(text))
                    }
                }
            }
            Decision::SkipLowProbability => {
                debug!(
                    profile_id = profile.id,
                    job_id = job.id,
                    probability = probability.unwrap_or(0.0),
                    threshold = self.settings.decision_threshold,
                    "below threshold, skipping"
                );
                self.publish_skip(profile.id, job.id, "low_probability", probability);
                (AttemptOutcome::SkippedLowProbability, None)
            }
            Decision::SkipPredictionFailed => {
                self.publish_skip(profile.id, job.id, "prediction_failed", probability);
                (AttemptOutcome::SkippedPredictionFailed, None)
            }
        };

        self.record_attempt(profile.id, job.id, outcome, probability, bid_text)
            .await;
        outcome
    }

    /// Score a feature vector, treating every failure — unloaded model,
    /// inference error, timeout — as "no probability".
    async fn score(&self, features: FeatureVector) -> Option<f64> {
        let service = Arc::clone(&self.prediction);
        let task = tokio::task::spawn_blocking(move || service.predict(&features));

        match time::timeout(self.settings.predict_timeout, task).await {
            Ok(Ok(Ok(prediction))) => Some(prediction.success_probability),
            Ok(Ok(Err(ModelError::NotLoaded))) => {
                warn!("prediction unavailable: no model loaded");
                None
            }
            Ok(Ok(Err(e))) => {
                warn!(error = %e, "prediction failed");
                None
            }
            Ok(Err(e)) => {
                warn!(error = %e, "prediction task failed");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.settings.predict_timeout.as_millis() as u64,
                    "prediction timed out"
                );
                None
            }
        }
    }

    fn publish_skip(&self, profile_id: i64, job_id: i64, reason: &str, probability: Option<f64>) {
        self.event_bus.publish(BotEvent::BidSkipped {
            profile_id,
            job_id,
            reason: reason.to_string(),
            probability,
        });
    }

    async fn record_attempt(
        &self,
        profile_id: i64,
        job_id: i64,
        outcome: AttemptOutcome,
        probability: Option<f64>,
        bid_text: Option<String>,
    ) {
        let attempt = NewBidAttempt {
            profile_id,
            job_id,
            decision: outcome.as_str().to_string(),
            probability,
            bid_text,
            created_at: Utc::now().timestamp() as f64,
        };
        if let Err(e) = self.store.record_attempt(attempt).await {
            warn!(profile_id, job_id, error = %e, "failed to append bid attempt");
        }
    }
}

/// Short proposal template from the job title and the profile's skill list.
fn compose_proposal(profile: &DbProfile, job: &DbJob) -> String {
    let skills = profile
        .skills
        .as_deref()
        .map(parse_skill_list)
        .unwrap_or_default();

    let background = if skills.is_empty() {
        String::new()
    } else {
        format!(" My background in {} fits this well.", skills.join(", "))
    };

    format!(
        "Hello! I read your posting \"{}\" and I'd be glad to help.{} \
         Happy to discuss scope and timeline — I can start right away.",
        job.title, background
    )
}

/// Periodic driver: one sequential pass over all enabled profiles, with a
/// jittered delay between profiles.
pub async fn run_autobid_loop(
    orchestrator: Arc<AutobidOrchestrator>,
    db: PgPool,
    profile_pacer: Pacer,
    interval_secs: u64,
) {
    let interval = Duration::from_secs(interval_secs.max(30));
    info!(interval_secs = interval.as_secs(), "autobid loop started");

    loop {
        match queries::get_autobid_profiles(&db).await {
            Ok(profiles) => {
                debug!(profiles = profiles.len(), "autobid pass starting");
                for profile in &profiles {
                    orchestrator.run_profile(profile).await;
                    profile_pacer.wait().await;
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to list autobid profiles");
            }
        }

        time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::DbHistoricalStats;
    use crate::predict::model::ModelArtifact;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct FakeStore {
        placed_today: i64,
        stats: Option<DbHistoricalStats>,
        attempts: Mutex<Vec<NewBidAttempt>>,
        bids: Mutex<Vec<(i64, i64)>>,
    }

    impl FakeStore {
        fn empty() -> Self {
            Self {
                placed_today: 0,
                stats: None,
                attempts: Mutex::new(Vec::new()),
                bids: Mutex::new(Vec::new()),
            }
        }

        fn decisions(&self) -> Vec<String> {
            self.attempts
                .lock()
                .iter()
                .map(|a| a.decision.clone())
                .collect()
        }
    }

    #[async_trait]
    impl DataStore for FakeStore {
        async fn stats_for(
            &self,
            _profile_id: i64,
        ) -> anyhow::Result<Option<DbHistoricalStats>> {
            Ok(self.stats.clone())
        }

        async fn bids_placed_today(
            &self,
            _profile_id: i64,
            _now: chrono::DateTime<Utc>,
        ) -> anyhow::Result<i64> {
            Ok(self.placed_today)
        }

        async fn record_attempt(&self, attempt: NewBidAttempt) -> anyhow::Result<()> {
            self.attempts.lock().push(attempt);
            Ok(())
        }

        async fn record_bid(
            &self,
            profile_id: i64,
            job_id: i64,
            _placed_at: f64,
        ) -> anyhow::Result<()> {
            self.bids.lock().push((profile_id, job_id));
            Ok(())
        }
    }

    struct FakeDiscovery {
        jobs: Vec<DbJob>,
    }

    #[async_trait]
    impl JobDiscovery for FakeDiscovery {
        async fn candidate_jobs(&self, _profile: &DbProfile) -> anyhow::Result<Vec<DbJob>> {
            Ok(self.jobs.clone())
        }
    }

    struct FakeExecutor {
        fail: bool,
        submitted: Mutex<Vec<(i64, i64)>>,
    }

    #[async_trait]
    impl BidExecutor for FakeExecutor {
        async fn submit_bid(
            &self,
            profile_id: i64,
            job_id: i64,
            _bid_text: &str,
        ) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("executor down");
            }
            self.submitted.lock().push((profile_id, job_id));
            Ok(())
        }
    }

    fn profile(enabled: bool, daily_limit: i64) -> DbProfile {
        DbProfile {
            id: 1,
            owner: "alice".into(),
            skills: Some(r#"["python"]"#.into()),
            experience_level: Some("expert".into()),
            profile_type: Some("personal".into()),
            autobid_enabled: enabled,
            daily_bid_limit: Some(daily_limit),
            bid_settings: None,
        }
    }

    fn jobs(n: usize) -> Vec<DbJob> {
        (0..n)
            .map(|i| DbJob {
                id: i as i64 + 100,
                external_id: Some(format!("ext-{}", i)),
                title: format!("Job {}", i),
                description: "desc".into(),
                description_embedding: None,
                posted_at: None,
                raw_payload: None,
            })
            .collect()
    }

    /// A constant model: empty ensemble, so P(success) = sigmoid(base_score).
    fn constant_model(base_score: f64) -> Arc<PredictionService> {
        let svc = PredictionService::new("unused.json");
        svc.install(ModelArtifact {
            model_info: "constant".into(),
            feature_names: None,
            base_score,
            trees: vec![],
        });
        Arc::new(svc)
    }

    fn build(
        prediction: Arc<PredictionService>,
        store: Arc<FakeStore>,
        discovery: FakeDiscovery,
        executor: Arc<FakeExecutor>,
    ) -> AutobidOrchestrator {
        AutobidOrchestrator::new(
            FeatureAssembler::new(36.0),
            prediction,
            store,
            Arc::new(discovery),
            executor,
            Arc::new(EventBus::new(64)),
            Pacer::new(0, 0),
            OrchestratorSettings {
                decision_threshold: 0.5,
                predict_timeout: Duration::from_secs(1),
                default_daily_limit: 10,
                max_candidates_per_run: 50,
            },
        )
    }

    #[tokio::test]
    async fn quota_limits_bids_and_stops_evaluation() {
        let store = Arc::new(FakeStore::empty());
        let executor = Arc::new(FakeExecutor {
            fail: false,
            submitted: Mutex::new(Vec::new()),
        });
        // Always-bid model, limit 2, 5 candidates
        let orch = build(
            constant_model(5.0),
            store.clone(),
            FakeDiscovery { jobs: jobs(5) },
            executor.clone(),
        );

        let summary = orch.run_profile(&profile(true, 2)).await;

        assert_eq!(summary.placed, 2);
        assert_eq!(summary.evaluated, 2);
        assert_eq!(summary.quota_stopped, 3);
        assert_eq!(executor.submitted.lock().len(), 2);

        let decisions = store.decisions();
        assert_eq!(decisions.len(), 5);
        assert_eq!(
            decisions.iter().filter(|d| *d == "bid_placed").count(),
            2
        );
        assert_eq!(
            decisions.iter().filter(|d| *d == "quota_stopped").count(),
            3
        );
    }

    #[tokio::test]
    async fn every_candidate_gets_exactly_one_audit_row() {
        let store = Arc::new(FakeStore::empty());
        let executor = Arc::new(FakeExecutor {
            fail: false,
            submitted: Mutex::new(Vec::new()),
        });
        // Limit 3, 4 candidates: the candidate drawn when the quota trips
        // must still land in the audit log as quota_stopped
        let orch = build(
            constant_model(5.0),
            store.clone(),
            FakeDiscovery { jobs: jobs(4) },
            executor.clone(),
        );

        let summary = orch.run_profile(&profile(true, 3)).await;
        assert_eq!(summary.placed, 3);
        assert_eq!(summary.evaluated, 3);
        assert_eq!(summary.quota_stopped, 1);
        assert_eq!(store.decisions().len(), 4);
    }

    #[tokio::test]
    async fn quota_equal_to_candidates_leaves_no_leftover() {
        let store = Arc::new(FakeStore::empty());
        let executor = Arc::new(FakeExecutor {
            fail: false,
            submitted: Mutex::new(Vec::new()),
        });
        let orch = build(
            constant_model(5.0),
            store.clone(),
            FakeDiscovery { jobs: jobs(3) },
            executor.clone(),
        );

        let summary = orch.run_profile(&profile(true, 3)).await;
        assert_eq!(summary.placed, 3);
        assert_eq!(summary.evaluated, 3);
        assert_eq!(summary.quota_stopped, 0);
        assert!(store.decisions().iter().all(|d| d == "bid_placed"));
    }

    #[tokio::test]
    async fn disabled_profile_is_skipped_entirely() {
        let store = Arc::new(FakeStore::empty());
        let executor = Arc::new(FakeExecutor {
            fail: false,
            submitted: Mutex::new(Vec::new()),
        });
        let orch = build(
            constant_model(5.0),
            store.clone(),
            FakeDiscovery { jobs: jobs(3) },
            executor.clone(),
        );

        let summary = orch.run_profile(&profile(false, 5)).await;
        assert_eq!(summary, RunSummary::default());
        assert!(store.attempts.lock().is_empty());
        assert!(executor.submitted.lock().is_empty());
    }

    #[tokio::test]
    async fn existing_bids_today_count_against_quota() {
        let mut store = FakeStore::empty();
        store.placed_today = 5;
        let store = Arc::new(store);
        let executor = Arc::new(FakeExecutor {
            fail: false,
            submitted: Mutex::new(Vec::new()),
        });
        let orch = build(
            constant_model(5.0),
            store.clone(),
            FakeDiscovery { jobs: jobs(3) },
            executor.clone(),
        );

        let summary = orch.run_profile(&profile(true, 5)).await;
        assert_eq!(summary.placed, 0);
        assert_eq!(summary.evaluated, 0);
        assert!(executor.submitted.lock().is_empty());
    }

    #[tokio::test]
    async fn low_probability_skips_without_submitting() {
        let store = Arc::new(FakeStore::empty());
        let executor = Arc::new(FakeExecutor {
            fail: false,
            submitted: Mutex::new(Vec::new()),
        });
        // Always-skip model
        let orch = build(
            constant_model(-5.0),
            store.clone(),
            FakeDiscovery { jobs: jobs(3) },
            executor.clone(),
        );

        let summary = orch.run_profile(&profile(true, 5)).await;
        assert_eq!(summary.placed, 0);
        assert_eq!(summary.evaluated, 3);
        assert!(executor.submitted.lock().is_empty());
        assert!(store
            .decisions()
            .iter()
            .all(|d| d == "skipped_low_probability"));
        // Probability is recorded for auditability
        assert!(store
            .attempts
            .lock()
            .iter()
            .all(|a| a.probability.is_some()));
    }

    #[tokio::test]
    async fn unloaded_model_yields_prediction_failed_skips() {
        let store = Arc::new(FakeStore::empty());
        let executor = Arc::new(FakeExecutor {
            fail: false,
            submitted: Mutex::new(Vec::new()),
        });
        let unloaded = Arc::new(PredictionService::new("unused.json"));
        let orch = build(
            unloaded,
            store.clone(),
            FakeDiscovery { jobs: jobs(2) },
            executor.clone(),
        );

        let summary = orch.run_profile(&profile(true, 5)).await;
        assert_eq!(summary.placed, 0);
        assert!(executor.submitted.lock().is_empty());
        let attempts = store.attempts.lock();
        assert_eq!(attempts.len(), 2);
        assert!(attempts
            .iter()
            .all(|a| a.decision == "skipped_prediction_failed" && a.probability.is_none()));
    }

    #[tokio::test]
    async fn submission_failure_is_isolated_per_job() {
        let store = Arc::new(FakeStore::empty());
        let executor = Arc::new(FakeExecutor {
            fail: true,
            submitted: Mutex::new(Vec::new()),
        });
        let orch = build(
            constant_model(5.0),
            store.clone(),
            FakeDiscovery { jobs: jobs(3) },
            executor.clone(),
        );

        let summary = orch.run_profile(&profile(true, 5)).await;
        // Failed submissions don't consume quota, and the run continues
        assert_eq!(summary.placed, 0);
        assert_eq!(summary.evaluated, 3);
        assert!(store.decisions().iter().all(|d| d == "skipped_failure"));
        assert!(store.bids.lock().is_empty());
    }

    #[test]
    fn proposal_mentions_title_and_skills() {
        let p = profile(true, 5);
        let j = &jobs(1)[0];
        let text = compose_proposal(&p, j);
        assert!(text.contains("Job 0"));
        assert!(text.contains("python"));
    }
}
