//! Feature assembly — composes every featurizer plus the historical stats
//! row into one flat named vector per (profile, job) pair.
//!
//! The output layout is fixed: `job_emb_*`, then `profile_*`, then `hist_*`,
//! then `bid_temp_*`. The downstream model has a rigid input schema, so the
//! vector length never varies with data availability — missing data is
//! imputed, and every imputation logs a warning.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::db::models::{DbHistoricalStats, DbJob, DbProfile};
use crate::features::skills::{
    featurize_experience_level, featurize_profile_type, featurize_skills,
};
use crate::features::temporal::{featurize_bid_settings, featurize_submission_time};
use crate::features::vector::FeatureVector;

/// Dimensionality of the job description embedding the training pipeline
/// produces. Jobs without one contribute a zero block of the same length.
pub const EMBEDDING_DIM: usize = 384;

pub struct FeatureAssembler {
    staleness_secs: f64,
}

impl FeatureAssembler {
    pub fn new(staleness_hours: f64) -> Self {
        Self {
            staleness_secs: staleness_hours * 3600.0,
        }
    }

    /// Build the full feature vector for one (job, profile) pair.
    ///
    /// Deterministic for fixed inputs; only the `bid_temp_` block depends on
    /// the evaluation instant `now`. The result contains no non-finite
    /// values.
    pub fn assemble(
        &self,
        job: &DbJob,
        profile: &DbProfile,
        stats: Option<&DbHistoricalStats>,
        now: DateTime<Utc>,
    ) -> FeatureVector {
        let mut fv = FeatureVector::with_capacity(EMBEDDING_DIM + 64);

        self.add_embedding(&mut fv, job);
        self.add_profile(&mut fv, profile);
        self.add_historical(&mut fv, profile.id, stats, now);
        self.add_bid_context(&mut fv, profile, now);

        let clamped = fv.sanitize();
        if clamped > 0 {
            warn!(
                job_id = job.id,
                profile_id = profile.id,
                clamped,
                "non-finite feature values clamped to 0.0"
            );
        }

        fv
    }

    fn add_embedding(&self, fv: &mut FeatureVector, job: &DbJob) {
        let parsed = job.description_embedding.as_ref().and_then(parse_embedding);

        match parsed {
            Some(emb) if emb.len() == EMBEDDING_DIM => {
                for (i, v) in emb.iter().enumerate() {
                    fv.insert(format!("job_emb_{}", i), *v);
                }
            }
            Some(emb) => {
                warn!(
                    job_id = job.id,
                    got = emb.len(),
                    expected = EMBEDDING_DIM,
                    "embedding has wrong dimensionality, using zero block"
                );
                self.zero_embedding(fv);
            }
            None if job.description_embedding.is_some() => {
                warn!(
                    job_id = job.id,
                    "description embedding is present but unparseable, using zero block"
                );
                self.zero_embedding(fv);
            }
            None => {
                warn!(job_id = job.id, "job has no description embedding, using zero block");
                self.zero_embedding(fv);
            }
        }
    }

    fn zero_embedding(&self, fv: &mut FeatureVector) {
        for i in 0..EMBEDDING_DIM {
            fv.insert(format!("job_emb_{}", i), 0.0);
        }
    }

    fn add_profile(&self, fv: &mut FeatureVector, profile: &DbProfile) {
        let skills = featurize_skills(profile.skills.as_deref());
        for (i, v) in skills.iter().enumerate() {
            fv.insert(format!("profile_skill_{}", i), *v);
        }
        fv.insert(
            "profile_experience_level",
            featurize_experience_level(profile.experience_level.as_deref()),
        );
        fv.insert(
            "profile_type",
            featurize_profile_type(profile.profile_type.as_deref()),
        );
    }

    fn add_historical(
        &self,
        fv: &mut FeatureVector,
        profile_id: i64,
        stats: Option<&DbHistoricalStats>,
        now: DateTime<Utc>,
    ) {
        let usable = match stats {
            Some(row) => {
                let age = now.timestamp() as f64 - row.last_updated_at;
                if age >= self.staleness_secs {
                    warn!(
                        profile_id,
                        age_hours = age / 3600.0,
                        "historical stats are stale, using neutral defaults"
                    );
                    None
                } else {
                    Some(row)
                }
            }
            None => {
                warn!(profile_id, "no historical stats row, using neutral defaults");
                None
            }
        };

        match usable {
            Some(row) => {
                // Individual None success rates mean "no bids in window";
                // imputed to 0.0 here, but preserved as NULL in the store.
                fv.insert("hist_success_rate_7d", row.success_rate_7d.unwrap_or(0.0));
                fv.insert("hist_success_rate_30d", row.success_rate_30d.unwrap_or(0.0));
                fv.insert("hist_success_rate_90d", row.success_rate_90d.unwrap_or(0.0));
                fv.insert("hist_bid_frequency_7d", row.bid_frequency_7d);
                fv.insert("hist_bid_frequency_30d", row.bid_frequency_30d);
                fv.insert("hist_bid_frequency_90d", row.bid_frequency_90d);
            }
            None => {
                for name in [
                    "hist_success_rate_7d",
                    "hist_success_rate_30d",
                    "hist_success_rate_90d",
                    "hist_bid_frequency_7d",
                    "hist_bid_frequency_30d",
                    "hist_bid_frequency_90d",
                ] {
                    fv.insert(name, 0.0);
                }
            }
        }
    }

    /// Current-bid-context block: temporal features of the evaluation instant
    /// plus the profile's bid-settings snapshot, one shared namespace.
    fn add_bid_context(&self, fv: &mut FeatureVector, profile: &DbProfile, now: DateTime<Utc>) {
        let t = featurize_submission_time(Some(now));
        fv.insert("bid_temp_hour_of_day", t.hour_of_day);
        fv.insert("bid_temp_day_of_week", t.day_of_week);
        fv.insert("bid_temp_month", t.month);
        fv.insert("bid_temp_is_weekend", t.is_weekend);

        let s = featurize_bid_settings(profile.bid_settings.as_deref());
        fv.insert("bid_temp_budget", s.budget);
        fv.insert("bid_temp_duration_weeks", s.duration_weeks);
        fv.insert("bid_temp_is_fixed_price", s.is_fixed_price);
    }
}

/// Parse a stored embedding (JSON array of numbers) into a Vec<f64>.
fn parse_embedding(val: &serde_json::Value) -> Option<Vec<f64>> {
    let arr = val.as_array()?;
    let mut out = Vec::with_capacity(arr.len());
    for v in arr {
        out.push(v.as_f64()?);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn job(embedding: Option<serde_json::Value>) -> DbJob {
        DbJob {
            id: 1,
            external_id: Some("ext-1".into()),
            title: "Build a scraper".into(),
            description: "Scrape things".into(),
            description_embedding: embedding,
            posted_at: Some(1_700_000_000.0),
            raw_payload: None,
        }
    }

    fn profile() -> DbProfile {
        DbProfile {
            id: 7,
            owner: "alice".into(),
            skills: Some(r#"["python", "web scraping"]"#.into()),
            experience_level: Some("expert".into()),
            profile_type: Some("personal".into()),
            autobid_enabled: true,
            daily_bid_limit: Some(5),
            bid_settings: Some(r#"{"budget": 300.0, "duration_weeks": 2}"#.into()),
        }
    }

    fn stats(last_updated_at: f64) -> DbHistoricalStats {
        DbHistoricalStats {
            profile_id: 7,
            success_rate_7d: Some(0.4),
            success_rate_30d: None,
            success_rate_90d: Some(0.25),
            bid_frequency_7d: 5.0,
            bid_frequency_30d: 12.0,
            bid_frequency_90d: 40.0,
            last_updated_at,
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 17, 10, 0, 0).unwrap()
    }

    #[test]
    fn deterministic_for_fixed_inputs() {
        let asm = FeatureAssembler::new(36.0);
        let j = job(Some(serde_json::json!(vec![0.5; EMBEDDING_DIM])));
        let p = profile();
        let now = fixed_now();
        let s = stats(now.timestamp() as f64 - 3600.0);

        let a = asm.assemble(&j, &p, Some(&s), now);
        let b = asm.assemble(&j, &p, Some(&s), now);
        assert_eq!(a.names(), b.names());
        assert_eq!(a.values(), b.values());
    }

    #[test]
    fn embedding_block_length_is_constant() {
        let asm = FeatureAssembler::new(36.0);
        let p = profile();
        let now = fixed_now();

        let with = asm.assemble(
            &job(Some(serde_json::json!(vec![0.1; EMBEDDING_DIM]))),
            &p,
            None,
            now,
        );
        let without = asm.assemble(&job(None), &p, None, now);
        let wrong_len = asm.assemble(&job(Some(serde_json::json!([0.1, 0.2]))), &p, None, now);

        assert_eq!(with.len(), without.len());
        assert_eq!(with.len(), wrong_len.len());
        assert_eq!(without.get("job_emb_0"), Some(0.0));
        assert_eq!(
            without.get(&format!("job_emb_{}", EMBEDDING_DIM - 1)),
            Some(0.0)
        );
        assert_eq!(with.get("job_emb_0"), Some(0.1));
    }

    #[test]
    fn unparseable_embedding_uses_zero_block() {
        let asm = FeatureAssembler::new(36.0);
        let mut entries = vec![serde_json::json!(0.1); EMBEDDING_DIM];
        entries[5] = serde_json::json!("not a number");
        let j = job(Some(serde_json::Value::Array(entries)));

        let fv = asm.assemble(&j, &profile(), None, fixed_now());
        assert_eq!(fv.get("job_emb_0"), Some(0.0));
        assert_eq!(fv.get("job_emb_5"), Some(0.0));
        assert_eq!(
            fv.get(&format!("job_emb_{}", EMBEDDING_DIM - 1)),
            Some(0.0)
        );
    }

    #[test]
    fn stale_stats_use_defaults_fresh_stats_do_not() {
        let asm = FeatureAssembler::new(36.0);
        let j = job(None);
        let p = profile();
        let now = fixed_now();

        // Two days old: stale
        let stale = stats(now.timestamp() as f64 - 2.0 * 86_400.0);
        let fv = asm.assemble(&j, &p, Some(&stale), now);
        assert_eq!(fv.get("hist_success_rate_7d"), Some(0.0));
        assert_eq!(fv.get("hist_bid_frequency_90d"), Some(0.0));

        // One hour old: fresh
        let fresh = stats(now.timestamp() as f64 - 3600.0);
        let fv = asm.assemble(&j, &p, Some(&fresh), now);
        assert_eq!(fv.get("hist_success_rate_7d"), Some(0.4));
        assert_eq!(fv.get("hist_bid_frequency_90d"), Some(40.0));
        // None success rate imputed to 0.0 at assembly
        assert_eq!(fv.get("hist_success_rate_30d"), Some(0.0));
    }

    #[test]
    fn missing_stats_row_uses_defaults() {
        let asm = FeatureAssembler::new(36.0);
        let fv = asm.assemble(&job(None), &profile(), None, fixed_now());
        assert_eq!(fv.get("hist_success_rate_7d"), Some(0.0));
        assert_eq!(fv.get("hist_bid_frequency_7d"), Some(0.0));
    }

    #[test]
    fn output_contains_no_non_finite_values() {
        let asm = FeatureAssembler::new(36.0);
        let mut emb = vec![0.1; EMBEDDING_DIM];
        emb[3] = f64::NAN;
        let j = job(Some(serde_json::json!(emb)));
        let fv = asm.assemble(&j, &profile(), None, fixed_now());
        assert!(fv.values().iter().all(|v| v.is_finite()));
        assert_eq!(fv.get("job_emb_3"), Some(0.0));
    }

    #[test]
    fn temporal_block_reflects_evaluation_time() {
        let asm = FeatureAssembler::new(36.0);
        let fv = asm.assemble(&job(None), &profile(), None, fixed_now());
        // 2024-06-17 10:00 UTC is a Monday
        assert_eq!(fv.get("bid_temp_hour_of_day"), Some(10.0));
        assert_eq!(fv.get("bid_temp_day_of_week"), Some(0.0));
        assert_eq!(fv.get("bid_temp_is_weekend"), Some(0.0));
        assert_eq!(fv.get("bid_temp_budget"), Some(300.0));
        assert_eq!(fv.get("bid_temp_duration_weeks"), Some(2.0));
        assert_eq!(fv.get("bid_temp_is_fixed_price"), Some(0.0));
    }
}
