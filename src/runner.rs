//! Orchestrator: sequences the four-stage pipeline over one trial's locked
//! visits, fuses the detector scores into a risk score and level, and maps
//! the results onto the store's write interface.

use std::collections::BTreeSet;
use std::sync::Arc;

use log::{error, info, warn};

use crate::config::{FusionWeights, TrialPhase, AI_VERSION};
use crate::detectors::behavioral::{
    build_behavioral_baseline, detect_behavioral_anomalies, VisitGapRules,
};
use crate::detectors::cross_hospital::detect_cross_hospital_deviation;
use crate::detectors::cross_patient::{detect_cross_patient_templating, TemplatingConfig};
use crate::detectors::statistical::{build_trial_baseline, detect_statistical_anomalies};
use crate::detectors::DetectorResultMap;
use crate::error::TrialwatchError;
use crate::features::behavioral::extract_behavioral_features;
use crate::features::cross_hospital::extract_cross_hospital_features;
use crate::features::cross_patient::extract_cross_patient_features;
use crate::features::statistical::extract_statistical_features;
use crate::stats::round2;
use crate::store::{
    HospitalScoreRecord, NewAiRun, RiskLevel, RunStatus, SignalRecord, TrialStore, VisitRow,
};

/// Risk-level boundaries on the 0-100 scale; left-inclusive, so exactly 30
/// is MEDIUM and exactly 60 is HIGH.
pub const LOW_RISK_CEILING: f64 = 30.0;
pub const MEDIUM_RISK_CEILING: f64 = 60.0;

pub fn risk_level_for(risk_score: f64) -> RiskLevel {
    if risk_score < LOW_RISK_CEILING {
        RiskLevel::Low
    } else if risk_score < MEDIUM_RISK_CEILING {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

/// Fuses the four component scores into the 0-100 risk score.
pub fn fuse_risk_score(
    weights: &FusionWeights,
    statistical: f64,
    behavioral: f64,
    cross_patient: f64,
    peer_deviation: f64,
) -> f64 {
    let weighted = weights.statistical * statistical
        + weights.behavioral * behavioral
        + weights.cross_patient * cross_patient
        + weights.peer_deviation * peer_deviation;
    round2(weighted * 100.0)
}

/// Trigger metadata recorded on the run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub trigger_type: String,
    pub triggered_by: Option<String>,
    pub notes: Option<String>,
}

impl RunOptions {
    pub fn manual(triggered_by: Option<String>) -> Self {
        RunOptions {
            trigger_type: "manual".to_string(),
            triggered_by,
            notes: None,
        }
    }

    pub fn cron() -> Self {
        RunOptions {
            trigger_type: "cron".to_string(),
            triggered_by: None,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: i64,
    pub hospitals_scored: usize,
    pub signals_emitted: usize,
}

/// Per-trial result of a batch invocation.
#[derive(Debug, Clone)]
pub enum TrialOutcome {
    Completed(RunSummary),
    /// No locked visits; no run record was created.
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct TrialReport {
    pub trial_id: String,
    pub outcome: TrialOutcome,
}

pub struct Runner {
    store: Arc<dyn TrialStore>,
    phase: TrialPhase,
    weights: FusionWeights,
    templating: TemplatingConfig,
}

impl Runner {
    pub fn new(store: Arc<dyn TrialStore>, phase: TrialPhase, weights: FusionWeights) -> Self {
        Runner {
            store,
            phase,
            weights,
            templating: TemplatingConfig::default(),
        }
    }

    /// Runs the full pipeline for one trial.
    ///
    /// Returns `Ok(None)` when the trial has no locked visits (no run record
    /// is created). On any failure after run creation the run is finalized
    /// as failed and the error propagates; hospital rows already written
    /// stay in the store for audit.
    pub fn run_trial(
        &self,
        trial_id: &str,
        options: RunOptions,
    ) -> Result<Option<RunSummary>, TrialwatchError> {
        let rows = self.store.fetch_locked_visits(trial_id)?;
        if rows.is_empty() {
            warn!("trial {}: no locked visits, skipping", trial_id);
            return Ok(None);
        }

        let run_id = self.store.create_ai_run(NewAiRun {
            trial_id: trial_id.to_string(),
            ai_version: AI_VERSION.to_string(),
            trigger_type: options.trigger_type,
            triggered_by: options.triggered_by,
            notes: options.notes,
        })?;
        info!("trial {}: run {} started ({} rows)", trial_id, run_id, rows.len());

        match self.analyze_and_persist(run_id, trial_id, &rows) {
            Ok(summary) => {
                self.store.finalize_ai_run(run_id, RunStatus::Completed)?;
                info!(
                    "trial {}: run {} completed, {} hospitals scored, {} signals",
                    trial_id, run_id, summary.hospitals_scored, summary.signals_emitted
                );
                Ok(Some(summary))
            }
            Err(err) => {
                if let Err(finalize_err) = self.store.finalize_ai_run(run_id, RunStatus::Failed) {
                    error!(
                        "trial {}: run {} could not be marked failed: {}",
                        trial_id, run_id, finalize_err
                    );
                }
                Err(err)
            }
        }
    }

    /// Runs every active trial in sequence. A skipped or failed trial does
    /// not stop later trials; the per-trial outcomes are returned.
    pub fn run_all_active(&self) -> Result<Vec<TrialReport>, TrialwatchError> {
        let trial_ids = self.store.fetch_active_trials()?;
        let mut reports = Vec::with_capacity(trial_ids.len());

        for trial_id in trial_ids {
            let outcome = match self.run_trial(&trial_id, RunOptions::cron()) {
                Ok(Some(summary)) => TrialOutcome::Completed(summary),
                Ok(None) => TrialOutcome::Skipped,
                Err(err) => {
                    error!("trial {}: run failed: {}", trial_id, err);
                    TrialOutcome::Failed(err.to_string())
                }
            };
            reports.push(TrialReport { trial_id, outcome });
        }

        Ok(reports)
    }

    fn analyze_and_persist(
        &self,
        run_id: i64,
        trial_id: &str,
        rows: &[VisitRow],
    ) -> Result<RunSummary, TrialwatchError> {
        let stat_features = extract_statistical_features(rows);
        let stat_baseline = build_trial_baseline(&stat_features);
        let stat_results = detect_statistical_anomalies(&stat_features, &stat_baseline);

        let rules = VisitGapRules::for_phase(self.phase);
        let beh_features =
            extract_behavioral_features(rows, rules.min_gap_days, rules.hard_gap_days);
        let beh_baseline = build_behavioral_baseline(&beh_features);
        let beh_results =
            detect_behavioral_anomalies(&beh_features, Some(&beh_baseline), self.phase);

        let cp_features = extract_cross_patient_features(rows);
        let cp_results = detect_cross_patient_templating(&cp_features, &self.templating);

        let vectors = extract_cross_hospital_features(&stat_results, &beh_results, &cp_results);
        let peer_results = detect_cross_hospital_deviation(&vectors);

        self.persist_results(
            run_id,
            trial_id,
            &stat_results,
            &beh_results,
            &cp_results,
            &peer_results,
        )
    }

    fn persist_results(
        &self,
        run_id: i64,
        trial_id: &str,
        stat_results: &DetectorResultMap,
        beh_results: &DetectorResultMap,
        cp_results: &DetectorResultMap,
        peer_results: &DetectorResultMap,
    ) -> Result<RunSummary, TrialwatchError> {
        let mut hospitals: BTreeSet<&String> = BTreeSet::new();
        hospitals.extend(stat_results.keys());
        hospitals.extend(beh_results.keys());
        hospitals.extend(cp_results.keys());

        let mut signals_emitted = 0usize;
        let hospitals_scored = hospitals.len();

        for hospital_id in hospitals {
            let stat = stat_results.get(hospital_id);
            let beh = beh_results.get(hospital_id);
            let cp = cp_results.get(hospital_id);
            let peer = peer_results.get(hospital_id);

            let risk_score = fuse_risk_score(
                &self.weights,
                stat.map_or(0.0, |r| r.score),
                beh.map_or(0.0, |r| r.score),
                cp.map_or(0.0, |r| r.score),
                peer.map_or(0.0, |r| r.score),
            );
            let risk_level = risk_level_for(risk_score);

            self.store.save_hospital_scores(HospitalScoreRecord {
                ai_run_id: run_id,
                trial_id: trial_id.to_string(),
                hospital_id: hospital_id.clone(),
                statistical_score: stat.map(|r| r.score),
                behavioral_score: beh.map(|r| r.score),
                cross_patient_score: cp.map(|r| r.score),
                peer_deviation_score: peer.map(|r| r.score),
                risk_score,
                risk_level,
            })?;

            let records: Vec<SignalRecord> = [stat, beh, cp, peer]
                .into_iter()
                .flatten()
                .flat_map(|r| r.signals.iter().map(|s| s.to_record()))
                .collect();
            signals_emitted += records.len();
            self.store
                .save_anomaly_signals(run_id, trial_id, hospital_id, &records)?;
        }

        Ok(RunSummary {
            run_id,
            hospitals_scored,
            signals_emitted,
        })
    }
}
