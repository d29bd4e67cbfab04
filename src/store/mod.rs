//! External store boundary.
//!
//! The relational store itself is out of scope; this module defines the two
//! read operations and four write operations the orchestrator needs, plus the
//! row shapes flowing across that boundary. [`MemoryStore`] is the in-process
//! implementation used for tests and demo serving.

mod memory;
pub use memory::{AiRunRow, MemoryStore, StoredSignal};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// One locked visit joined with a single answered numeric CRF field value.
/// A visit with many answered fields appears as many rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitRow {
    pub hospital_id: String,
    pub patient_id: String,
    pub visit_id: String,
    pub visit_date: NaiveDateTime,
    pub created_at: NaiveDateTime,
    pub crf_field_id: String,
    pub value_number: f64,
}

/// Lifecycle of a run record. Created as `Running`, finalized exactly once
/// to `Completed` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

/// Categorical risk bucket derived from the fused 0-100 risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

/// Inputs for creating a run record; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewAiRun {
    pub trial_id: String,
    pub ai_version: String,
    pub trigger_type: String,
    pub triggered_by: Option<String>,
    pub notes: Option<String>,
}

/// Per (run, hospital) score row: the four component scores plus the fused
/// risk score and level.
#[derive(Debug, Clone, Serialize)]
pub struct HospitalScoreRecord {
    pub ai_run_id: i64,
    pub trial_id: String,
    pub hospital_id: String,
    pub statistical_score: Option<f64>,
    pub behavioral_score: Option<f64>,
    pub cross_patient_score: Option<f64>,
    pub peer_deviation_score: Option<f64>,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
}

/// One explanatory anomaly signal row.
#[derive(Debug, Clone, Serialize)]
pub struct SignalRecord {
    pub signal_type: String,
    pub signal_key: String,
    pub affected_field: Option<String>,
    pub anomaly_score: f64,
    pub explanation: String,
}

/// Read/write interface to the trial store.
pub trait TrialStore: Send + Sync {
    /// Ids of all trials currently in `active` status.
    fn fetch_active_trials(&self) -> Result<Vec<String>, StoreError>;

    /// Locked visit rows with joined numeric field values for one trial.
    fn fetch_locked_visits(&self, trial_id: &str) -> Result<Vec<VisitRow>, StoreError>;

    /// Creates a run record in `running` status and returns its id.
    fn create_ai_run(&self, run: NewAiRun) -> Result<i64, StoreError>;

    /// Moves a run to a terminal status. Errors if the run does not exist or
    /// was already finalized.
    fn finalize_ai_run(&self, run_id: i64, status: RunStatus) -> Result<(), StoreError>;

    fn save_hospital_scores(&self, record: HospitalScoreRecord) -> Result<(), StoreError>;

    /// Persists anomaly signal rows for one hospital; a no-op when `signals`
    /// is empty.
    fn save_anomaly_signals(
        &self,
        ai_run_id: i64,
        trial_id: &str,
        hospital_id: &str,
        signals: &[SignalRecord],
    ) -> Result<(), StoreError>;
}
