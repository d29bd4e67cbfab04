//! In-memory trial store.
//!
//! Backs the trigger endpoints in demo deployments and the runner tests.
//! All state sits behind a single `RwLock`; the trait methods take `&self`
//! so the store can be shared as `Arc<dyn TrialStore>`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::RwLock;

use chrono::{NaiveDateTime, Utc};
use serde::Deserialize;

use crate::error::StoreError;
use crate::store::{
    HospitalScoreRecord, NewAiRun, RunStatus, SignalRecord, TrialStore, VisitRow,
};

/// One run record as held by the store.
#[derive(Debug, Clone)]
pub struct AiRunRow {
    pub id: i64,
    pub trial_id: String,
    pub ai_version: String,
    pub trigger_type: String,
    pub triggered_by: Option<String>,
    pub notes: Option<String>,
    pub status: RunStatus,
    pub started_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

/// A persisted anomaly signal row plus its owning keys.
#[derive(Debug, Clone)]
pub struct StoredSignal {
    pub ai_run_id: i64,
    pub trial_id: String,
    pub hospital_id: String,
    pub record: SignalRecord,
}

#[derive(Default)]
struct Inner {
    active_trials: Vec<String>,
    visits: HashMap<String, Vec<VisitRow>>,
    runs: HashMap<i64, AiRunRow>,
    next_run_id: i64,
    scores: Vec<HospitalScoreRecord>,
    signals: Vec<StoredSignal>,
}

pub struct MemoryStore {
    inner: RwLock<Inner>,
}

/// JSON seed fixture: active trial ids plus visit rows keyed by trial.
#[derive(Debug, Deserialize)]
struct SeedFixture {
    active_trials: Vec<String>,
    visits: Vec<SeedVisit>,
}

#[derive(Debug, Deserialize)]
struct SeedVisit {
    trial_id: String,
    #[serde(flatten)]
    row: VisitRow,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: RwLock::new(Inner {
                next_run_id: 1,
                ..Inner::default()
            }),
        }
    }

    /// Loads a JSON fixture of active trials and locked visit rows.
    pub fn from_seed_file(path: &Path) -> Result<Self, StoreError> {
        let content =
            fs::read_to_string(path).map_err(|e| StoreError::Seed(e.to_string()))?;
        let fixture: SeedFixture =
            serde_json::from_str(&content).map_err(|e| StoreError::Seed(e.to_string()))?;

        let store = MemoryStore::new();
        {
            let mut inner = store.inner.write().unwrap();
            inner.active_trials = fixture.active_trials;
            for seed in fixture.visits {
                inner.visits.entry(seed.trial_id).or_default().push(seed.row);
            }
        }
        Ok(store)
    }

    pub fn add_active_trial(&self, trial_id: &str) {
        let mut inner = self.inner.write().unwrap();
        if !inner.active_trials.iter().any(|t| t == trial_id) {
            inner.active_trials.push(trial_id.to_string());
        }
    }

    pub fn push_visit(&self, trial_id: &str, row: VisitRow) {
        let mut inner = self.inner.write().unwrap();
        inner.visits.entry(trial_id.to_string()).or_default().push(row);
    }

    pub fn run(&self, run_id: i64) -> Option<AiRunRow> {
        self.inner.read().unwrap().runs.get(&run_id).cloned()
    }

    pub fn runs(&self) -> Vec<AiRunRow> {
        let mut runs: Vec<AiRunRow> = self.inner.read().unwrap().runs.values().cloned().collect();
        runs.sort_by_key(|r| r.id);
        runs
    }

    pub fn scores_for_run(&self, run_id: i64) -> Vec<HospitalScoreRecord> {
        self.inner
            .read()
            .unwrap()
            .scores
            .iter()
            .filter(|s| s.ai_run_id == run_id)
            .cloned()
            .collect()
    }

    pub fn signals_for_run(&self, run_id: i64) -> Vec<StoredSignal> {
        self.inner
            .read()
            .unwrap()
            .signals
            .iter()
            .filter(|s| s.ai_run_id == run_id)
            .cloned()
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

impl TrialStore for MemoryStore {
    fn fetch_active_trials(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.inner.read().unwrap().active_trials.clone())
    }

    fn fetch_locked_visits(&self, trial_id: &str) -> Result<Vec<VisitRow>, StoreError> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .visits
            .get(trial_id)
            .cloned()
            .unwrap_or_default())
    }

    fn create_ai_run(&self, run: NewAiRun) -> Result<i64, StoreError> {
        let mut inner = self.inner.write().unwrap();
        let id = inner.next_run_id;
        inner.next_run_id += 1;
        inner.runs.insert(
            id,
            AiRunRow {
                id,
                trial_id: run.trial_id,
                ai_version: run.ai_version,
                trigger_type: run.trigger_type,
                triggered_by: run.triggered_by,
                notes: run.notes,
                status: RunStatus::Running,
                started_at: Utc::now().naive_utc(),
                completed_at: None,
            },
        );
        Ok(id)
    }

    fn finalize_ai_run(&self, run_id: i64, status: RunStatus) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        let run = inner
            .runs
            .get_mut(&run_id)
            .ok_or(StoreError::RunNotFound(run_id))?;
        if run.status.is_terminal() {
            return Err(StoreError::RunAlreadyFinalized(run_id));
        }
        run.status = status;
        run.completed_at = Some(Utc::now().naive_utc());
        Ok(())
    }

    fn save_hospital_scores(&self, record: HospitalScoreRecord) -> Result<(), StoreError> {
        self.inner.write().unwrap().scores.push(record);
        Ok(())
    }

    fn save_anomaly_signals(
        &self,
        ai_run_id: i64,
        trial_id: &str,
        hospital_id: &str,
        signals: &[SignalRecord],
    ) -> Result<(), StoreError> {
        if signals.is_empty() {
            return Ok(());
        }
        let mut inner = self.inner.write().unwrap();
        for record in signals {
            inner.signals.push(StoredSignal {
                ai_run_id,
                trial_id: trial_id.to_string(),
                hospital_id: hospital_id.to_string(),
                record: record.clone(),
            });
        }
        Ok(())
    }
}
