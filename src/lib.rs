//! Trialwatch: fraud/anomaly risk scoring for clinical-trial hospitals
//!
//! Trialwatch analyzes immutable ("locked") patient visit records and scores
//! each participating hospital along four independent dimensions: statistical
//! outlier-ness of field distributions, behavioral irregularities in visit and
//! submission timing, cross-patient record templating, and cross-hospital peer
//! deviation. The four scores are fused into a single 0-100 risk score and a
//! LOW/MEDIUM/HIGH risk level, persisted together with human-readable anomaly
//! explanations.

pub mod api;
pub mod config;
pub mod detectors;
pub mod error;
pub mod features;
pub mod runner;
pub mod stats;
pub mod store;
