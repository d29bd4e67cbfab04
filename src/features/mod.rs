//! Feature extraction over locked visit rows.
//!
//! Each extractor runs independently over the same batch snapshot and
//! produces per-hospital feature signatures for its detector. Keyed maps are
//! `BTreeMap` throughout so repeated runs over the same input yield
//! bit-identical scores and signal ordering.

pub mod behavioral;
pub mod cross_hospital;
pub mod cross_patient;
pub mod statistical;
