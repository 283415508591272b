//! Post-hoc reporting over campaign outcomes.
//!
//! Reports are derived, never the source of truth: they are recomputed from
//! the campaign's targets at generation time and are therefore always
//! regenerable.

pub mod generator;

pub use generator::{export_csv, CampaignReport, ComparisonReport, ReportGenerator, ReportRow};
