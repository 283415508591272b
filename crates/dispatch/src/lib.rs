//! Bulk campaign dispatch engine.
//!
//! Humanization: inter-message delays drawn from a clipped Gaussian and
//! one-time contact shuffling, so bulk sends don't look mechanical.
//! Queue manager: one cooperative send loop per running campaign with
//! pause/resume/cancel control and durable per-target outcomes.
//! Scheduler: periodic poller that starts campaigns whose time has come.

pub mod humanization;
pub mod queue;
pub mod scheduler;

pub use queue::QueueManager;
pub use scheduler::CampaignScheduler;
