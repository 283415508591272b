//! Campaign persistence layer.
//!
//! The dispatch engine consults persistence through the narrow
//! [`CampaignStore`] trait; everything it needs to survive a restart
//! (campaign state, counters, per-target outcomes, send order) goes through
//! here, and the scheduler/manual-start race is settled by the atomic
//! [`CampaignStore::transition`] compare-and-swap rather than in-process
//! locking.

pub mod memory;
pub mod store;

pub use memory::MemoryStore;
pub use store::CampaignStore;
