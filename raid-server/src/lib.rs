//! Raid Server Library
//!
//! The asynchronous runtime around `raid-core`:
//! - Process-wide raid registry with per-raid locking
//! - Broadcast hub for raid-wide and per-player events
//! - Fixed-rate tick driver and windup tasks for boss actions
//! - Raid creation, termination and victory rewards
//! - Storage behind repository traits (PostgreSQL or in-memory)
//! - HTTP commands, WebSocket event stream and metrics

pub mod api; // HTTP/JSON endpoints + WebSocket events
pub mod channels; // Per-raid broadcast hub
pub mod executor; // Boss action windup tasks
pub mod lifecycle; // Raid creation and termination
pub mod metrics; // Server metrics (Prometheus + JSON export)
pub mod registry; // Resident raids
pub mod rewards; // Victory reward rolls and grants
pub mod service; // Command facade and join protocol
pub mod storage; // Repository traits, PostgreSQL and memory backends
pub mod tick; // Fixed-rate tick driver

// Re-export commonly used types
pub use lifecycle::RaidError;
pub use service::{JoinReply, RaidService};
pub use storage::memory::MemoryStore;
pub use storage::postgres::PostgresStore;
