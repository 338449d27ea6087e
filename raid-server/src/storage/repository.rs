//! Repository traits - abstraction layer for raid persistence
//!
//! The raid lifecycle only talks to these traits, so the PostgreSQL store
//! and the in-memory store are interchangeable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;

/// Generic result type for repository operations
pub type RepoResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ============================================================================
// Row Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRow {
    pub id: i64,
    pub dungeon_id: Option<String>,
    pub name: String,
}

/// A team member's character, with up to five equipped skill ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterRow {
    pub ch_id: i64,
    pub ch_name: String,
    pub hp: i32,
    pub atk: i32,
    pub def: i32,
    pub skills: Vec<String>,
}

/// One line of a dungeon's reward table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardRow {
    pub dungeon_id: String,
    /// `ITEM` or `KEYWORD`
    pub kind: String,
    pub reward_id: String,
    pub count: i32,
    /// Drop chance in percent
    pub chance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRow {
    pub it_id: String,
    pub it_name: String,
    pub it_img: Option<String>,
}

/// Inventory slot holding a raid permit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitSlot {
    pub slot_id: i64,
    pub stack: i32,
}

// ============================================================================
// Repositories
// ============================================================================

/// Teams, rosters and battle bookkeeping
#[async_trait]
pub trait TeamRepo: Send + Sync {
    async fn get_team(&self, team_id: i64) -> RepoResult<Option<TeamRow>>;
    async fn get_members(&self, team_id: i64) -> RepoResult<Vec<CharacterRow>>;
    async fn record_result(&self, team_id: i64, result: &str, reason: &str) -> RepoResult<()>;
    async fn mark_team_done(&self, team_id: i64) -> RepoResult<()>;
}

/// Reward tables, permits and grants
#[async_trait]
pub trait RewardRepo: Send + Sync {
    async fn reward_table(&self, dungeon_id: &str) -> RepoResult<Vec<RewardRow>>;
    /// First permit slot with a positive stack
    async fn find_permit(&self, ch_id: i64) -> RepoResult<Option<PermitSlot>>;
    async fn get_item(&self, it_id: &str) -> RepoResult<Option<ItemRow>>;
    /// Stack into the existing inventory row or insert a new one
    async fn grant_item(&self, ch_id: i64, ch_name: &str, item: &ItemRow, count: i32) -> RepoResult<()>;
    /// Insert-ignore
    async fn grant_keyword(&self, ch_id: i64, keyword: &str) -> RepoResult<()>;
    async fn consume_permit(&self, slot: PermitSlot) -> RepoResult<()>;
}

/// Unified access to every repository
pub struct StorageManager {
    pub teams: Box<dyn TeamRepo>,
    pub rewards: Box<dyn RewardRepo>,
}
