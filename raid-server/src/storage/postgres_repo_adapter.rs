//! PostgreSQL Repository Adapters
//!
//! Implements the Repository traits from `repository.rs` using PostgresStore
//! as the backend. Converts between SQL row types and repository rows.

use async_trait::async_trait;
use std::sync::Arc;

use super::postgres::{CharacterSqlRow, ItemSqlRow, PostgresStore, RewardSqlRow};
use super::repository::*;

/// Team status written once a raid has ended
pub const TEAM_DONE: &str = "DONE";

// ============================================================================
// Type Conversion Helpers
// ============================================================================

fn row_to_character(row: CharacterSqlRow) -> CharacterRow {
    let skills = row.skill_ids();
    CharacterRow {
        ch_id: row.ch_id,
        ch_name: row.ch_name,
        hp: row.hp,
        atk: row.atk,
        def: row.def,
        skills,
    }
}

fn row_to_reward(row: RewardSqlRow) -> RewardRow {
    RewardRow {
        dungeon_id: row.dungeon_id,
        kind: row.kind,
        reward_id: row.reward_id,
        count: row.count,
        chance: row.chance,
    }
}

fn row_to_item(row: ItemSqlRow) -> ItemRow {
    ItemRow {
        it_id: row.it_id,
        it_name: row.it_name,
        it_img: row.it_img,
    }
}

// ============================================================================
// Team Repository
// ============================================================================

pub struct PgTeamRepo {
    pg: Arc<PostgresStore>,
}

impl PgTeamRepo {
    pub fn new(pg: Arc<PostgresStore>) -> Self {
        Self { pg }
    }
}

#[async_trait]
impl TeamRepo for PgTeamRepo {
    async fn get_team(&self, team_id: i64) -> RepoResult<Option<TeamRow>> {
        let row = self.pg.get_team(team_id).await?;
        Ok(row.map(|r| TeamRow {
            id: r.id,
            dungeon_id: r.dungeon_id,
            name: r.name,
        }))
    }

    async fn get_members(&self, team_id: i64) -> RepoResult<Vec<CharacterRow>> {
        let rows = self.pg.get_team_members(team_id).await?;
        Ok(rows.into_iter().map(row_to_character).collect())
    }

    async fn record_result(&self, team_id: i64, result: &str, reason: &str) -> RepoResult<()> {
        self.pg.insert_result(team_id, result, reason).await?;
        Ok(())
    }

    async fn mark_team_done(&self, team_id: i64) -> RepoResult<()> {
        self.pg.set_team_status(team_id, TEAM_DONE).await?;
        Ok(())
    }
}

// ============================================================================
// Reward Repository
// ============================================================================

pub struct PgRewardRepo {
    pg: Arc<PostgresStore>,
}

impl PgRewardRepo {
    pub fn new(pg: Arc<PostgresStore>) -> Self {
        Self { pg }
    }
}

#[async_trait]
impl RewardRepo for PgRewardRepo {
    async fn reward_table(&self, dungeon_id: &str) -> RepoResult<Vec<RewardRow>> {
        let rows = self.pg.get_reward_table(dungeon_id).await?;
        Ok(rows.into_iter().map(row_to_reward).collect())
    }

    async fn find_permit(&self, ch_id: i64) -> RepoResult<Option<PermitSlot>> {
        let slot = self.pg.find_permit_slot(ch_id).await?;
        Ok(slot.map(|(slot_id, stack)| PermitSlot { slot_id, stack }))
    }

    async fn get_item(&self, it_id: &str) -> RepoResult<Option<ItemRow>> {
        Ok(self.pg.get_item(it_id).await?.map(row_to_item))
    }

    async fn grant_item(&self, ch_id: i64, ch_name: &str, item: &ItemRow, count: i32) -> RepoResult<()> {
        self.pg
            .add_item_stack(ch_id, ch_name, &item.it_id, &item.it_name, count)
            .await?;
        Ok(())
    }

    async fn grant_keyword(&self, ch_id: i64, keyword: &str) -> RepoResult<()> {
        self.pg.add_keyword(ch_id, keyword).await?;
        Ok(())
    }

    async fn consume_permit(&self, slot: PermitSlot) -> RepoResult<()> {
        self.pg.use_permit(slot.slot_id, slot.stack).await?;
        Ok(())
    }
}
