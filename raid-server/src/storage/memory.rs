//! In-memory storage backend
//!
//! Used when no `DATABASE_URL` is configured and by the integration tests.
//! Mirrors the PostgreSQL semantics closely enough for the raid lifecycle:
//! stacking inventory, insert-ignore keywords, permit consumption.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::repository::*;

#[derive(Debug, Clone, PartialEq)]
pub struct InventoryEntry {
    pub slot_id: i64,
    pub ch_id: i64,
    pub it_id: String,
    pub stack: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultEntry {
    pub team_id: i64,
    pub result: String,
    pub reason: String,
}

#[derive(Default)]
struct Tables {
    teams: BTreeMap<i64, (TeamRow, String)>,
    members: BTreeMap<i64, Vec<i64>>,
    characters: BTreeMap<i64, CharacterRow>,
    results: Vec<ResultEntry>,
    rewards: Vec<RewardRow>,
    items: BTreeMap<String, ItemRow>,
    permit_items: HashSet<String>,
    inventory: Vec<InventoryEntry>,
    keywords: BTreeSet<(i64, String)>,
    next_slot: i64,
    failing_characters: HashSet<i64>,
}

/// Shared in-memory tables
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // ========================================================================
    // Seeding
    // ========================================================================

    pub fn insert_character(&self, character: CharacterRow) {
        self.tables.write().characters.insert(character.ch_id, character);
    }

    pub fn insert_team(&self, team: TeamRow, members: &[i64]) {
        let mut t = self.tables.write();
        t.members.insert(team.id, members.to_vec());
        t.teams.insert(team.id, (team, "READY".to_string()));
    }

    pub fn insert_reward(&self, reward: RewardRow) {
        self.tables.write().rewards.push(reward);
    }

    pub fn insert_item(&self, item: ItemRow, is_permit: bool) {
        let mut t = self.tables.write();
        if is_permit {
            t.permit_items.insert(item.it_id.clone());
        }
        t.items.insert(item.it_id.clone(), item);
    }

    /// Put `stack` units of an item in a character's inventory
    pub fn give_item(&self, ch_id: i64, it_id: &str, stack: i32) -> i64 {
        let mut t = self.tables.write();
        t.next_slot += 1;
        let slot_id = t.next_slot;
        t.inventory.push(InventoryEntry {
            slot_id,
            ch_id,
            it_id: it_id.to_string(),
            stack,
        });
        slot_id
    }

    /// Make every grant to this character fail
    pub fn fail_grants_for(&self, ch_id: i64) {
        self.tables.write().failing_characters.insert(ch_id);
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn results(&self) -> Vec<ResultEntry> {
        self.tables.read().results.clone()
    }

    pub fn team_status(&self, team_id: i64) -> Option<String> {
        self.tables.read().teams.get(&team_id).map(|(_, s)| s.clone())
    }

    /// Total stack of an item across a character's rows
    pub fn item_count(&self, ch_id: i64, it_id: &str) -> i32 {
        self.tables
            .read()
            .inventory
            .iter()
            .filter(|e| e.ch_id == ch_id && e.it_id == it_id)
            .map(|e| e.stack)
            .sum()
    }

    pub fn has_keyword(&self, ch_id: i64, keyword: &str) -> bool {
        self.tables
            .read()
            .keywords
            .contains(&(ch_id, keyword.to_string()))
    }

    /// Repositories backed by this store
    pub fn manager(self: &Arc<Self>) -> StorageManager {
        StorageManager {
            teams: Box::new(MemoryRepo(Arc::clone(self))),
            rewards: Box::new(MemoryRepo(Arc::clone(self))),
        }
    }
}

/// Repository view over a [`MemoryStore`]
pub struct MemoryRepo(Arc<MemoryStore>);

#[async_trait]
impl TeamRepo for MemoryRepo {
    async fn get_team(&self, team_id: i64) -> RepoResult<Option<TeamRow>> {
        Ok(self.0.tables.read().teams.get(&team_id).map(|(t, _)| t.clone()))
    }

    async fn get_members(&self, team_id: i64) -> RepoResult<Vec<CharacterRow>> {
        let t = self.0.tables.read();
        let ids = t.members.get(&team_id).cloned().unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| t.characters.get(id).cloned())
            .collect())
    }

    async fn record_result(&self, team_id: i64, result: &str, reason: &str) -> RepoResult<()> {
        self.0.tables.write().results.push(ResultEntry {
            team_id,
            result: result.to_string(),
            reason: reason.chars().take(255).collect(),
        });
        Ok(())
    }

    async fn mark_team_done(&self, team_id: i64) -> RepoResult<()> {
        let mut t = self.0.tables.write();
        match t.teams.get_mut(&team_id) {
            Some((_, status)) => {
                *status = "DONE".to_string();
                Ok(())
            }
            None => Err(format!("team {team_id} not found").into()),
        }
    }
}

#[async_trait]
impl RewardRepo for MemoryRepo {
    async fn reward_table(&self, dungeon_id: &str) -> RepoResult<Vec<RewardRow>> {
        Ok(self
            .0
            .tables
            .read()
            .rewards
            .iter()
            .filter(|r| r.dungeon_id == dungeon_id)
            .cloned()
            .collect())
    }

    async fn find_permit(&self, ch_id: i64) -> RepoResult<Option<PermitSlot>> {
        let t = self.0.tables.read();
        if !t.characters.contains_key(&ch_id) {
            return Err(format!("character {ch_id} not found").into());
        }
        Ok(t.inventory
            .iter()
            .find(|e| e.ch_id == ch_id && e.stack >= 1 && t.permit_items.contains(&e.it_id))
            .map(|e| PermitSlot {
                slot_id: e.slot_id,
                stack: e.stack,
            }))
    }

    async fn get_item(&self, it_id: &str) -> RepoResult<Option<ItemRow>> {
        Ok(self.0.tables.read().items.get(it_id).cloned())
    }

    async fn grant_item(&self, ch_id: i64, _ch_name: &str, item: &ItemRow, count: i32) -> RepoResult<()> {
        let mut t = self.0.tables.write();
        if t.failing_characters.contains(&ch_id) {
            return Err(format!("inventory write refused for {ch_id}").into());
        }
        if let Some(entry) = t
            .inventory
            .iter_mut()
            .find(|e| e.ch_id == ch_id && e.it_id == item.it_id)
        {
            entry.stack += count;
            return Ok(());
        }
        t.next_slot += 1;
        let slot_id = t.next_slot;
        t.inventory.push(InventoryEntry {
            slot_id,
            ch_id,
            it_id: item.it_id.clone(),
            stack: count,
        });
        Ok(())
    }

    async fn grant_keyword(&self, ch_id: i64, keyword: &str) -> RepoResult<()> {
        let mut t = self.0.tables.write();
        if t.failing_characters.contains(&ch_id) {
            return Err(format!("keyword write refused for {ch_id}").into());
        }
        t.keywords.insert((ch_id, keyword.to_string()));
        Ok(())
    }

    async fn consume_permit(&self, slot: PermitSlot) -> RepoResult<()> {
        let mut t = self.0.tables.write();
        if slot.stack > 1 {
            if let Some(entry) = t.inventory.iter_mut().find(|e| e.slot_id == slot.slot_id) {
                entry.stack -= 1;
            }
        } else {
            t.inventory.retain(|e| e.slot_id != slot.slot_id);
        }
        Ok(())
    }
}
