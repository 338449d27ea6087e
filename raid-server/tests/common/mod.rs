//! Shared fixtures for the raid-server integration tests
//!
//! A small data directory with predictable bosses plus an in-memory store
//! seeded with one team per scenario.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use raid_core::config::ServerConfig;
use raid_core::data::DataStore;
use raid_core::events::Outgoing;
use raid_server::channels::Subscription;
use raid_server::storage::repository::{CharacterRow, ItemRow, RewardRow, TeamRow};
use raid_server::tick::tick_all;
use raid_server::{MemoryStore, RaidService};
use tempfile::TempDir;
use tokio::time::Instant;

pub const ARENA_TEAM: i64 = 1;
pub const GAUNTLET_TEAM: i64 = 2;
pub const LOST_TEAM: i64 = 3;
pub const SOLO_TEAM: i64 = 4;

pub const ALICE: i64 = 101;
pub const BORIS: i64 = 102;
pub const CLEO: i64 = 103;
pub const DUNCAN: i64 = 104;

pub const PERMIT: &str = "permit";
pub const GEM: &str = "gem";
pub const DUST: &str = "dust";

/// Sentinel: one radius-0 stomp on the nearest player every second
const SENTINEL: &str = r#"{
  "id": "sentinel",
  "name": "Sentinel",
  "hp": 50,
  "phases": [
    { "name": "watch", "rangeHpPct": [0, 100], "randomEverySec": 1,
      "randomActions": [
        { "type": "attackCircleTarget", "radius": 0, "dmg": 5, "windupMs": 1000, "name": "Stomp" }
      ] }
  ]
}"#;

/// Crusher: a lethal quake every second
const CRUSHER: &str = r#"{
  "id": "crusher",
  "name": "Crusher",
  "hp": 80,
  "phases": [
    { "name": "rage", "rangeHpPct": [0, 100], "randomEverySec": 1,
      "randomActions": [
        { "type": "globalAoE", "dmg": 50, "windupMs": 500, "name": "Quake" }
      ] }
  ]
}"#;

const SKILLS: &str = r#"{
  "skills": [
    { "id": "slash", "name": "Slash", "shape": "single", "range": 1, "apCost": 2, "cooldown": 1.5, "dmg": 2 }
  ]
}"#;

fn open_map(id: &str, n: usize, boss: &str) -> String {
    let row = vec!["0"; n].join(",");
    let tiles = vec![format!("[{row}]"); n].join(",");
    format!(
        r#"{{ "id": "{id}", "name": "{id}", "n": {n}, "tiles": [{tiles}],
             "boss": [{{ "id": "{boss}", "spawn": {{ "x": 0, "y": 0 }} }}] }}"#
    )
}

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

/// Data directory with `arena`, `gauntlet` and `town` maps
pub fn create_data_dir() -> TempDir {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let root = tmp.path();
    write(root, "maps/arena.json", &open_map("arena", 8, "sentinel"));
    write(root, "maps/gauntlet.json", &open_map("gauntlet", 8, "crusher"));
    write(root, "maps/town.json", &open_map("town", 6, "sentinel"));
    write(root, "bosses/sentinel.json", SENTINEL);
    write(root, "bosses/crusher.json", CRUSHER);
    write(root, "skills/skills.json", SKILLS);
    tmp
}

fn character(ch_id: i64, name: &str, hp: i32) -> CharacterRow {
    CharacterRow {
        ch_id,
        ch_name: name.to_string(),
        hp,
        atk: 1,
        def: 0,
        skills: vec!["slash".to_string(), "unknown".to_string()],
    }
}

fn team(id: i64, dungeon: Option<&str>) -> TeamRow {
    TeamRow {
        id,
        dungeon_id: dungeon.map(str::to_string),
        name: format!("team-{id}"),
    }
}

/// Store with the standard teams, items and the arena reward table.
///
/// Alice and Boris hold permits, Cleo does not. Duncan runs solo.
pub fn create_seeded_store() -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    store.insert_character(character(ALICE, "Alice", 100));
    store.insert_character(character(BORIS, "Boris", 100));
    store.insert_character(character(CLEO, "Cleo", 100));
    store.insert_character(character(DUNCAN, "Duncan", 10));

    store.insert_team(team(ARENA_TEAM, Some("arena")), &[ALICE, BORIS, CLEO]);
    store.insert_team(team(GAUNTLET_TEAM, Some("gauntlet")), &[DUNCAN]);
    store.insert_team(team(LOST_TEAM, Some("atlantis")), &[ALICE]);
    store.insert_team(team(SOLO_TEAM, None), &[DUNCAN]);

    let item = |id: &str, name: &str| ItemRow {
        it_id: id.to_string(),
        it_name: name.to_string(),
        it_img: Some(format!("{id}.png")),
    };
    store.insert_item(item(PERMIT, "Raid Permit"), true);
    store.insert_item(item(GEM, "Arena Gem"), false);
    store.insert_item(item(DUST, "Stardust"), false);
    store.give_item(ALICE, PERMIT, 1);
    store.give_item(BORIS, PERMIT, 2);

    let reward = |kind: &str, id: &str, count: i32, chance: f64| RewardRow {
        dungeon_id: "arena".to_string(),
        kind: kind.to_string(),
        reward_id: id.to_string(),
        count,
        chance,
    };
    store.insert_reward(reward("ITEM", GEM, 2, 100.0));
    store.insert_reward(reward("ITEM", DUST, 1, 0.0));
    store.insert_reward(reward("KEYWORD", "arena-clear", 1, 100.0));

    store
}

/// Service over the fixture data with a fixed RNG seed
pub fn create_service(data_dir: &Path, store: &Arc<MemoryStore>) -> RaidService {
    let config = ServerConfig {
        data_dir: data_dir.to_path_buf(),
        rng_seed: Some(7),
        hot_reload: false,
        ..ServerConfig::default()
    };
    let data = Arc::new(DataStore::new(data_dir));
    RaidService::new(config, data, store.manager())
}

/// Let spawned tasks (termination, resolutions) run to their next await
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Advance simulated time in 100ms ticks
pub async fn run_for(service: &RaidService, millis: u64) {
    let steps = millis.div_ceil(100);
    for _ in 0..steps {
        tokio::time::advance(Duration::from_millis(100)).await;
        settle().await;
        tick_all(service, Instant::now());
        settle().await;
    }
}

/// Everything currently buffered for this subscriber
pub fn drain(sub: &mut Subscription) -> Vec<Arc<Outgoing>> {
    std::iter::from_fn(|| sub.try_recv()).collect()
}

pub fn names(events: &[Arc<Outgoing>]) -> Vec<&'static str> {
    events.iter().map(|o| o.event.name()).collect()
}
