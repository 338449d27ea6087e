//! Raid creation and termination.
//!
//! Creation reads the team from storage, loads the map and boss data and
//! registers a started raid. Termination runs once per raid, after the
//! simulation has flipped it to `over`: persist the result, roll rewards,
//! cache them on the raid and announce `raid:over`.

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use tokio::time::Instant;
use tracing::{error, info, warn};

use raid_core::boss::{BossCatalog, BossCategory};
use raid_core::constants::{
    DEFAULT_BOSS_HP, DEFAULT_BOSS_ID, DEFAULT_MAP, FALLBACK_SPAWN, SPAWN_ATTEMPTS,
};
use raid_core::grid::{BossSpawn, MapDefinition, TilePos};
use raid_core::raid::{Boss, Player, RaidOutcome, RaidState, RewardsRecord};
use raid_core::skills::SkillBook;

use crate::registry::{Claim, RaidHandle};
use crate::rewards::{self, Participant};
use crate::service::RaidService;
use crate::storage::repository::CharacterRow;

#[derive(Debug, thiserror::Error)]
pub enum RaidError {
    #[error("team {0} not found")]
    TeamNotFound(i64),
    #[error("map {0} not found")]
    MapMissing(String),
    #[error("raid {0} not found")]
    RaidNotFound(String),
    #[error("repository error: {0}")]
    Repository(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub fn raid_id_for(team_id: i64) -> String {
    format!("battle:{team_id}")
}

fn load_map(service: &RaidService, dungeon_id: Option<&str>) -> Result<Arc<MapDefinition>, RaidError> {
    let wanted = dungeon_id
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_MAP);
    if let Some(map) = service.data.map(wanted) {
        return Ok(map);
    }
    if wanted != DEFAULT_MAP {
        warn!(map = wanted, "Map missing, falling back to {}", DEFAULT_MAP);
        if let Some(map) = service.data.map(DEFAULT_MAP) {
            return Ok(map);
        }
    }
    Err(RaidError::MapMissing(wanted.to_string()))
}

fn default_boss_spawn() -> BossSpawn {
    BossSpawn {
        id: DEFAULT_BOSS_ID.to_string(),
        spawn: Some(TilePos::new(1, 1)),
        hp: Some(DEFAULT_BOSS_HP),
        category: None,
        size: None,
        name: None,
        statuses: Vec::new(),
    }
}

fn spawn_bosses(raid: &mut RaidState, catalog: &dyn BossCatalog) {
    let spawns = if raid.map.boss.is_empty() {
        vec![default_boss_spawn()]
    } else {
        raid.map.boss.clone()
    };
    for spawn in &spawns {
        let uid = raid.generate_uid();
        let definition = catalog.boss_definition(&spawn.id);
        raid.add_boss(Boss::spawn(uid, spawn, definition, BossCategory::Main));
    }
}

/// Random free passable tile, or the fallback cell
fn spawn_tile(raid: &mut RaidState) -> TilePos {
    let map = Arc::clone(&raid.map);
    if map.n > 0 {
        for _ in 0..SPAWN_ATTEMPTS {
            let x = raid.rng().gen_range(0..map.n);
            let y = raid.rng().gen_range(0..map.n);
            let tile = TilePos::new(x, y);
            if map.passable(x, y) && !raid.is_occupied(tile) {
                return tile;
            }
        }
    }
    TilePos::new(FALLBACK_SPAWN.0, FALLBACK_SPAWN.1)
}

fn spawn_players(raid: &mut RaidState, members: Vec<CharacterRow>, skills: &SkillBook) {
    for member in members {
        let pos = spawn_tile(raid);
        let loadout = skills.loadout(member.skills.iter().map(String::as_str));
        raid.add_player(
            Player::new(member.ch_id, member.ch_name, pos, member.hp)
                .with_stats(member.atk, member.def)
                .with_skills(loadout),
        );
    }
}

/// Build, register and start the raid for `team_id`.
///
/// A live raid for the same team is reused instead of being rebuilt.
pub async fn create_raid(service: &RaidService, team_id: i64) -> Result<String, RaidError> {
    let raid_id = raid_id_for(team_id);
    if let Some(existing) = service.registry.get(&raid_id) {
        if !existing.lock().is_over() {
            return Ok(raid_id);
        }
    }

    let team = service
        .storage
        .teams
        .get_team(team_id)
        .await
        .map_err(RaidError::Repository)?
        .ok_or(RaidError::TeamNotFound(team_id))?;
    let members = service
        .storage
        .teams
        .get_members(team_id)
        .await
        .map_err(RaidError::Repository)?;

    let map = load_map(service, team.dungeon_id.as_deref())?;
    let skills = service.data.skills();

    let mut raid = RaidState::new(&raid_id, map, service.config.rng_seed).with_team(team.id, team.name);
    spawn_bosses(&mut raid, service.data.as_ref());
    spawn_players(&mut raid, members, &skills);
    if raid.players.is_empty() {
        warn!(raid_id = %raid_id, "Starting raid with an empty roster");
    }

    match service.registry.claim(RaidHandle::new(raid)) {
        Claim::Existing(_) => Ok(raid_id),
        Claim::Inserted(handle) => {
            let mut raid = handle.lock();
            raid.activate(Instant::now().into_std());
            service.hub.publish(&handle.id, raid.drain_events());
            info!(
                raid_id = %raid.id,
                dungeon = raid.dungeon_id(),
                players = raid.players.len(),
                bosses = raid.bosses.len(),
                "Raid created"
            );
            Ok(raid_id)
        }
    }
}

/// End a raid outside the tick (forced finish, everyone left).
///
/// Returns `false` if the raid had already ended.
pub fn finish_raid(
    service: &RaidService,
    handle: &Arc<RaidHandle>,
    outcome: RaidOutcome,
    reason: &str,
) -> bool {
    let finished = {
        let mut raid = handle.lock();
        let finished = raid.finish(outcome, reason);
        service.hub.publish(&handle.id, raid.drain_events());
        finished
    };
    if finished {
        info!(raid_id = %handle.id, result = outcome.as_str(), reason, "Raid finished");
        spawn_termination(service, handle);
    }
    finished
}

pub fn spawn_termination(service: &RaidService, handle: &Arc<RaidHandle>) {
    tokio::spawn(terminate(service.clone(), Arc::clone(handle)));
}

/// Persist, reward and announce an ended raid
pub async fn terminate(service: RaidService, handle: Arc<RaidHandle>) {
    let (outcome, reason, dungeon, participants, seed) = {
        let mut raid = handle.lock();
        let Some(outcome) = raid.outcome() else {
            return;
        };
        if raid.rewards().is_some() {
            return;
        }
        let participants: Vec<Participant> = raid
            .players
            .values()
            .map(|p| Participant {
                ch_id: p.id,
                name: p.name.clone(),
            })
            .collect();
        let seed: u64 = raid.rng().gen();
        (
            outcome,
            raid.reason().unwrap_or("normal").to_string(),
            raid.dungeon_id().to_string(),
            participants,
            seed,
        )
    };

    let teams = &service.storage.teams;
    if let Err(e) = teams.record_result(handle.team_id, outcome.as_str(), &reason).await {
        error!(raid_id = %handle.id, error = %e, "Failed to record battle result");
    }
    if let Err(e) = teams.mark_team_done(handle.team_id).await {
        error!(raid_id = %handle.id, error = %e, "Failed to mark team done");
    }

    let grants = if outcome == RaidOutcome::Victory {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        rewards::grant_rewards(service.storage.rewards.as_ref(), &dungeon, &participants, &mut rng).await
    } else {
        Vec::new()
    };
    let granted = grants.len();
    let record = RewardsRecord::new(chrono::Utc::now().timestamp_millis(), dungeon, grants);

    {
        let mut raid = handle.lock();
        raid.record_rewards(record);
        service.hub.publish(&handle.id, raid.drain_events());
    }
    handle.mark_ended(Instant::now());
    service.metrics.record_raid_finished();

    info!(
        raid_id = %handle.id,
        result = outcome.as_str(),
        reason = %reason,
        rewards = granted,
        "Raid terminated"
    );
}
