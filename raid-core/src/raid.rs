//! Raid state store: the authoritative world of one encounter.
//!
//! A [`RaidState`] owns its map, players, boss instances, tile overrides,
//! cooldown table and RNG. Simulation code mutates it and queues events in
//! its outbox; the server drains the outbox after each atomic operation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::boss::{BossCategory, BossDefinition};
use crate::constants::{FALLBACK_BOSS_HP, MAX_AP};
use crate::events::{
    Audience, BossView, HazardEffect, Outgoing, OverrideView, PlayerView, RaidEvent,
    StateSnapshot,
};
use crate::grid::{BossSpawn, Footprint, MapDefinition, TilePos};
use crate::skills::SkillDefinition;
use crate::status::StatusEffects;

pub type PlayerId = i64;

/// How a raid ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaidOutcome {
    Victory,
    Defeat,
    Aborted,
}

impl RaidOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RaidOutcome::Victory => "victory",
            RaidOutcome::Defeat => "defeat",
            RaidOutcome::Aborted => "aborted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "victory" => Some(RaidOutcome::Victory),
            "defeat" => Some(RaidOutcome::Defeat),
            "aborted" => Some(RaidOutcome::Aborted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RewardKind {
    Item,
    Keyword,
}

/// One reward handed to one player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardGrant {
    pub player_id: PlayerId,
    #[serde(rename = "type")]
    pub kind: RewardKind,
    pub reward_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
    pub count: i32,
}

/// Rewards cached on an ended raid for late joiners
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardsRecord {
    /// Unix time in milliseconds
    pub at: i64,
    pub dungeon_id: String,
    pub by_player: BTreeMap<PlayerId, Vec<RewardGrant>>,
    pub list: Vec<RewardGrant>,
}

impl RewardsRecord {
    pub fn new(at: i64, dungeon_id: impl Into<String>, list: Vec<RewardGrant>) -> Self {
        let mut by_player: BTreeMap<PlayerId, Vec<RewardGrant>> = BTreeMap::new();
        for grant in &list {
            by_player.entry(grant.player_id).or_default().push(grant.clone());
        }
        Self {
            at,
            dungeon_id: dungeon_id.into(),
            by_player,
            list,
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    #[serde(flatten)]
    pub pos: TilePos,
    pub hp: i32,
    pub max_hp: i32,
    pub ap: f64,
    pub atk: i32,
    pub def: i32,
    pub dead: bool,
    pub statuses: StatusEffects,
    pub skills: Vec<SkillDefinition>,
}

impl Player {
    /// A fresh participant at half AP
    pub fn new(id: PlayerId, name: impl Into<String>, pos: TilePos, hp: i32) -> Self {
        let hp = hp.max(1);
        Self {
            id,
            name: name.into(),
            pos,
            hp,
            max_hp: hp,
            ap: (MAX_AP / 2.0).floor(),
            atk: 0,
            def: 0,
            dead: false,
            statuses: StatusEffects::default(),
            skills: Vec::new(),
        }
    }

    pub fn with_stats(mut self, atk: i32, def: i32) -> Self {
        self.atk = atk.max(0);
        self.def = def.max(0);
        self
    }

    pub fn with_skills(mut self, skills: Vec<SkillDefinition>) -> Self {
        self.skills = skills;
        self
    }

    pub fn is_alive(&self) -> bool {
        !self.dead && self.hp > 0
    }

    pub fn skill(&self, id: &str) -> Option<&SkillDefinition> {
        self.skills.iter().find(|s| s.id == id)
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            name: self.name.clone(),
            x: self.pos.x,
            y: self.pos.y,
            hp: self.hp,
            max_hp: self.max_hp,
            ap: round2(self.ap),
            dead: self.dead,
            statuses: self.statuses.iter().cloned().collect(),
        }
    }
}

/// One boss instance; `uid` is unique per raid, `species` may repeat
#[derive(Debug, Clone)]
pub struct Boss {
    pub uid: String,
    pub species: String,
    pub name: String,
    pub category: BossCategory,
    pub pos: TilePos,
    pub size: Footprint,
    pub hp: i32,
    pub max_hp: i32,
    pub def: i32,
    pub definition: Arc<BossDefinition>,
    pub statuses: StatusEffects,

    // AI bookkeeping
    pub phase: Option<String>,
    pub clock: f64,
    pub once_done: HashSet<usize>,
    pub phases_entered: HashSet<String>,
    pub random_timer: f64,
    pub last_exec_sec: HashMap<String, i64>,
    pub death_announced: bool,
}

impl Boss {
    /// Instantiate from a spawn declaration; spawn fields win over the definition
    pub fn spawn(
        uid: String,
        spawn: &BossSpawn,
        definition: Arc<BossDefinition>,
        default_category: BossCategory,
    ) -> Self {
        let hp = spawn
            .hp
            .or(definition.hp)
            .filter(|hp| *hp > 0)
            .unwrap_or(FALLBACK_BOSS_HP);
        let mut statuses = StatusEffects::default();
        for status in &spawn.statuses {
            statuses.add(status.clone());
        }

        Self {
            uid,
            species: spawn.id.clone(),
            name: spawn
                .name
                .clone()
                .or_else(|| definition.name.clone())
                .unwrap_or_else(|| spawn.id.clone()),
            category: spawn.category.unwrap_or(default_category),
            pos: spawn.spawn.unwrap_or(TilePos::new(1, 1)),
            size: spawn.size.or(definition.size).unwrap_or_default().normalized(),
            hp,
            max_hp: hp,
            def: definition.def.unwrap_or(0).max(0),
            definition,
            statuses,
            phase: None,
            clock: 0.0,
            once_done: HashSet::new(),
            phases_entered: HashSet::new(),
            random_timer: 0.0,
            last_exec_sec: HashMap::new(),
            death_announced: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    pub fn occupies(&self, tile: TilePos) -> bool {
        self.size.covers(self.pos, tile)
    }

    pub fn footprint(&self) -> impl Iterator<Item = TilePos> {
        self.size.cells(self.pos)
    }

    pub fn hp_pct(&self) -> f64 {
        if self.hp <= 0 {
            return 0.0;
        }
        let max = self.max_hp.max(1) as f64;
        (self.hp as f64 / max * 100.0).clamp(0.0, 100.0)
    }

    pub fn view(&self) -> BossView {
        BossView {
            uid: self.uid.clone(),
            id: self.species.clone(),
            name: self.name.clone(),
            category: self.category,
            x: self.pos.x,
            y: self.pos.y,
            hp: self.hp,
            max_hp: self.max_hp,
            phase: self.phase.clone(),
            statuses: self.statuses.iter().cloned().collect(),
            size: self.size,
        }
    }
}

/// Transient hazard bound to a map cell
#[derive(Debug, Clone, PartialEq)]
pub struct TileOverride {
    pub pos: TilePos,
    pub base: Option<i32>,
    pub effects: Vec<HazardEffect>,
}

/// Remaining cooldown seconds per player per skill
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CooldownTable {
    entries: BTreeMap<PlayerId, BTreeMap<String, f64>>,
}

impl CooldownTable {
    pub fn ensure(&mut self, player: PlayerId) {
        self.entries.entry(player).or_default();
    }

    pub fn remove(&mut self, player: PlayerId) {
        self.entries.remove(&player);
    }

    pub fn remaining(&self, player: PlayerId, skill: &str) -> f64 {
        self.entries
            .get(&player)
            .and_then(|cds| cds.get(skill))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn start(&mut self, player: PlayerId, skill: &str, secs: f64) {
        self.entries
            .entry(player)
            .or_default()
            .insert(skill.to_string(), secs.max(0.0));
    }

    /// Table for one player, rounded to two decimals
    pub fn table(&self, player: PlayerId) -> BTreeMap<String, f64> {
        self.entries
            .get(&player)
            .map(|cds| cds.iter().map(|(k, v)| (k.clone(), round2(*v))).collect())
            .unwrap_or_default()
    }

    pub fn players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.entries.keys().copied()
    }

    /// Count every entry down by `dt` seconds, flooring at zero
    pub fn decay(&mut self, dt: f64) {
        for cds in self.entries.values_mut() {
            for remain in cds.values_mut() {
                *remain = (*remain - dt).max(0.0);
            }
        }
    }
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".into();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

// ============================================================================
// Raid
// ============================================================================

pub struct RaidState {
    pub id: String,
    pub team_id: i64,
    pub team_name: String,
    pub map: Arc<MapDefinition>,
    pub players: BTreeMap<PlayerId, Player>,
    pub bosses: BTreeMap<String, Boss>,
    pub tile_overrides: BTreeMap<TilePos, TileOverride>,
    pub cooldowns: CooldownTable,
    /// Simulation time elapsed while running, in milliseconds
    pub elapsed_ms: u64,
    started: bool,
    over: bool,
    outcome: Option<RaidOutcome>,
    reason: Option<String>,
    rewards: Option<RewardsRecord>,
    last_tick: Option<Instant>,
    rng: Xoshiro256PlusPlus,
    outbox: Vec<Outgoing>,
}

impl std::fmt::Debug for RaidState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaidState")
            .field("id", &self.id)
            .field("players", &self.players.len())
            .field("bosses", &self.bosses.len())
            .field("started", &self.started)
            .field("over", &self.over)
            .finish()
    }
}

impl RaidState {
    pub fn new(id: impl Into<String>, map: Arc<MapDefinition>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        Self {
            id: id.into(),
            team_id: 0,
            team_name: String::new(),
            map,
            players: BTreeMap::new(),
            bosses: BTreeMap::new(),
            tile_overrides: BTreeMap::new(),
            cooldowns: CooldownTable::default(),
            elapsed_ms: 0,
            started: false,
            over: false,
            outcome: None,
            reason: None,
            rewards: None,
            last_tick: None,
            rng,
            outbox: Vec::new(),
        }
    }

    pub fn with_team(mut self, team_id: i64, team_name: impl Into<String>) -> Self {
        self.team_id = team_id;
        self.team_name = team_name.into();
        self
    }

    pub fn add_player(&mut self, player: Player) {
        self.cooldowns.ensure(player.id);
        self.players.insert(player.id, player);
    }

    pub fn add_boss(&mut self, boss: Boss) {
        self.bosses.insert(boss.uid.clone(), boss);
    }

    /// Remove a participant and their cooldowns
    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        self.cooldowns.remove(id);
        self.players.remove(&id)
    }

    pub fn rng(&mut self) -> &mut Xoshiro256PlusPlus {
        &mut self.rng
    }

    /// Fresh boss instance id: a random UUID, or a time-plus-noise
    /// composite when the OS generator is unavailable
    pub fn generate_uid(&mut self) -> String {
        let mut bytes = [0u8; 16];
        match getrandom::fill(&mut bytes) {
            Ok(()) => uuid::Builder::from_random_bytes(bytes)
                .into_uuid()
                .to_string(),
            Err(err) => {
                warn!(raid_id = %self.id, error = %err, "OS randomness unavailable, using fallback uid");
                let millis = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_millis() as u64)
                    .unwrap_or_default();
                let noise: u32 = self.rng.gen_range(0..36u32.pow(6));
                format!("b_{}_{}", to_base36(millis), to_base36(noise as u64))
            }
        }
    }

    /// Borrow one boss alongside the raid RNG
    pub fn boss_with_rng(&mut self, uid: &str) -> Option<(&mut Boss, &mut Xoshiro256PlusPlus)> {
        let boss = self.bosses.get_mut(uid)?;
        Some((boss, &mut self.rng))
    }

    pub fn dungeon_id(&self) -> &str {
        &self.map.id
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_over(&self) -> bool {
        self.over
    }

    /// Ticked by the driver only while started and not over
    pub fn is_running(&self) -> bool {
        self.started && !self.over
    }

    pub fn outcome(&self) -> Option<RaidOutcome> {
        self.outcome
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn rewards(&self) -> Option<&RewardsRecord> {
        self.rewards.as_ref()
    }

    /// Mark the raid started and announce it
    pub fn activate(&mut self, now: Instant) {
        if self.over {
            return;
        }
        self.started = true;
        self.last_tick = Some(now);
        self.emit(RaidEvent::BattleStarted {
            raid_id: self.id.clone(),
        });
    }

    /// Seconds since the previous tick, advancing the tick timestamp
    pub fn take_dt(&mut self, now: Instant) -> f64 {
        let dt = self
            .last_tick
            .map(|prev| now.saturating_duration_since(prev).as_secs_f64())
            .unwrap_or(0.0);
        self.last_tick = Some(now);
        dt
    }

    /// Transition to `over` exactly once, emitting the final snapshot.
    ///
    /// Returns `false` if the raid had already ended.
    pub fn finish(&mut self, outcome: RaidOutcome, reason: impl Into<String>) -> bool {
        if self.over {
            return false;
        }
        self.over = true;
        self.outcome = Some(outcome);
        self.reason = Some(reason.into());
        self.emit_state();
        true
    }

    /// Cache rewards and emit `raid:over`; only the first call has effect
    pub fn record_rewards(&mut self, record: RewardsRecord) -> bool {
        if !self.over || self.rewards.is_some() {
            return false;
        }
        let reward = record.list.clone();
        self.rewards = Some(record);
        self.started = false;
        self.emit(RaidEvent::RaidOver {
            result: self.outcome.unwrap_or(RaidOutcome::Aborted),
            reason: self.reason.clone().unwrap_or_else(|| "normal".into()),
            reward,
        });
        true
    }

    /// Victory when every boss is down, defeat when every player is dead
    pub fn check_outcome(&self) -> Option<(RaidOutcome, &'static str)> {
        if self.over {
            return None;
        }
        if !self.bosses.is_empty() && self.bosses.values().all(|b| b.hp <= 0) {
            return Some((RaidOutcome::Victory, "all-down"));
        }
        if !self.players.is_empty() && self.players.values().all(|p| !p.is_alive()) {
            return Some((RaidOutcome::Defeat, "all-dead"));
        }
        None
    }

    pub fn all_bosses_down(&self) -> bool {
        !self.bosses.is_empty() && self.bosses.values().all(|b| b.hp <= 0)
    }

    // ------------------------------------------------------------------------
    // Occupancy
    // ------------------------------------------------------------------------

    pub fn player_at(&self, tile: TilePos) -> Option<&Player> {
        self.players.values().find(|p| p.pos == tile)
    }

    pub fn boss_at(&self, tile: TilePos) -> Option<&Boss> {
        self.bosses.values().find(|b| b.occupies(tile))
    }

    /// Any player or boss footprint on the tile
    pub fn is_occupied(&self, tile: TilePos) -> bool {
        self.player_at(tile).is_some() || self.boss_at(tile).is_some()
    }

    // ------------------------------------------------------------------------
    // Tile overrides
    // ------------------------------------------------------------------------

    pub fn set_tile_override(&mut self, pos: TilePos, effects: Vec<HazardEffect>) {
        let base = self.map.tile(pos.x, pos.y);
        self.tile_overrides
            .insert(pos, TileOverride { pos, base, effects });
    }

    pub fn clear_tile_override(&mut self, pos: TilePos) -> Option<TileOverride> {
        self.tile_overrides.remove(&pos)
    }

    pub fn override_views(&self) -> Vec<OverrideView> {
        self.tile_overrides
            .values()
            .map(|o| OverrideView {
                x: o.pos.x,
                y: o.pos.y,
                base: o.base,
                effects: o.effects.clone(),
            })
            .collect()
    }

    pub fn emit_overrides(&mut self) {
        let event = RaidEvent::TileOverrides {
            raid_id: self.id.clone(),
            overrides: self.override_views(),
        };
        self.emit(event);
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    pub fn emit(&mut self, event: RaidEvent) {
        self.outbox.push(Outgoing {
            audience: Audience::Raid,
            event,
        });
    }

    pub fn emit_to(&mut self, player: PlayerId, event: RaidEvent) {
        self.outbox.push(Outgoing {
            audience: Audience::Player(player),
            event,
        });
    }

    pub fn drain_events(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            t: self.elapsed_ms,
            players: self.players.values().map(Player::view).collect(),
            bosses: self.bosses.values().map(Boss::view).collect(),
            over: self.over,
        }
    }

    pub fn emit_state(&mut self) {
        let snapshot = self.snapshot();
        self.emit(RaidEvent::State(snapshot));
    }

    /// Push a player's cooldown table to that player only
    pub fn emit_cooldowns(&mut self, player: PlayerId) {
        let cd = self.cooldowns.table(player);
        self.emit_to(player, RaidEvent::CooldownUpdate { cd });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raid() -> RaidState {
        let map = Arc::new(MapDefinition::open("arena", 8));
        let mut raid = RaidState::new("battle:1", map, Some(1));
        raid.add_player(Player::new(1, "Ari", TilePos::new(0, 0), 50));
        let spawn = BossSpawn {
            id: "golem".into(),
            spawn: Some(TilePos::new(4, 4)),
            hp: Some(10),
            category: None,
            size: Some(Footprint { w: 2, h: 2 }),
            name: None,
            statuses: Vec::new(),
        };
        raid.add_boss(Boss::spawn(
            "b1".into(),
            &spawn,
            Arc::new(BossDefinition::inert("golem")),
            BossCategory::Main,
        ));
        raid
    }

    #[test]
    fn test_new_player_starts_at_half_ap() {
        let p = Player::new(1, "Ari", TilePos::new(0, 0), 50);
        assert_eq!(p.ap, 5.0);
        assert!(p.is_alive());
    }

    #[test]
    fn test_boss_spawn_defaults() {
        let raid = raid();
        let boss = &raid.bosses["b1"];
        assert_eq!(boss.name, "golem", "Falls back to species id");
        assert_eq!(boss.category, BossCategory::Main);
        assert!(boss.occupies(TilePos::new(5, 5)));
        assert!(raid.is_occupied(TilePos::new(4, 5)));
        assert!(!raid.is_occupied(TilePos::new(6, 6)));
    }

    #[test]
    fn test_finish_is_exactly_once() {
        let mut raid = raid();
        assert!(raid.finish(RaidOutcome::Defeat, "all-dead"));
        assert!(!raid.finish(RaidOutcome::Victory, "force_end"));
        assert_eq!(raid.outcome(), Some(RaidOutcome::Defeat));

        let events = raid.drain_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0].event, RaidEvent::State(s) if s.over));
    }

    #[test]
    fn test_raid_over_emitted_once() {
        let mut raid = raid();
        let record = RewardsRecord::new(0, "arena", Vec::new());
        assert!(!raid.record_rewards(record.clone()), "Not over yet");
        raid.finish(RaidOutcome::Victory, "all-down");
        raid.drain_events();

        assert!(raid.record_rewards(record.clone()));
        assert!(!raid.record_rewards(record));
        let overs = raid
            .drain_events()
            .into_iter()
            .filter(|o| o.event.name() == "raid:over")
            .count();
        assert_eq!(overs, 1);
    }

    #[test]
    fn test_check_outcome() {
        let mut raid = raid();
        assert_eq!(raid.check_outcome(), None);
        raid.players.get_mut(&1).unwrap().dead = true;
        assert_eq!(raid.check_outcome(), Some((RaidOutcome::Defeat, "all-dead")));
        raid.bosses.get_mut("b1").unwrap().hp = 0;
        assert_eq!(
            raid.check_outcome(),
            Some((RaidOutcome::Victory, "all-down")),
            "Victory wins a simultaneous wipe"
        );
    }

    #[test]
    fn test_cooldown_decay_and_rounding() {
        let mut table = CooldownTable::default();
        table.start(1, "slash", 1.5);
        table.decay(0.333);
        assert_eq!(table.table(1)["slash"], 1.17);
        table.decay(5.0);
        assert_eq!(table.remaining(1, "slash"), 0.0);
    }

    #[test]
    fn test_generated_uids_are_unique() {
        let mut raid = raid();
        let a = raid.generate_uid();
        let b = raid.generate_uid();
        assert_ne!(a, b);
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_rewards_grouped_by_player() {
        let grant = |player_id| RewardGrant {
            player_id,
            kind: RewardKind::Item,
            reward_id: "Ore".into(),
            img: None,
            count: 1,
        };
        let record = RewardsRecord::new(0, "arena", vec![grant(1), grant(2), grant(1)]);
        assert_eq!(record.by_player[&1].len(), 2);
        assert_eq!(record.by_player[&2].len(), 1);
    }
}
