//! Broadcast event catalogue.
//!
//! Every event serializes as `{ "event": "<name>", "data": { .. } }` with
//! camelCase payload fields, which is what the WebSocket stream forwards.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::boss::BossCategory;
use crate::grid::{Footprint, TilePos};
use crate::raid::{PlayerId, RaidOutcome, RewardGrant};
use crate::status::{StatusEffect, StatusKind, StatusSpec};

/// Who performed an action, carried on boss attacks and damage reports
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOrigin {
    pub by: String,
    pub action: String,
    pub say: String,
    pub label: String,
    pub boss_name: String,
    pub boss_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub hp: i32,
    pub max_hp: i32,
    pub ap: f64,
    pub dead: bool,
    pub statuses: Vec<StatusEffect>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BossView {
    pub uid: String,
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub category: BossCategory,
    pub x: i32,
    pub y: i32,
    pub hp: i32,
    pub max_hp: i32,
    pub phase: Option<String>,
    pub statuses: Vec<StatusEffect>,
    pub size: Footprint,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub t: u64,
    pub players: Vec<PlayerView>,
    pub bosses: Vec<BossView>,
    pub over: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hit {
    pub id: PlayerId,
    pub hp: i32,
    pub dmg: i32,
    pub by: String,
    pub action: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealEntry {
    pub id: PlayerId,
    pub to: String,
    pub hp: i32,
    pub amount: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HazardEffect {
    pub dmg: i32,
    pub apply_status: Vec<StatusSpec>,
    pub text: String,
    pub origin: ActionOrigin,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideView {
    pub x: i32,
    pub y: i32,
    pub base: Option<i32>,
    pub effects: Vec<HazardEffect>,
}

/// Events published to a raid channel or a single player
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum RaidEvent {
    #[serde(rename = "state")]
    State(StateSnapshot),

    #[serde(rename = "battle:started", rename_all = "camelCase")]
    BattleStarted { raid_id: String },

    #[serde(rename = "boss:windup", rename_all = "camelCase")]
    BossWindup {
        boss_id: String,
        tele: Vec<TilePos>,
        windup: u64,
        boss_type: BossCategory,
    },

    #[serde(rename = "boss:announce", rename_all = "camelCase")]
    BossAnnounce { boss_id: String, text: String },

    #[serde(rename = "boss:attack", rename_all = "camelCase")]
    BossAttack {
        boss_id: String,
        tiles: Vec<TilePos>,
        origin: ActionOrigin,
    },

    #[serde(rename = "boss:move", rename_all = "camelCase")]
    BossMove { boss_id: String, to: TilePos },

    #[serde(rename = "boss:applyStatus", rename_all = "camelCase")]
    BossApplyStatus {
        boss_id: String,
        target: String,
        status: StatusKind,
    },

    #[serde(rename = "players:damaged")]
    PlayersDamaged {
        hits: Vec<Hit>,
        #[serde(skip_serializing_if = "Option::is_none")]
        origin: Option<ActionOrigin>,
    },

    #[serde(rename = "player:damaged:tick")]
    PlayerDamagedTick {
        id: PlayerId,
        name: String,
        dmg: i32,
        hp: i32,
        by: StatusKind,
    },

    #[serde(rename = "boss:damaged", rename_all = "camelCase")]
    BossDamaged {
        boss_id: String,
        name: String,
        dmg: i32,
        hp: i32,
        max_hp: i32,
        by: String,
        action: String,
        crit: bool,
    },

    #[serde(rename = "boss:damaged:tick", rename_all = "camelCase")]
    BossDamagedTick {
        boss_id: String,
        name: String,
        dmg: i32,
        hp: i32,
        max_hp: i32,
        by: StatusKind,
    },

    #[serde(rename = "player:healed")]
    PlayerHealed {
        healed: Vec<HealEntry>,
        by: String,
        label: String,
    },

    #[serde(rename = "player:healed:tick")]
    PlayerHealedTick {
        id: PlayerId,
        amount: i32,
        hp: i32,
        by: StatusKind,
    },

    #[serde(rename = "player:death")]
    PlayerDeath { id: PlayerId, message: String },

    #[serde(rename = "boss:death", rename_all = "camelCase")]
    BossDeath { boss_id: String, message: String },

    #[serde(rename = "tile:Overrides", rename_all = "camelCase")]
    TileOverrides {
        raid_id: String,
        overrides: Vec<OverrideView>,
    },

    #[serde(rename = "status:apply", rename_all = "camelCase")]
    StatusApply {
        raid_id: String,
        target_id: PlayerId,
        status: StatusKind,
    },

    #[serde(rename = "moved")]
    Moved { id: PlayerId, x: i32, y: i32, ap: f64 },

    #[serde(rename = "skill:move", rename_all = "camelCase")]
    SkillMove {
        id: PlayerId,
        to: TilePos,
        ap: f64,
        skill_id: String,
    },

    #[serde(rename = "skill:cast", rename_all = "camelCase")]
    SkillCast {
        caster: PlayerId,
        caster_name: String,
        skill_id: String,
        skill_name: String,
        target: TilePos,
        affected_tiles: Vec<TilePos>,
        ap: f64,
    },

    #[serde(rename = "raid:over")]
    RaidOver {
        result: RaidOutcome,
        reason: String,
        reward: Vec<RewardGrant>,
    },

    #[serde(rename = "cd:update")]
    CooldownUpdate { cd: BTreeMap<String, f64> },
}

impl RaidEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            RaidEvent::State(_) => "state",
            RaidEvent::BattleStarted { .. } => "battle:started",
            RaidEvent::BossWindup { .. } => "boss:windup",
            RaidEvent::BossAnnounce { .. } => "boss:announce",
            RaidEvent::BossAttack { .. } => "boss:attack",
            RaidEvent::BossMove { .. } => "boss:move",
            RaidEvent::BossApplyStatus { .. } => "boss:applyStatus",
            RaidEvent::PlayersDamaged { .. } => "players:damaged",
            RaidEvent::PlayerDamagedTick { .. } => "player:damaged:tick",
            RaidEvent::BossDamaged { .. } => "boss:damaged",
            RaidEvent::BossDamagedTick { .. } => "boss:damaged:tick",
            RaidEvent::PlayerHealed { .. } => "player:healed",
            RaidEvent::PlayerHealedTick { .. } => "player:healed:tick",
            RaidEvent::PlayerDeath { .. } => "player:death",
            RaidEvent::BossDeath { .. } => "boss:death",
            RaidEvent::TileOverrides { .. } => "tile:Overrides",
            RaidEvent::StatusApply { .. } => "status:apply",
            RaidEvent::Moved { .. } => "moved",
            RaidEvent::SkillMove { .. } => "skill:move",
            RaidEvent::SkillCast { .. } => "skill:cast",
            RaidEvent::RaidOver { .. } => "raid:over",
            RaidEvent::CooldownUpdate { .. } => "cd:update",
        }
    }
}

/// Delivery scope of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Raid,
    Player(PlayerId),
}

/// An event waiting in a raid's outbox
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub audience: Audience,
    pub event: RaidEvent,
}
