//! Command facade over the registry.
//!
//! Transport code (HTTP, WebSocket, tests) talks to [`RaidService`] only.
//! Player commands return whether they were applied; rejected input changes
//! nothing and broadcasts nothing.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use raid_core::config::ServerConfig;
use raid_core::data::DataStore;
use raid_core::events::{BossView, OverrideView, PlayerView};
use raid_core::grid::{MapDefinition, TilePos};
use raid_core::input::{handle_move, handle_skill};
use raid_core::raid::{Boss, Player, PlayerId, RaidOutcome, RewardsRecord};
use raid_core::skills::SkillDefinition;

use crate::channels::{EventHub, Subscription};
use crate::lifecycle::{self, raid_id_for, RaidError};
use crate::metrics::RaidMetrics;
use crate::registry::RaidRegistry;
use crate::storage::repository::StorageManager;

/// Shared server context, cheap to clone
#[derive(Clone)]
pub struct RaidService {
    pub config: Arc<ServerConfig>,
    pub data: Arc<DataStore>,
    pub registry: Arc<RaidRegistry>,
    pub hub: Arc<EventHub>,
    pub storage: Arc<StorageManager>,
    pub metrics: Arc<RaidMetrics>,
}

// ============================================================================
// Join replies
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaidSummary {
    pub raid_id: String,
    pub result: Option<RaidOutcome>,
    pub reason: Option<String>,
    /// Unix millis when rewards were settled
    pub ended_at: Option<i64>,
    pub rewards: Option<RewardsRecord>,
    pub players: Vec<PlayerView>,
    pub bosses: Vec<BossView>,
    pub map: MapDefinition,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedRaid {
    pub is_view: bool,
    pub id: Option<PlayerId>,
    pub raid_id: String,
    pub players: Vec<PlayerView>,
    pub map: MapDefinition,
    pub overrides: Vec<OverrideView>,
    pub you: Option<PlayerView>,
    pub your_skills: Vec<SkillDefinition>,
    pub bosses: Vec<BossView>,
    pub skills: Vec<SkillDefinition>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum JoinReply {
    Error { code: &'static str, message: String },
    Summary(Box<RaidSummary>),
    Joined(Box<JoinedRaid>),
}

impl JoinReply {
    fn error(code: &'static str, message: impl Into<String>) -> Self {
        JoinReply::Error {
            code,
            message: message.into(),
        }
    }
}

// ============================================================================
// Service
// ============================================================================

impl RaidService {
    pub fn new(config: ServerConfig, data: Arc<DataStore>, storage: StorageManager) -> Self {
        Self {
            config: Arc::new(config),
            data,
            registry: Arc::new(RaidRegistry::new()),
            hub: Arc::new(EventHub::default()),
            storage: Arc::new(storage),
            metrics: RaidMetrics::new(),
        }
    }

    /// `battle:start`
    pub async fn start_battle(&self, team_id: i64) -> Result<String, RaidError> {
        lifecycle::create_raid(self, team_id).await
    }

    /// `join`: a player or spectator attaches to a raid
    pub fn join(&self, raid_id: &str, ch_id: Option<PlayerId>, is_view: bool) -> JoinReply {
        let Some(handle) = self.registry.get(raid_id) else {
            return JoinReply::error("RAID_NOT_FOUND", format!("Raid {raid_id} does not exist"));
        };
        let mut raid = handle.lock();

        if raid.is_over() {
            let rewards = raid.rewards().cloned();
            return JoinReply::Summary(Box::new(RaidSummary {
                raid_id: raid.id.clone(),
                result: raid.outcome(),
                reason: raid.reason().map(str::to_string),
                ended_at: rewards.as_ref().map(|r| r.at),
                rewards,
                players: raid.players.values().map(Player::view).collect(),
                bosses: raid.bosses.values().map(Boss::view).collect(),
                map: (*raid.map).clone(),
            }));
        }

        let me = ch_id.and_then(|id| raid.players.get(&id));
        if !is_view && me.is_none() {
            return JoinReply::error("PLAYER_NOT_FOUND", "You are not a member of this raid");
        }
        let you = me.map(Player::view);
        let your_skills = me.map(|p| p.skills.clone()).unwrap_or_default();
        let id = me.map(|p| p.id);
        if let Some(id) = id {
            raid.cooldowns.ensure(id);
        }

        JoinReply::Joined(Box::new(JoinedRaid {
            is_view,
            id,
            raid_id: raid.id.clone(),
            players: raid.players.values().map(Player::view).collect(),
            map: (*raid.map).clone(),
            overrides: raid.override_views(),
            you,
            your_skills,
            bosses: raid.bosses.values().map(Boss::view).collect(),
            skills: self.data.skills().skills.clone(),
        }))
    }

    /// `input:move`
    pub fn move_player(&self, raid_id: &str, player: PlayerId, to: TilePos) -> bool {
        let Some(handle) = self.registry.get(raid_id) else {
            return false;
        };
        let mut raid = handle.lock();
        let applied = handle_move(&mut raid, player, to);
        self.hub.publish(raid_id, raid.drain_events());
        applied
    }

    /// `action:skill`
    pub fn cast_skill(&self, raid_id: &str, player: PlayerId, skill_id: &str, target: TilePos) -> bool {
        let Some(handle) = self.registry.get(raid_id) else {
            return false;
        };
        let mut raid = handle.lock();
        let applied = handle_skill(&mut raid, player, skill_id, target);
        self.hub.publish(raid_id, raid.drain_events());
        applied
    }

    /// Leave or disconnect. An emptied running raid is aborted; the roster of
    /// an ended raid is frozen for its summary.
    pub fn leave(&self, raid_id: &str, player: PlayerId) -> bool {
        let Some(handle) = self.registry.get(raid_id) else {
            return false;
        };
        let emptied = {
            let mut raid = handle.lock();
            if raid.is_over() || raid.remove_player(player).is_none() {
                return false;
            }
            info!(raid_id, player, "Player left raid");
            raid.is_running() && raid.players.is_empty()
        };
        if emptied {
            lifecycle::finish_raid(self, &handle, RaidOutcome::Aborted, "empty");
        }
        true
    }

    /// `battle:finish`: force the team's raid to end
    pub fn finish_battle(&self, team_id: i64, result: Option<&str>, reason: Option<&str>) -> bool {
        let raid_id = raid_id_for(team_id);
        let Some(handle) = self.registry.get(&raid_id) else {
            warn!(team_id, "Finish requested for unknown raid");
            return false;
        };
        let outcome = match result.map(str::trim).filter(|r| !r.is_empty()) {
            None => RaidOutcome::Victory,
            Some(raw) => RaidOutcome::parse(&raw.to_lowercase()).unwrap_or_else(|| {
                warn!(team_id, result = raw, "Unknown result, finishing as victory");
                RaidOutcome::Victory
            }),
        };
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or("force_end");
        lifecycle::finish_raid(self, &handle, outcome, reason)
    }

    /// Event stream for a resident raid
    pub fn subscribe(&self, raid_id: &str, player: Option<PlayerId>) -> Result<Subscription, RaidError> {
        if self.registry.get(raid_id).is_none() {
            return Err(RaidError::RaidNotFound(raid_id.to_string()));
        }
        Ok(self.hub.subscribe(raid_id, player))
    }
}
