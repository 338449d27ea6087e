//! Boss action execution, split around the windup.
//!
//! [`prepare`] computes the telegraph, records the action origin and queues
//! `boss:windup` (plus an announcement for main bosses). The caller then
//! waits out `windup_ms` and calls [`resolve`], which re-reads the live raid
//! state: players may have moved, died or shielded up in the meantime.

use tracing::debug;

use crate::boss::{
    ActionKind, BossAction, BossCatalog, BossCategory, StatusTarget, Summon, TileHazard,
};
use crate::combat::{damage_players_on_tiles, label_for};
use crate::events::{ActionOrigin, HazardEffect, RaidEvent};
use crate::grid::TilePos;
use crate::pathfinding::{bfs_path_for_boss, boss_move, find_target};
use crate::raid::{Boss, PlayerId, RaidState};

/// A telegraphed action waiting for its windup to elapse
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedAction {
    pub boss_uid: String,
    pub action: BossAction,
    pub origin: ActionOrigin,
    /// Telegraphed tiles
    pub tiles: Vec<TilePos>,
    /// Player a target-tracking attack locked onto
    pub target: Option<PlayerId>,
}

impl PreparedAction {
    pub fn windup_ms(&self) -> u64 {
        self.action.windup_ms
    }
}

fn origin_for(boss: &Boss, action: &BossAction) -> ActionOrigin {
    let tag = action.kind.tag();
    ActionOrigin {
        by: "boss".into(),
        action: tag.into(),
        say: action.say.clone().unwrap_or_default(),
        label: action
            .name
            .clone()
            .unwrap_or_else(|| label_for(action.say.as_deref(), tag)),
        boss_name: boss.name.clone(),
        boss_id: boss.uid.clone(),
    }
}

/// Telegraph an action. Returns `None` when nothing would happen.
pub fn prepare(raid: &mut RaidState, uid: &str, action: &BossAction) -> Option<PreparedAction> {
    if raid.is_over() {
        return None;
    }
    let boss = raid.bosses.get(uid).filter(|b| b.is_alive())?;
    let origin = origin_for(boss, action);
    let category = boss.category;
    let pos = boss.pos;

    let mut target = None;
    let tiles = match &action.kind {
        ActionKind::AttackCircleSelf(a) => raid.map.tiles_in_circle(pos, a.radius),
        ActionKind::AttackCircleTarget(a) => {
            let id = find_target(raid, uid)?;
            target = Some(id);
            let center = raid.players.get(&id)?.pos;
            raid.map.tiles_in_circle(center, a.radius)
        }
        ActionKind::AttackLineRow(a) => raid.map.row_tiles(pos, a.length),
        ActionKind::GlobalAoe(_) => raid.map.all_tiles(),
        ActionKind::TileEffect(h) => vec![h.tile],
        ActionKind::MoveTowardNearest(_)
        | ActionKind::SummonMinions(_)
        | ActionKind::ApplyStatus(_) => Vec::new(),
        ActionKind::Unsupported => {
            debug!(boss = %uid, "Skipping unsupported action");
            return None;
        }
    };

    raid.emit(RaidEvent::BossWindup {
        boss_id: uid.to_string(),
        tele: tiles.clone(),
        windup: action.windup_ms,
        boss_type: category,
    });
    if category == BossCategory::Main && !origin.say.trim().is_empty() {
        raid.emit(RaidEvent::BossAnnounce {
            boss_id: uid.to_string(),
            text: origin.say.clone(),
        });
    }

    Some(PreparedAction {
        boss_uid: uid.to_string(),
        action: action.clone(),
        origin,
        tiles,
        target,
    })
}

/// Resolve a prepared action against the current raid state.
///
/// Nothing happens once the raid is over or the acting boss has died.
pub fn resolve(raid: &mut RaidState, prepared: &PreparedAction, catalog: &dyn BossCatalog) {
    if raid.is_over() {
        return;
    }
    let uid = prepared.boss_uid.as_str();
    let Some(pos) = raid.bosses.get(uid).filter(|b| b.is_alive()).map(|b| b.pos) else {
        return;
    };
    let origin = &prepared.origin;

    match &prepared.action.kind {
        ActionKind::AttackCircleSelf(a) => {
            let tiles = raid.map.tiles_in_circle(pos, a.radius);
            strike(raid, uid, tiles, a.dmg, origin);
        }
        ActionKind::AttackCircleTarget(a) => {
            let tracked = prepared
                .target
                .filter(|id| raid.players.get(id).is_some_and(|p| p.is_alive()));
            let Some(id) = tracked.or_else(|| find_target(raid, uid)) else {
                return;
            };
            let Some(center) = raid.players.get(&id).map(|p| p.pos) else {
                return;
            };
            let tiles = raid.map.tiles_in_circle(center, a.radius);
            strike(raid, uid, tiles, a.dmg, origin);
        }
        ActionKind::AttackLineRow(a) => {
            let tiles = raid.map.row_tiles(pos, a.length);
            strike(raid, uid, tiles, a.dmg, origin);
        }
        ActionKind::GlobalAoe(a) => {
            let tiles = raid.map.all_tiles();
            strike(raid, uid, tiles, a.dmg, origin);
        }
        ActionKind::MoveTowardNearest(m) => {
            let Some(id) = find_target(raid, uid) else {
                return;
            };
            let Some(goal) = raid.players.get(&id).map(|p| p.pos) else {
                return;
            };
            let path = bfs_path_for_boss(raid, pos, goal, m.max_steps, uid);
            if path.len() > 1 {
                boss_move(raid, uid, &path);
            }
        }
        ActionKind::SummonMinions(s) => summon(raid, s, catalog),
        ActionKind::TileEffect(h) => install_hazard(raid, h, origin),
        ActionKind::ApplyStatus(app) => {
            for targeted in &app.apply_status {
                let mut spec = targeted.spec.clone();
                spec.src = prepared
                    .action
                    .name
                    .clone()
                    .unwrap_or_else(|| "boss".into());

                let target_name = match targeted.target {
                    StatusTarget::Player => {
                        let Some(id) = find_target(raid, uid) else {
                            continue;
                        };
                        let Some(player) = raid.players.get_mut(&id) else {
                            continue;
                        };
                        player.statuses.add(spec.clone());
                        player.name.clone()
                    }
                    StatusTarget::Own => {
                        let Some(boss) = raid.bosses.get_mut(uid) else {
                            continue;
                        };
                        boss.statuses.add(spec.clone());
                        boss.name.clone()
                    }
                };
                raid.emit(RaidEvent::BossApplyStatus {
                    boss_id: uid.to_string(),
                    target: target_name,
                    status: spec.id,
                });
            }
        }
        ActionKind::Unsupported => {}
    }
}

fn strike(raid: &mut RaidState, uid: &str, tiles: Vec<TilePos>, dmg: i32, origin: &ActionOrigin) {
    damage_players_on_tiles(raid, &tiles, dmg, origin);
    raid.emit(RaidEvent::BossAttack {
        boss_id: uid.to_string(),
        tiles,
        origin: origin.clone(),
    });
}

fn summon(raid: &mut RaidState, summon: &Summon, catalog: &dyn BossCatalog) {
    for minion in &summon.minions {
        if minion.spawn.is_none() {
            continue;
        }
        let definition = catalog.boss_definition(&minion.id);
        let uid = raid.generate_uid();
        debug!(raid_id = %raid.id, species = %minion.id, uid = %uid, "Summoned minion");
        let boss = Boss::spawn(uid, minion, definition, BossCategory::Sub);
        raid.add_boss(boss);
    }
}

fn install_hazard(raid: &mut RaidState, hazard: &TileHazard, origin: &ActionOrigin) {
    if !raid.map.in_bounds(hazard.tile.x, hazard.tile.y) {
        return;
    }
    let effect = HazardEffect {
        dmg: hazard.dmg,
        apply_status: hazard.apply_status.clone(),
        text: origin.say.clone(),
        origin: origin.clone(),
    };
    raid.set_tile_override(hazard.tile, vec![effect]);
    raid.emit_overrides();
}
