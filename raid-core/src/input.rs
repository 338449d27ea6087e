//! Player command handlers.
//!
//! Both handlers validate against the live raid and return `false` on any
//! rejection without touching state or emitting anything. Accepted commands
//! resolve immediately; players have no windup.

use rand::Rng;

use crate::combat::{apply_damage_to_boss, apply_damage_to_player, apply_heal_to_player};
use crate::constants::{COSMETIC_CRIT_CHANCE, MOVE_AP_COST};
use crate::events::{HealEntry, Hit, RaidEvent};
use crate::grid::TilePos;
use crate::raid::{PlayerId, RaidState};
use crate::skills::{SkillDefinition, SkillShape, SkillStatusTarget};
use crate::status::StatusKind;

fn can_act(raid: &RaidState, pid: PlayerId) -> bool {
    if raid.is_over() {
        return false;
    }
    raid.players
        .get(&pid)
        .is_some_and(|p| p.is_alive() && !p.statuses.has(&StatusKind::Stun))
}

/// `input:move`: one step in any of the eight directions for 1 AP
pub fn handle_move(raid: &mut RaidState, pid: PlayerId, to: TilePos) -> bool {
    if !can_act(raid, pid) {
        return false;
    }
    let Some(player) = raid.players.get(&pid) else {
        return false;
    };
    if player.pos.chebyshev(to) != 1 || player.ap < MOVE_AP_COST {
        return false;
    }
    if !raid.map.passable(to.x, to.y) || raid.is_occupied(to) {
        return false;
    }

    let Some(player) = raid.players.get_mut(&pid) else {
        return false;
    };
    player.pos = to;
    player.ap -= MOVE_AP_COST;
    let ap = player.ap;
    raid.emit(RaidEvent::Moved {
        id: pid,
        x: to.x,
        y: to.y,
        ap,
    });

    step_on_hazard(raid, pid, to);
    true
}

/// Trigger and consume the tile override under a player
fn step_on_hazard(raid: &mut RaidState, pid: PlayerId, tile: TilePos) {
    let Some(hazard) = raid.tile_overrides.get(&tile).cloned() else {
        return;
    };

    for effect in &hazard.effects {
        if effect.dmg > 0 {
            if let Some(report) = apply_damage_to_player(raid, pid, effect.dmg, true) {
                if report.dealt > 0 {
                    raid.emit(RaidEvent::PlayersDamaged {
                        hits: vec![Hit {
                            id: pid,
                            hp: report.after,
                            dmg: report.dealt,
                            by: "tile".into(),
                            action: "trap".into(),
                            label: "Trap".into(),
                        }],
                        origin: Some(effect.origin.clone()),
                    });
                }
            }
        }

        for spec in &effect.apply_status {
            let Some(player) = raid.players.get_mut(&pid) else {
                break;
            };
            player
                .statuses
                .add(spec.clone().with_source("trap"));
            let event = RaidEvent::StatusApply {
                raid_id: raid.id.clone(),
                target_id: pid,
                status: spec.id.clone(),
            };
            raid.emit(event);
        }
    }

    raid.clear_tile_override(tile);
    raid.emit_overrides();
}

/// Tiles a non-relocation skill affects when aimed at `target`
pub fn affected_tiles(skill: &SkillDefinition, target: TilePos) -> Vec<TilePos> {
    match skill.shape {
        SkillShape::Circle => crate::grid::tiles_in_circle(target, skill.radius),
        _ => vec![target],
    }
}

/// `action:skill`: cast a loadout skill at a target tile
pub fn handle_skill(raid: &mut RaidState, pid: PlayerId, skill_id: &str, target: TilePos) -> bool {
    if !can_act(raid, pid) {
        return false;
    }
    let Some(player) = raid.players.get(&pid) else {
        return false;
    };
    let Some(skill) = player.skill(skill_id).cloned() else {
        return false;
    };
    if raid.cooldowns.remaining(pid, skill_id) > 0.0 {
        return false;
    }
    if (player.ap.floor() as i32) < skill.ap_cost {
        return false;
    }
    let origin_pos = player.pos;
    let in_range = origin_pos.manhattan(target) <= skill.range;

    if skill.shape.is_relocation() {
        if !in_range || !raid.map.passable(target.x, target.y) || raid.is_occupied(target) {
            return false;
        }
        let Some(player) = raid.players.get_mut(&pid) else {
            return false;
        };
        player.ap -= skill.ap_cost as f64;
        player.pos = target;
        let ap = player.ap;
        raid.cooldowns.start(pid, &skill.id, skill.cooldown);
        raid.emit(RaidEvent::SkillMove {
            id: pid,
            to: target,
            ap,
            skill_id: skill.id.clone(),
        });
        raid.emit_cooldowns(pid);
        return true;
    }

    if !in_range {
        return false;
    }
    if let Some(player) = raid.players.get_mut(&pid) {
        player.ap -= skill.ap_cost as f64;
    }
    raid.cooldowns.start(pid, &skill.id, skill.cooldown);

    let (player_dmg, boss_dmg) = roll_damage(raid, pid, &skill);
    let tiles = affected_tiles(&skill, target);

    if skill.heal > 0 {
        heal_tiles(raid, pid, &skill, &tiles);
    }
    if player_dmg > 0 {
        damage_players(raid, pid, &skill, &tiles, player_dmg);
    }
    if boss_dmg > 0 && skill.hits_bosses {
        damage_bosses(raid, pid, &skill, &tiles, boss_dmg);
    }
    apply_skill_statuses(raid, pid, &skill, &tiles);

    let (caster_name, ap) = raid
        .players
        .get(&pid)
        .map(|p| (p.name.clone(), p.ap))
        .unwrap_or_default();
    raid.emit(RaidEvent::SkillCast {
        caster: pid,
        caster_name,
        skill_id: skill.id.clone(),
        skill_name: skill.label().to_string(),
        target,
        affected_tiles: tiles,
        ap,
    });
    raid.emit_cooldowns(pid);
    true
}

/// Damage a cast deals to players and the raw amount it sends at bosses.
///
/// Rolls are scaled by the caster's dealt multiplier only for players;
/// boss damage gets the multiplier inside [`apply_damage_to_boss`].
fn roll_damage(raid: &mut RaidState, pid: PlayerId, skill: &SkillDefinition) -> (i32, i32) {
    if let Some(fixed) = skill.fixed_dmg {
        let fixed = fixed.max(0);
        return (fixed, fixed);
    }
    let Some(player) = raid.players.get(&pid) else {
        return (0, 0);
    };
    let atk = player.atk.max(1);
    let mul = player.statuses.compute_modifiers().dmg_dealt_mul;

    let rng = raid.rng();
    let raw: i32 = (0..skill.dmg).map(|_| rng.gen_range(1..=atk)).sum();
    if raw == 0 {
        return (0, 0);
    }
    let scaled = ((raw as f64 * mul).ceil() as i32).max(1);
    (scaled, raw)
}

fn on_tiles(tiles: &[TilePos], pos: TilePos) -> bool {
    tiles.contains(&pos)
}

fn heal_tiles(raid: &mut RaidState, pid: PlayerId, skill: &SkillDefinition, tiles: &[TilePos]) {
    let targets: Vec<PlayerId> = raid
        .players
        .values()
        .filter(|p| p.is_alive() && on_tiles(tiles, p.pos))
        .map(|p| p.id)
        .collect();

    let mut healed = Vec::new();
    for id in targets {
        let Some(report) = apply_heal_to_player(raid, id, skill.heal) else {
            continue;
        };
        let to = raid.players.get(&id).map(|p| p.name.clone()).unwrap_or_default();
        healed.push(HealEntry {
            id,
            to,
            hp: report.after,
            amount: report.dealt,
        });
    }

    if !healed.is_empty() {
        let by = raid.players.get(&pid).map(|p| p.name.clone()).unwrap_or_default();
        raid.emit(RaidEvent::PlayerHealed {
            healed,
            by,
            label: skill.label().to_string(),
        });
    }
}

fn damage_players(
    raid: &mut RaidState,
    pid: PlayerId,
    skill: &SkillDefinition,
    tiles: &[TilePos],
    dmg: i32,
) {
    let caster = raid.players.get(&pid).map(|p| p.name.clone()).unwrap_or_default();
    let targets: Vec<PlayerId> = raid
        .players
        .values()
        .filter(|p| p.is_alive() && on_tiles(tiles, p.pos))
        .map(|p| p.id)
        .collect();

    let mut hits = Vec::new();
    for id in targets {
        let Some(report) = apply_damage_to_player(raid, id, dmg, skill.ignore_defense) else {
            continue;
        };
        if report.dealt > 0 {
            hits.push(Hit {
                id,
                hp: report.after,
                dmg: report.dealt,
                by: caster.clone(),
                action: skill.id.clone(),
                label: skill.label().to_string(),
            });
        }
    }
    if !hits.is_empty() {
        raid.emit(RaidEvent::PlayersDamaged { hits, origin: None });
    }
}

fn damage_bosses(
    raid: &mut RaidState,
    pid: PlayerId,
    skill: &SkillDefinition,
    tiles: &[TilePos],
    raw: i32,
) {
    let caster = raid.players.get(&pid).map(|p| p.name.clone()).unwrap_or_default();
    let struck: Vec<String> = raid
        .bosses
        .values()
        .filter(|b| b.is_alive() && tiles.iter().any(|t| b.occupies(*t)))
        .map(|b| b.uid.clone())
        .collect();

    for uid in struck {
        let Some(report) = apply_damage_to_boss(raid, raw, &uid, pid) else {
            continue;
        };
        if report.dealt <= 0 {
            continue;
        }
        let crit = raid.rng().gen_bool(COSMETIC_CRIT_CHANCE);
        let Some(boss) = raid.bosses.get(&uid) else {
            continue;
        };
        let event = RaidEvent::BossDamaged {
            boss_id: uid.clone(),
            name: boss.name.clone(),
            dmg: report.dealt,
            hp: boss.hp,
            max_hp: boss.max_hp,
            by: caster.clone(),
            action: skill.label().to_string(),
            crit,
        };
        raid.emit(event);
    }
}

fn apply_skill_statuses(raid: &mut RaidState, pid: PlayerId, skill: &SkillDefinition, tiles: &[TilePos]) {
    for status in &skill.apply_status {
        let spec = status.spec.clone().with_source("skill").with_taunter(pid);
        match status.target {
            SkillStatusTarget::Caster => {
                if let Some(player) = raid.players.get_mut(&pid) {
                    player.statuses.add(spec);
                }
            }
            SkillStatusTarget::Ally => {
                for player in raid.players.values_mut() {
                    if player.is_alive() && on_tiles(tiles, player.pos) {
                        player.statuses.add(spec.clone());
                    }
                }
            }
            SkillStatusTarget::Enemy | SkillStatusTarget::Boss => {
                for boss in raid.bosses.values_mut() {
                    if boss.is_alive() && tiles.iter().any(|t| boss.occupies(*t)) {
                        boss.statuses.add(spec.clone());
                    }
                }
            }
        }
    }
}
