//! Combat resolution: damage and healing against single entities.
//!
//! All functions work on a [`RaidState`] and queue their own death
//! announcements; callers batch and broadcast the hit reports.

use crate::constants::DAMAGE_CAP;
use crate::events::{ActionOrigin, Hit, RaidEvent};
use crate::grid::TilePos;
use crate::raid::{PlayerId, RaidState};
use crate::status::StatusKind;

/// Outcome of one damage or heal application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DamageReport {
    pub before: i32,
    pub after: i32,
    /// hp actually removed (or restored, for heals)
    pub dealt: i32,
}

/// Label shown for an action: its flavour text without trailing bangs
pub fn label_for(say: Option<&str>, fallback: &str) -> String {
    match say.map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => text.trim_end_matches(['!', '！']).to_string(),
        None => fallback.to_string(),
    }
}

/// Apply raw damage to a player.
///
/// Order: taken multiplier, shield absorption, defense, cap. Returns `None`
/// when the target is missing or already down.
pub fn apply_damage_to_player(
    raid: &mut RaidState,
    target: PlayerId,
    raw: i32,
    ignore_def: bool,
) -> Option<DamageReport> {
    let player = raid.players.get_mut(&target)?;
    if !player.is_alive() {
        return None;
    }
    if raw <= 0 {
        return Some(DamageReport {
            before: player.hp,
            after: player.hp,
            dealt: 0,
        });
    }

    let mods = player.statuses.compute_modifiers();
    let mut dmg = ((raw as f64 * mods.dmg_taken_mul).floor() as i32).max(1);

    dmg = player.statuses.absorb(dmg);
    if dmg > 0 && !ignore_def {
        dmg = (dmg - player.def.max(0)).max(1);
    }
    dmg = dmg.min(DAMAGE_CAP);

    let before = player.hp;
    player.hp = (before - dmg).max(0);
    let after = player.hp;

    if after == 0 {
        player.dead = true;
        player.ap = 0.0;
        let message = format!("Ally {} has been incapacitated.", player.name);
        raid.emit(RaidEvent::PlayerDeath { id: target, message });
    }

    Some(DamageReport {
        before,
        after,
        dealt: before - after,
    })
}

/// Heal a living player up to their max hp
pub fn apply_heal_to_player(raid: &mut RaidState, target: PlayerId, amount: i32) -> Option<DamageReport> {
    let player = raid.players.get_mut(&target)?;
    if player.dead {
        return None;
    }
    let before = player.hp;
    player.hp = (before + amount.max(0)).min(player.max_hp);
    Some(DamageReport {
        before,
        after: player.hp,
        dealt: player.hp - before,
    })
}

/// Apply a player's raw damage to a boss.
///
/// Both the boss's taken multiplier and the attacker's dealt multiplier
/// apply. A reflecting boss takes nothing and the attacker eats the hit.
pub fn apply_damage_to_boss(
    raid: &mut RaidState,
    raw: i32,
    uid: &str,
    attacker: PlayerId,
) -> Option<DamageReport> {
    let dealt_mul = raid
        .players
        .get(&attacker)
        .map(|p| p.statuses.compute_modifiers().dmg_dealt_mul)
        .unwrap_or(1.0);

    let boss = raid.bosses.get_mut(uid)?;
    if !boss.is_alive() {
        return None;
    }

    let taken_mul = boss.statuses.compute_modifiers().dmg_taken_mul;
    let mut dmg = ((raw.max(0) as f64 * taken_mul * dealt_mul).floor() as i32).max(0);

    if boss.statuses.has(&StatusKind::Reflect) {
        let hp = boss.hp;
        let boss_name = boss.name.clone();
        if let Some(report) = apply_damage_to_player(raid, attacker, dmg, false) {
            if report.dealt > 0 {
                raid.emit(RaidEvent::PlayersDamaged {
                    hits: vec![Hit {
                        id: attacker,
                        hp: report.after,
                        dmg: report.dealt,
                        by: boss_name,
                        action: "reflect".into(),
                        label: "Reflect".into(),
                    }],
                    origin: None,
                });
            }
        }
        return Some(DamageReport {
            before: hp,
            after: hp,
            dealt: 0,
        });
    }

    dmg = (dmg - boss.def.max(0)).max(1).min(DAMAGE_CAP);

    let before = boss.hp;
    boss.hp = (before - dmg).max(0);
    let after = boss.hp;
    announce_boss_death(raid, uid);

    Some(DamageReport {
        before,
        after,
        dealt: before - after,
    })
}

/// Emit `boss:death` if the boss is down and has not been announced yet
pub fn announce_boss_death(raid: &mut RaidState, uid: &str) {
    let Some(boss) = raid.bosses.get_mut(uid) else {
        return;
    };
    if boss.hp > 0 || boss.death_announced {
        return;
    }
    boss.death_announced = true;
    let message = format!("Enemy {} has fallen.", boss.name);
    raid.emit(RaidEvent::BossDeath {
        boss_id: uid.to_string(),
        message,
    });
}

/// Boss damage against every living player standing on `tiles`.
///
/// The acting boss's dealt multiplier is applied once, then each player
/// resolves individually. One batched `players:damaged` is emitted.
pub fn damage_players_on_tiles(
    raid: &mut RaidState,
    tiles: &[TilePos],
    dmg: i32,
    origin: &ActionOrigin,
) -> Vec<Hit> {
    let boss_mul = raid
        .bosses
        .get(&origin.boss_id)
        .map(|b| b.statuses.compute_modifiers().dmg_dealt_mul)
        .unwrap_or(1.0);
    let final_dmg = (dmg as f64 * boss_mul).floor() as i32;

    let targets: Vec<PlayerId> = raid
        .players
        .values()
        .filter(|p| p.is_alive() && tiles.contains(&p.pos))
        .map(|p| p.id)
        .collect();

    let mut hits = Vec::new();
    for id in targets {
        let Some(report) = apply_damage_to_player(raid, id, final_dmg, false) else {
            continue;
        };
        if report.dealt > 0 {
            hits.push(Hit {
                id,
                hp: report.after,
                dmg: report.dealt,
                by: origin.boss_name.clone(),
                action: origin.action.clone(),
                label: origin.label.clone(),
            });
        }
    }

    if !hits.is_empty() {
        raid.emit(RaidEvent::PlayersDamaged {
            hits: hits.clone(),
            origin: Some(origin.clone()),
        });
    }
    hits
}
