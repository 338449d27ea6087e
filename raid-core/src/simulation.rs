//! One simulation step of one raid.
//!
//! Order within a tick:
//! 1. player status effects and AP regeneration
//! 2. cooldown decay, pushed privately to each player
//! 3. victory / defeat check
//! 4. boss status effects (a DOT can land the killing blow)
//! 5. boss AI, which yields action dispatches for the async executor
//! 6. the state snapshot

use tracing::{debug, info};

use crate::boss::ai::{step_bosses, ActionDispatch};
use crate::boss::BossCategory;
use crate::combat::{announce_boss_death, apply_damage_to_player, apply_heal_to_player};
use crate::constants::{AP_REGEN_PER_SEC, MAX_AP};
use crate::events::RaidEvent;
use crate::raid::{PlayerId, RaidOutcome, RaidState};
use crate::status::PeriodicTick;

/// What a tick produced besides queued events
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub dispatches: Vec<ActionDispatch>,
    /// Set when this tick ended the raid
    pub finished: Option<RaidOutcome>,
}

impl TickOutcome {
    fn finished(outcome: RaidOutcome) -> Self {
        Self {
            dispatches: Vec::new(),
            finished: Some(outcome),
        }
    }
}

/// Advance a running raid by `dt_secs` of simulation time
pub fn tick_raid(raid: &mut RaidState, dt_secs: f64) -> TickOutcome {
    if !raid.is_running() {
        return TickOutcome::default();
    }
    let dt = if dt_secs.is_finite() { dt_secs.max(0.0) } else { 0.0 };
    raid.elapsed_ms += (dt * 1000.0).round() as u64;

    tick_players(raid, dt);
    tick_cooldowns(raid, dt);

    if let Some((outcome, reason)) = raid.check_outcome() {
        end(raid, outcome, reason);
        return TickOutcome::finished(outcome);
    }

    if tick_bosses(raid, dt) {
        return TickOutcome::finished(RaidOutcome::Victory);
    }

    let dispatches = step_bosses(raid, dt);
    if !dispatches.is_empty() {
        debug!(raid_id = %raid.id, count = dispatches.len(), "Boss actions dispatched");
    }

    raid.emit_state();
    TickOutcome {
        dispatches,
        finished: None,
    }
}

fn end(raid: &mut RaidState, outcome: RaidOutcome, reason: &str) {
    if !raid.finish(outcome, reason) {
        return;
    }
    info!(raid_id = %raid.id, result = outcome.as_str(), reason, "Raid finished");
    if outcome == RaidOutcome::Victory {
        let boss_id = raid
            .bosses
            .values()
            .find(|b| b.category == BossCategory::Main)
            .or_else(|| raid.bosses.values().next())
            .map(|b| b.uid.clone())
            .unwrap_or_default();
        raid.emit(RaidEvent::BossAnnounce {
            boss_id,
            text: "Boss defeated!".into(),
        });
    }
}

fn tick_players(raid: &mut RaidState, dt: f64) {
    let ids: Vec<PlayerId> = raid.players.keys().copied().collect();
    for id in ids {
        let Some(player) = raid.players.get_mut(&id) else {
            continue;
        };
        let fired = player.statuses.tick(dt * 1000.0);

        for tick in fired {
            match tick {
                PeriodicTick::Dot { id: kind, amount } => {
                    let Some(report) = apply_damage_to_player(raid, id, amount, true) else {
                        continue;
                    };
                    if report.dealt > 0 {
                        let name = raid.players.get(&id).map(|p| p.name.clone()).unwrap_or_default();
                        raid.emit(RaidEvent::PlayerDamagedTick {
                            id,
                            name,
                            dmg: report.dealt,
                            hp: report.after,
                            by: kind,
                        });
                    }
                }
                PeriodicTick::Hot { id: kind, amount } => {
                    let Some(report) = apply_heal_to_player(raid, id, amount) else {
                        continue;
                    };
                    if report.dealt > 0 {
                        raid.emit(RaidEvent::PlayerHealedTick {
                            id,
                            amount: report.dealt,
                            hp: report.after,
                            by: kind,
                        });
                    }
                }
            }
        }

        let Some(player) = raid.players.get_mut(&id) else {
            continue;
        };
        if player.is_alive() {
            let mul = player.statuses.compute_modifiers().ap_regen_mul;
            player.ap = (player.ap + AP_REGEN_PER_SEC * mul * dt).min(MAX_AP);
        } else {
            player.ap = 0.0;
        }
    }
}

fn tick_cooldowns(raid: &mut RaidState, dt: f64) {
    raid.cooldowns.decay(dt);
    let ids: Vec<PlayerId> = raid.players.keys().copied().collect();
    for id in ids {
        raid.emit_cooldowns(id);
    }
}

/// Tick boss effects; returns `true` if a DOT finished the raid
fn tick_bosses(raid: &mut RaidState, dt: f64) -> bool {
    let uids: Vec<String> = raid
        .bosses
        .values()
        .filter(|b| b.is_alive())
        .map(|b| b.uid.clone())
        .collect();

    for uid in uids {
        let Some(boss) = raid.bosses.get_mut(&uid) else {
            continue;
        };
        let fired = boss.statuses.tick(dt * 1000.0);

        for tick in fired {
            let Some(boss) = raid.bosses.get_mut(&uid) else {
                break;
            };
            match tick {
                PeriodicTick::Dot { id: kind, amount } => {
                    let before = boss.hp;
                    if before == 0 {
                        continue;
                    }
                    boss.hp = (before - amount).max(0);
                    let event = RaidEvent::BossDamagedTick {
                        boss_id: uid.clone(),
                        name: boss.name.clone(),
                        dmg: before - boss.hp,
                        hp: boss.hp,
                        max_hp: boss.max_hp,
                        by: kind,
                    };
                    raid.emit(event);
                    announce_boss_death(raid, &uid);

                    if raid.all_bosses_down() {
                        end(raid, RaidOutcome::Victory, "boss-dead");
                        return true;
                    }
                }
                PeriodicTick::Hot { amount, .. } => {
                    if boss.hp > 0 {
                        boss.hp = (boss.hp + amount).min(boss.max_hp);
                    }
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boss::BossDefinition;
    use crate::grid::{BossSpawn, MapDefinition, TilePos};
    use crate::raid::{Boss, Player};
    use crate::status::{StatusKind, StatusSpec};
    use std::sync::Arc;
    use std::time::Instant;

    fn raid() -> RaidState {
        let mut raid = RaidState::new("battle:9", Arc::new(MapDefinition::open("arena", 8)), Some(2));
        raid.add_player(Player::new(1, "Ari", TilePos::new(0, 0), 50));
        let spawn = BossSpawn {
            id: "golem".into(),
            spawn: Some(TilePos::new(4, 4)),
            hp: Some(20),
            category: None,
            size: None,
            name: Some("Golem".into()),
            statuses: Vec::new(),
        };
        raid.add_boss(Boss::spawn(
            "b1".into(),
            &spawn,
            Arc::new(BossDefinition::inert("golem")),
            BossCategory::Main,
        ));
        raid.activate(Instant::now());
        raid.drain_events();
        raid
    }

    fn names(raid: &mut RaidState) -> Vec<&'static str> {
        raid.drain_events().iter().map(|o| o.event.name()).collect()
    }

    #[test]
    fn test_unstarted_raid_does_not_tick() {
        let mut raid = RaidState::new("battle:1", Arc::new(MapDefinition::open("a", 4)), Some(1));
        tick_raid(&mut raid, 1.0);
        assert!(raid.drain_events().is_empty());
        assert_eq!(raid.elapsed_ms, 0);
    }

    #[test]
    fn test_ap_regen_capped() {
        let mut raid = raid();
        tick_raid(&mut raid, 2.0);
        assert_eq!(raid.players[&1].ap, 7.0);
        tick_raid(&mut raid, 60.0);
        assert_eq!(raid.players[&1].ap, MAX_AP);
    }

    #[test]
    fn test_haste_scales_regen() {
        let mut raid = raid();
        raid.players
            .get_mut(&1)
            .unwrap()
            .statuses
            .add(StatusSpec::new(StatusKind::Haste).with_magnitude(0.5).with_duration_ms(10_000.0));
        tick_raid(&mut raid, 2.0);
        assert_eq!(raid.players[&1].ap, 8.0);
    }

    #[test]
    fn test_player_dot_ignores_defense() {
        let mut raid = raid();
        let p = raid.players.get_mut(&1).unwrap();
        p.def = 100;
        p.statuses.add(StatusSpec::new(StatusKind::Poison).with_magnitude(4.0).with_duration_ms(5000.0));

        tick_raid(&mut raid, 1.0);
        assert_eq!(raid.players[&1].hp, 46);
        let events = names(&mut raid);
        assert_eq!(events, vec!["player:damaged:tick", "cd:update", "state"]);
    }

    #[test]
    fn test_boss_dot_kill_ends_raid() {
        let mut raid = raid();
        raid.bosses
            .get_mut("b1")
            .unwrap()
            .statuses
            .add(StatusSpec::new(StatusKind::Burn).with_magnitude(25.0).with_duration_ms(5000.0));

        let outcome = tick_raid(&mut raid, 1.0);
        assert_eq!(outcome.finished, Some(RaidOutcome::Victory));
        assert_eq!(raid.reason(), Some("boss-dead"));

        let events = names(&mut raid);
        assert_eq!(events.iter().filter(|n| **n == "boss:death").count(), 1);
        assert!(events.contains(&"boss:damaged:tick"));

        let again = tick_raid(&mut raid, 1.0);
        assert!(again.finished.is_none(), "Over raids are not ticked");
    }

    #[test]
    fn test_second_dot_on_dead_boss_is_silent() {
        let mut raid = raid();
        let spawn = BossSpawn {
            id: "imp".into(),
            spawn: Some(TilePos::new(7, 7)),
            hp: Some(30),
            category: None,
            size: None,
            name: Some("Imp".into()),
            statuses: Vec::new(),
        };
        raid.add_boss(Boss::spawn(
            "b2".into(),
            &spawn,
            Arc::new(BossDefinition::inert("imp")),
            BossCategory::Sub,
        ));
        let golem = raid.bosses.get_mut("b1").unwrap();
        golem
            .statuses
            .add(StatusSpec::new(StatusKind::Burn).with_magnitude(25.0).with_duration_ms(5000.0));
        golem
            .statuses
            .add(StatusSpec::new(StatusKind::Poison).with_magnitude(25.0).with_duration_ms(5000.0));

        let outcome = tick_raid(&mut raid, 1.0);
        assert!(outcome.finished.is_none(), "Imp is still standing");

        let dmgs: Vec<i32> = raid
            .drain_events()
            .iter()
            .filter_map(|o| match &o.event {
                RaidEvent::BossDamagedTick { boss_id, dmg, .. } if boss_id == "b1" => Some(*dmg),
                _ => None,
            })
            .collect();
        assert_eq!(dmgs, vec![20], "Only the killing tick is reported");
    }

    #[test]
    fn test_defeat_skips_boss_ai() {
        let mut def = BossDefinition::inert("golem");
        def.phases = serde_json::from_str(
            r#"[{ "name": "p1", "randomEverySec": 0.1, "randomActions": [{ "type": "globalAoE", "dmg": 1 }] }]"#,
        )
        .unwrap();
        let mut raid = raid();
        raid.bosses.get_mut("b1").unwrap().definition = Arc::new(def);
        raid.players.get_mut(&1).unwrap().dead = true;

        let outcome = tick_raid(&mut raid, 1.0);
        assert_eq!(outcome.finished, Some(RaidOutcome::Defeat));
        assert!(outcome.dispatches.is_empty());
    }

    #[test]
    fn test_snapshot_time_advances() {
        let mut raid = raid();
        tick_raid(&mut raid, 0.5);
        tick_raid(&mut raid, 0.25);
        assert_eq!(raid.snapshot().t, 750);
    }
}
