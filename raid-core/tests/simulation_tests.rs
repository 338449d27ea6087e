//! End-to-end raid scenarios driven synchronously: ticks, boss actions
//! (prepare, then resolve after the caller's windup), and player input.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use raid_core::actions::{prepare, resolve};
use raid_core::boss::{ActionKind, BossAction, BossCategory, BossDefinition, GlobalAttack};
use raid_core::events::{Outgoing, RaidEvent};
use raid_core::grid::{BossSpawn, MapDefinition, TilePos};
use raid_core::input::{handle_move, handle_skill};
use raid_core::raid::{Boss, Player, RaidOutcome, RaidState, RewardsRecord};
use raid_core::simulation::tick_raid;
use raid_core::skills::SkillBook;
use raid_core::status::{StatusKind, StatusSpec};

type Catalog = HashMap<String, Arc<BossDefinition>>;

const SKILLS: &str = r#"{ "skills": [
    { "id": "slash", "name": "Slash", "shape": "single", "range": 1, "apCost": 2, "cooldown": 1.5, "fixedDmg": 15 }
] }"#;

fn spawn(x: i32, y: i32, hp: i32) -> BossSpawn {
    BossSpawn {
        id: "golem".into(),
        spawn: Some(TilePos::new(x, y)),
        hp: Some(hp),
        category: None,
        size: None,
        name: Some("Golem".into()),
        statuses: Vec::new(),
    }
}

fn raid_with_boss(definition: BossDefinition, hp: i32) -> RaidState {
    let map = Arc::new(MapDefinition::open("arena", 10));
    let mut raid = RaidState::new("battle:7", map, Some(17)).with_team(7, "Vanguard");
    raid.add_boss(Boss::spawn(
        "b1".into(),
        &spawn(5, 5, hp),
        Arc::new(definition),
        BossCategory::Main,
    ));
    raid
}

fn start(raid: &mut RaidState) {
    raid.activate(Instant::now());
    raid.drain_events();
}

fn count(events: &[Outgoing], name: &str) -> usize {
    events.iter().filter(|o| o.event.name() == name).count()
}

/// Prepare and immediately resolve every dispatched action
fn run_dispatches(raid: &mut RaidState, actions: &[(String, BossAction)], catalog: &Catalog) {
    let prepared: Vec<_> = actions
        .iter()
        .filter_map(|(uid, action)| prepare(raid, uid, action))
        .collect();
    for p in &prepared {
        resolve(raid, p, catalog);
    }
}

#[test]
fn test_player_kills_boss_and_raid_ends_in_victory() {
    let book: SkillBook = serde_json::from_str(SKILLS).unwrap();
    let mut raid = raid_with_boss(BossDefinition::inert("golem"), 10);
    raid.add_player(
        Player::new(1, "Ari", TilePos::new(4, 5), 40).with_skills(book.loadout(["slash"])),
    );
    start(&mut raid);

    assert!(handle_skill(&mut raid, 1, "slash", TilePos::new(5, 5)));
    assert_eq!(raid.bosses["b1"].hp, 0, "15 raw into 10 hp with no defense");

    let outcome = tick_raid(&mut raid, 1.0 / 15.0);
    assert_eq!(outcome.finished, Some(RaidOutcome::Victory));
    assert!(raid.is_over());

    // Any later hit or tick must not announce the death again
    assert!(!handle_skill(&mut raid, 1, "slash", TilePos::new(5, 5)));
    tick_raid(&mut raid, 1.0);

    let events = raid.drain_events();
    assert_eq!(count(&events, "boss:death"), 1, "Death announced exactly once");
    assert_eq!(count(&events, "raid:over"), 0, "raid:over waits for rewards");

    assert!(raid.record_rewards(RewardsRecord::new(0, raid.dungeon_id().to_string(), Vec::new())));
    assert!(!raid.record_rewards(RewardsRecord::new(1, "town", Vec::new())));
    let events = raid.drain_events();
    assert_eq!(count(&events, "raid:over"), 1);
}

#[test]
fn test_shield_soaks_part_of_boss_hit() {
    let mut raid = raid_with_boss(BossDefinition::inert("golem"), 100);
    let mut player = Player::new(1, "Ari", TilePos::new(0, 0), 50);
    player.statuses.add(
        StatusSpec::new(StatusKind::Shield)
            .with_magnitude(20.0)
            .with_duration_ms(5_000.0),
    );
    raid.add_player(player);
    start(&mut raid);

    let hit = BossAction::new(ActionKind::GlobalAoe(GlobalAttack { dmg: 40 }));
    run_dispatches(&mut raid, &[("b1".into(), hit)], &Catalog::new());

    let player = &raid.players[&1];
    assert_eq!(player.hp, 30, "20 absorbed, 20 taken");
    assert!(!player.statuses.has(&StatusKind::Shield), "Shield fully consumed");

    let events = raid.drain_events();
    let hits = events.iter().find_map(|o| match &o.event {
        RaidEvent::PlayersDamaged { hits, .. } => Some(hits.clone()),
        _ => None,
    });
    assert_eq!(hits.unwrap()[0].dmg, 20);
}

#[test]
fn test_wipe_is_defeat_and_stops_boss_actions() {
    let definition: BossDefinition = serde_json::from_str(
        r#"{ "id": "golem", "phases": [{ "name": "p1", "randomEverySec": 0.5,
               "randomActions": [{ "type": "globalAoE", "dmg": 100, "windupMs": 400 }] }] }"#,
    )
    .unwrap();
    let mut raid = raid_with_boss(definition, 100);
    raid.add_player(Player::new(1, "Ari", TilePos::new(0, 0), 30));
    raid.add_player(Player::new(2, "Bo", TilePos::new(9, 9), 30));
    start(&mut raid);

    let outcome = tick_raid(&mut raid, 1.0);
    assert!(!outcome.dispatches.is_empty(), "Random pool fires within a second");
    let dispatched: Vec<_> = outcome
        .dispatches
        .into_iter()
        .map(|d| (d.boss_uid, d.action))
        .collect();

    // Hold one prepared action back to land after the wipe
    let late = prepare(&mut raid, "b1", &dispatched[0].1).unwrap();
    run_dispatches(&mut raid, &dispatched, &Catalog::new());
    assert!(raid.players.values().all(|p| p.dead), "Both players fall together");

    let outcome = tick_raid(&mut raid, 0.1);
    assert_eq!(outcome.finished, Some(RaidOutcome::Defeat));
    assert_eq!(raid.reason(), Some("all-dead"));
    assert!(outcome.dispatches.is_empty());

    raid.drain_events();
    resolve(&mut raid, &late, &Catalog::new());
    for _ in 0..10 {
        let outcome = tick_raid(&mut raid, 1.0);
        assert!(outcome.dispatches.is_empty(), "No dispatch after defeat");
    }
    assert!(raid.drain_events().is_empty(), "Ended raid stays silent");
}

#[test]
fn test_target_tracking_attack_lands_where_target_stands_at_resolve() {
    let definition: BossDefinition = serde_json::from_str(
        r#"{ "id": "golem", "timelineOnce": [
               { "type": "attackCircleTarget", "radius": 0, "dmg": 10, "windupMs": 1000, "t": 0 } ] }"#,
    )
    .unwrap();
    let mut raid = raid_with_boss(definition, 100);
    raid.add_player(Player::new(1, "Ari", TilePos::new(2, 2), 50));
    start(&mut raid);

    let outcome = tick_raid(&mut raid, 0.0);
    assert_eq!(outcome.dispatches.len(), 1);
    let dispatch = &outcome.dispatches[0];
    let prepared = prepare(&mut raid, &dispatch.boss_uid, &dispatch.action).unwrap();
    assert_eq!(prepared.windup_ms(), 1000);
    assert_eq!(prepared.tiles, vec![TilePos::new(2, 2)], "Telegraph on the target");

    // The target steps away during the windup
    assert!(handle_move(&mut raid, 1, TilePos::new(3, 3)));
    tick_raid(&mut raid, 1.0);
    resolve(&mut raid, &prepared, &Catalog::new());

    assert_eq!(raid.players[&1].hp, 40, "Hit follows the target to (3,3)");
    let events = raid.drain_events();
    let tiles = events.iter().find_map(|o| match &o.event {
        RaidEvent::BossAttack { tiles, .. } => Some(tiles.clone()),
        _ => None,
    });
    assert_eq!(tiles, Some(vec![TilePos::new(3, 3)]));
}

#[test]
fn test_hazard_triggers_once_when_stepped_on() {
    let definition: BossDefinition = serde_json::from_str(
        r#"{ "id": "golem", "timelineOnce": [
               { "type": "tileEffect", "tile": { "x": 1, "y": 0 }, "dmg": 7,
                 "applyStatus": [{ "id": "poison", "magnitude": 2, "durationMs": 3000 }],
                 "name": "Spikes", "t": 0 } ] }"#,
    )
    .unwrap();
    let mut raid = raid_with_boss(definition, 100);
    raid.add_player(Player::new(1, "Ari", TilePos::new(0, 0), 50).with_stats(3, 5));
    start(&mut raid);

    let outcome = tick_raid(&mut raid, 0.0);
    let actions: Vec<_> = outcome
        .dispatches
        .into_iter()
        .map(|d| (d.boss_uid, d.action))
        .collect();
    run_dispatches(&mut raid, &actions, &Catalog::new());
    assert_eq!(raid.tile_overrides.len(), 1);
    raid.drain_events();

    assert!(handle_move(&mut raid, 1, TilePos::new(1, 0)));
    let player = &raid.players[&1];
    assert_eq!(player.hp, 43, "Trap damage ignores defense");
    assert_eq!(player.statuses.get(&StatusKind::Poison).unwrap().src, "trap");
    assert!(raid.tile_overrides.is_empty(), "Hazard consumed");

    let events = raid.drain_events();
    assert_eq!(count(&events, "players:damaged"), 1);
    assert_eq!(count(&events, "status:apply"), 1);
    assert_eq!(count(&events, "tile:Overrides"), 1);

    assert!(handle_move(&mut raid, 1, TilePos::new(0, 0)));
    assert!(handle_move(&mut raid, 1, TilePos::new(1, 0)));
    assert_eq!(raid.players[&1].hp, 43, "Second visit is harmless");
}

#[test]
fn test_cooldowns_reach_only_their_owner() {
    let book: SkillBook = serde_json::from_str(SKILLS).unwrap();
    let mut raid = raid_with_boss(BossDefinition::inert("golem"), 100);
    raid.add_player(
        Player::new(1, "Ari", TilePos::new(4, 5), 40).with_skills(book.loadout(["slash"])),
    );
    raid.add_player(Player::new(2, "Bo", TilePos::new(0, 0), 40));
    start(&mut raid);

    assert!(handle_skill(&mut raid, 1, "slash", TilePos::new(5, 5)));
    assert!(!handle_skill(&mut raid, 1, "slash", TilePos::new(5, 5)), "On cooldown");
    raid.drain_events();

    tick_raid(&mut raid, 1.0);
    let events = raid.drain_events();
    for o in events.iter().filter(|o| o.event.name() == "cd:update") {
        let RaidEvent::CooldownUpdate { cd } = &o.event else {
            unreachable!()
        };
        match o.audience {
            raid_core::events::Audience::Player(1) => assert_eq!(cd.get("slash"), Some(&0.5)),
            raid_core::events::Audience::Player(2) => assert!(cd.is_empty()),
            other => panic!("cd:update sent to {other:?}"),
        }
    }

    tick_raid(&mut raid, 0.5);
    assert!(handle_skill(&mut raid, 1, "slash", TilePos::new(5, 5)), "Ready again");
}
