//! The data files shipped in the workspace `data/` directory parse cleanly
//! and reference each other consistently.

use raid_core::boss::ActionKind;
use raid_core::data::DataStore;

fn bundled() -> DataStore {
    DataStore::new(concat!(env!("CARGO_MANIFEST_DIR"), "/../data"))
}

#[test]
fn test_town_map_loads() {
    let data = bundled();
    let map = data.try_map("town").expect("town map should parse");

    assert_eq!(map.id, "town");
    assert_eq!(map.n, 12);
    assert_eq!(map.tiles.len(), 12);
    assert!(map.tiles.iter().all(|row| row.len() == 12), "Map must be square");
    assert!(!map.passable(3, 9), "Walls block movement");
    assert!(!map.passable(11, 0), "Water blocks movement");
    assert!(map.passable(0, 0));

    assert_eq!(map.boss.len(), 1);
    assert_eq!(map.boss[0].id, "golem");
}

#[test]
fn test_every_referenced_boss_exists() {
    let data = bundled();
    let map = data.try_map("town").unwrap();

    let mut species: Vec<String> = map.boss.iter().map(|b| b.id.clone()).collect();
    let golem = data.try_boss("golem").expect("golem should parse");
    for phase in &golem.phases {
        for action in phase.on_phase_shift.iter().chain(&phase.random_actions) {
            if let ActionKind::SummonMinions(summon) = &action.kind {
                species.extend(summon.minions.iter().map(|m| m.id.clone()));
            }
        }
    }

    assert!(species.contains(&"imp".to_string()), "Golem summons imps");
    for id in species {
        let def = data.try_boss(&id).unwrap_or_else(|e| panic!("boss {id}: {e}"));
        assert!(!def.phases.is_empty(), "boss {id} has no phases");
    }
}

#[test]
fn test_boss_actions_are_supported() {
    let data = bundled();
    for id in ["golem", "imp"] {
        let def = data.try_boss(id).unwrap();
        let actions = def
            .phases
            .iter()
            .flat_map(|p| p.on_phase_shift.iter().chain(&p.random_actions))
            .chain(&def.timeline_once);
        for action in actions {
            assert!(
                !matches!(action.kind, ActionKind::Unsupported),
                "boss {id} has an unsupported action"
            );
        }
    }
}

#[test]
fn test_golem_phases_cover_full_hp_range() {
    let data = bundled();
    let golem = data.try_boss("golem").unwrap();

    assert_eq!(golem.phase_for(100.0).map(|p| p.name.as_str()), Some("awake"));
    assert_eq!(golem.phase_for(50.0).map(|p| p.name.as_str()), Some("awake"));
    assert_eq!(golem.phase_for(49.0).map(|p| p.name.as_str()), Some("enraged"));
    assert_eq!(golem.phase_for(0.0).map(|p| p.name.as_str()), Some("enraged"));
    assert_eq!(golem.timeline_once.len(), 2);
}

#[test]
fn test_skill_book_loads() {
    let data = bundled();
    let book = data.try_skills().expect("skills should parse");

    assert!(book.skills.len() >= 10);
    for id in ["slash", "cleave", "firebolt", "pierce", "mend", "bulwark", "provoke", "rally", "blink", "dash"] {
        assert!(book.get(id).is_some(), "missing skill {id}");
    }

    let mut ids: Vec<&str> = book.skills.iter().map(|s| s.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), book.skills.len(), "Skill ids must be unique");
}
