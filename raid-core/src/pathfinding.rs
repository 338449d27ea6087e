//! Collision-aware boss movement and target selection.

use std::collections::{HashMap, VecDeque};

use rand::seq::SliceRandom;

use crate::events::RaidEvent;
use crate::grid::{Footprint, TilePos};
use crate::raid::{Boss, PlayerId, RaidState};

const DIRECTIONS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Whether boss `uid` could stand with its top-left corner on `pos`.
///
/// Every covered cell must be in bounds and passable, free of players, and
/// outside every other boss's footprint.
pub fn can_place_boss(raid: &RaidState, pos: TilePos, uid: &str) -> bool {
    let Some(boss) = raid.bosses.get(uid) else {
        return false;
    };
    let size = boss.size;

    for cell in size.cells(pos) {
        if !raid.map.passable(cell.x, cell.y) {
            return false;
        }
    }
    if raid.players.values().any(|p| size.covers(pos, p.pos)) {
        return false;
    }
    raid.bosses
        .values()
        .filter(|other| other.uid != uid)
        .all(|other| !footprints_overlap(pos, size, other.pos, other.size))
}

fn footprints_overlap(a: TilePos, a_size: Footprint, b: TilePos, b_size: Footprint) -> bool {
    let (a_size, b_size) = (a_size.normalized(), b_size.normalized());
    a.x < b.x + b_size.w && b.x < a.x + a_size.w && a.y < b.y + b_size.h && b.y < a.y + a_size.h
}

/// Breadth-first path for a boss from `start` toward `goal`.
///
/// Neighbours are filtered by [`can_place_boss`] when enqueued. If the goal
/// cannot be reached the path leads to the explored node closest to it by
/// Manhattan distance. The result holds at most `max_steps + 1` nodes and
/// always starts at `start`.
pub fn bfs_path_for_boss(
    raid: &RaidState,
    start: TilePos,
    goal: TilePos,
    max_steps: usize,
    uid: &str,
) -> Vec<TilePos> {
    if start == goal {
        return vec![start];
    }

    let mut prev: HashMap<TilePos, Option<TilePos>> = HashMap::new();
    prev.insert(start, None);
    let mut queue = VecDeque::from([start]);
    let mut best = start;
    let mut best_dist = start.manhattan(goal);
    let mut reached = None;

    while let Some(cur) = queue.pop_front() {
        if cur == goal {
            reached = Some(cur);
            break;
        }
        for (dx, dy) in DIRECTIONS {
            let next = TilePos::new(cur.x + dx, cur.y + dy);
            if prev.contains_key(&next) || !can_place_boss(raid, next, uid) {
                continue;
            }
            prev.insert(next, Some(cur));
            queue.push_back(next);

            let d = next.manhattan(goal);
            if d < best_dist {
                best_dist = d;
                best = next;
            }
        }
    }

    let mut path = Vec::new();
    let mut node = Some(reached.unwrap_or(best));
    while let Some(t) = node {
        path.push(t);
        node = prev.get(&t).copied().flatten();
    }
    path.reverse();
    path.truncate(max_steps + 1);
    path
}

/// Move a boss to the last node of `path`, if it can stand there
pub fn boss_move(raid: &mut RaidState, uid: &str, path: &[TilePos]) -> bool {
    let Some(&to) = path.last() else {
        return false;
    };
    if !can_place_boss(raid, to, uid) {
        return false;
    }
    let Some(boss) = raid.bosses.get_mut(uid) else {
        return false;
    };
    if boss.pos == to {
        return false;
    }
    boss.pos = to;
    raid.emit(RaidEvent::BossMove {
        boss_id: uid.to_string(),
        to,
    });
    true
}

/// Pick the player a boss goes after.
///
/// A live taunt pointing at a living player wins; otherwise a uniformly
/// random living player.
pub fn find_target(raid: &mut RaidState, uid: &str) -> Option<PlayerId> {
    let taunter = raid.bosses.get(uid).and_then(|b| b.statuses.taunter());
    if let Some(id) = taunter {
        if raid.players.get(&id).is_some_and(|p| p.is_alive()) {
            return Some(id);
        }
    }

    let alive: Vec<PlayerId> = raid
        .players
        .values()
        .filter(|p| p.is_alive())
        .map(|p| p.id)
        .collect();
    alive.choose(raid.rng()).copied()
}

/// Shortest Manhattan distance from any cell of the boss footprint
pub fn footprint_distance(boss: &Boss, target: TilePos) -> i32 {
    boss.footprint()
        .map(|cell| cell.manhattan(target))
        .min()
        .unwrap_or(i32::MAX)
}

pub fn is_target_in_range(boss: &Boss, target: TilePos, range: i32) -> bool {
    footprint_distance(boss, target) <= range
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boss::{BossCategory, BossDefinition};
    use crate::grid::{BossSpawn, LegendEntry, MapDefinition};
    use crate::raid::Player;
    use crate::status::{StatusKind, StatusSpec};
    use std::sync::Arc;

    fn spawn(id: &str, x: i32, y: i32, w: i32) -> BossSpawn {
        BossSpawn {
            id: id.into(),
            spawn: Some(TilePos::new(x, y)),
            hp: Some(50),
            category: None,
            size: Some(Footprint { w, h: w }),
            name: None,
            statuses: Vec::new(),
        }
    }

    fn raid_with(map: MapDefinition) -> RaidState {
        let mut raid = RaidState::new("battle:1", Arc::new(map), Some(11));
        let def = Arc::new(BossDefinition::inert("golem"));
        raid.add_boss(Boss::spawn("big".into(), &spawn("golem", 0, 0, 2), def.clone(), BossCategory::Main));
        raid.add_boss(Boss::spawn("imp".into(), &spawn("imp", 6, 0, 1), def, BossCategory::Sub));
        raid
    }

    #[test]
    fn test_placement_rules() {
        let mut raid = raid_with(MapDefinition::open("arena", 8));
        raid.add_player(Player::new(1, "Ari", TilePos::new(3, 3), 50));

        assert!(can_place_boss(&raid, TilePos::new(1, 0), "big"), "Own footprint is ignored");
        assert!(!can_place_boss(&raid, TilePos::new(2, 2), "big"), "Player at (3,3)");
        assert!(!can_place_boss(&raid, TilePos::new(5, 0), "big"), "Overlaps imp");
        assert!(!can_place_boss(&raid, TilePos::new(7, 7), "big"), "Out of bounds");
        assert!(!can_place_boss(&raid, TilePos::new(0, 0), "ghost"));
    }

    #[test]
    fn test_path_truncated_to_max_steps() {
        let raid = raid_with(MapDefinition::open("arena", 8));
        let path = bfs_path_for_boss(&raid, TilePos::new(0, 0), TilePos::new(0, 6), 2, "big");
        assert_eq!(path.len(), 3);
        assert_eq!(path[0], TilePos::new(0, 0));
        assert_eq!(path[2], TilePos::new(0, 2));
    }

    #[test]
    fn test_unreachable_goal_falls_back_to_closest() {
        let mut raid = raid_with(MapDefinition::open("arena", 8));
        raid.add_player(Player::new(1, "Ari", TilePos::new(0, 6), 50));

        let path = bfs_path_for_boss(&raid, TilePos::new(0, 0), TilePos::new(0, 6), 20, "big");
        let last = *path.last().unwrap();
        assert_eq!(last, TilePos::new(1, 6), "Closest placement beside the player");
        assert!(path.iter().all(|t| can_place_boss(&raid, *t, "big")));
    }

    #[test]
    fn test_walls_are_routed_around() {
        let mut map = MapDefinition::open("cave", 5);
        map.legend.insert("1".into(), LegendEntry { name: None, passable: Some(false) });
        for y in 0..4 {
            map.tiles[y][2] = 1;
        }
        let mut raid = RaidState::new("battle:2", Arc::new(map), Some(1));
        raid.add_boss(Boss::spawn(
            "b".into(),
            &spawn("golem", 0, 0, 1),
            Arc::new(BossDefinition::inert("golem")),
            BossCategory::Main,
        ));

        let path = bfs_path_for_boss(&raid, TilePos::new(0, 0), TilePos::new(4, 0), 50, "b");
        assert_eq!(path.last(), Some(&TilePos::new(4, 0)));
        assert!(path.contains(&TilePos::new(2, 4)), "Only gap is the bottom row");
    }

    #[test]
    fn test_boss_move_emits() {
        let mut raid = raid_with(MapDefinition::open("arena", 8));
        assert!(boss_move(&mut raid, "big", &[TilePos::new(0, 0), TilePos::new(0, 1)]));
        assert_eq!(raid.bosses["big"].pos, TilePos::new(0, 1));
        assert!(!boss_move(&mut raid, "big", &[]));
        assert_eq!(raid.drain_events().len(), 1);
    }

    #[test]
    fn test_taunt_overrides_random_target() {
        let mut raid = raid_with(MapDefinition::open("arena", 8));
        for id in 1..=4 {
            raid.add_player(Player::new(id, format!("p{id}"), TilePos::new(id as i32, 5), 50));
        }
        raid.bosses
            .get_mut("big")
            .unwrap()
            .statuses
            .add(StatusSpec::new(StatusKind::Taunt).with_taunter(3));

        for _ in 0..20 {
            assert_eq!(find_target(&mut raid, "big"), Some(3));
        }

        raid.players.get_mut(&3).unwrap().dead = true;
        let target = find_target(&mut raid, "big").unwrap();
        assert_ne!(target, 3, "Dead taunter is not resolvable");
    }

    #[test]
    fn test_range_uses_nearest_footprint_cell() {
        let raid = raid_with(MapDefinition::open("arena", 8));
        let boss = &raid.bosses["big"];
        assert_eq!(footprint_distance(boss, TilePos::new(3, 1)), 2);
        assert!(is_target_in_range(boss, TilePos::new(3, 1), 2));
        assert!(!is_target_in_range(boss, TilePos::new(4, 4), 2));
    }
}
