use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use std::time::Instant;

use raid_core::boss::{BossCategory, BossDefinition};
use raid_core::grid::{BossSpawn, Footprint, LegendEntry, MapDefinition, TilePos};
use raid_core::pathfinding::{bfs_path_for_boss, find_target};
use raid_core::raid::{Boss, Player, RaidState};
use raid_core::simulation::tick_raid;

fn spawn(x: i32, y: i32, size: i32) -> BossSpawn {
    BossSpawn {
        id: "golem".into(),
        spawn: Some(TilePos::new(x, y)),
        hp: Some(400),
        category: None,
        size: Some(Footprint { w: size, h: size }),
        name: None,
        statuses: Vec::new(),
    }
}

fn crowded_raid(n: i32) -> RaidState {
    let mut map = MapDefinition::open("bench", n);
    // A wall down the middle with a single gap
    for y in 0..n - 1 {
        map.tiles[y as usize][(n / 2) as usize] = 1;
    }
    map.legend.insert(
        "1".into(),
        LegendEntry {
            name: Some("wall".into()),
            passable: Some(false),
        },
    );

    let mut raid = RaidState::new("battle:bench", Arc::new(map), Some(42));
    let def = Arc::new(BossDefinition::inert("golem"));
    raid.add_boss(Boss::spawn("big".into(), &spawn(0, 0, 2), def.clone(), BossCategory::Main));
    raid.add_boss(Boss::spawn("imp".into(), &spawn(n - 2, 2, 1), def, BossCategory::Sub));
    for i in 0..8 {
        raid.add_player(Player::new(i + 1, format!("P{i}"), TilePos::new(n - 1, 4 + i as i32), 100));
    }
    raid
}

fn bench_pathfinding(c: &mut Criterion) {
    let raid = crowded_raid(24);

    c.bench_function("bfs_path_short", |b| {
        b.iter(|| {
            bfs_path_for_boss(&raid, black_box(TilePos::new(0, 0)), TilePos::new(4, 4), 3, "big")
        })
    });

    c.bench_function("bfs_path_around_wall", |b| {
        b.iter(|| {
            bfs_path_for_boss(&raid, black_box(TilePos::new(0, 0)), TilePos::new(20, 2), 64, "big")
        })
    });

    c.bench_function("bfs_path_unreachable", |b| {
        b.iter(|| {
            bfs_path_for_boss(&raid, black_box(TilePos::new(0, 0)), TilePos::new(23, 6), 64, "big")
        })
    });
}

fn bench_targeting(c: &mut Criterion) {
    let mut raid = crowded_raid(24);
    c.bench_function("find_target_random", |b| {
        b.iter(|| find_target(&mut raid, black_box("big")))
    });
}

fn bench_tick(c: &mut Criterion) {
    let mut raid = crowded_raid(24);
    raid.activate(Instant::now());
    c.bench_function("tick_raid_idle", |b| {
        b.iter(|| {
            tick_raid(&mut raid, black_box(1.0 / 15.0));
            raid.drain_events()
        })
    });
}

criterion_group!(benches, bench_pathfinding, bench_targeting, bench_tick);
criterion_main!(benches);
