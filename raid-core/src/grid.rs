//! Static tile maps and tile-set helpers.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};

use crate::boss::BossCategory;
use crate::constants::{FALLBACK_SPAWN, SPAWN_ATTEMPTS};
use crate::status::StatusSpec;

/// A grid cell coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: TilePos) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// King-move distance: 1 for any orthogonal or diagonal neighbour
    pub fn chebyshev(self, other: TilePos) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

/// Width and height of an entity in tiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footprint {
    #[serde(default = "one")]
    pub w: i32,
    #[serde(default = "one")]
    pub h: i32,
}

fn one() -> i32 {
    1
}

impl Default for Footprint {
    fn default() -> Self {
        Self { w: 1, h: 1 }
    }
}

impl Footprint {
    /// Clamp both sides to at least one tile
    pub fn normalized(self) -> Self {
        Self {
            w: self.w.max(1),
            h: self.h.max(1),
        }
    }

    /// Every cell covered when the top-left corner sits at `origin`
    pub fn cells(self, origin: TilePos) -> impl Iterator<Item = TilePos> {
        let Footprint { w, h } = self.normalized();
        (0..h).flat_map(move |dy| (0..w).map(move |dx| TilePos::new(origin.x + dx, origin.y + dy)))
    }

    pub fn covers(self, origin: TilePos, tile: TilePos) -> bool {
        let Footprint { w, h } = self.normalized();
        tile.x >= origin.x && tile.x < origin.x + w && tile.y >= origin.y && tile.y < origin.y + h
    }
}

/// Legend entry describing one tile code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passable: Option<bool>,
}

/// Boss placement declared by a map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossSpawn {
    pub id: String,
    #[serde(default)]
    pub spawn: Option<TilePos>,
    #[serde(default)]
    pub hp: Option<i32>,
    #[serde(default, rename = "type")]
    pub category: Option<BossCategory>,
    #[serde(default)]
    pub size: Option<Footprint>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub statuses: Vec<StatusSpec>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<BossSpawn>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(BossSpawn),
        Many(Vec<BossSpawn>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(spawn)) => vec![spawn],
        Some(OneOrMany::Many(spawns)) => spawns,
        None => Vec::new(),
    })
}

/// A static map: `n`×`n` grid of tile codes plus a legend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDefinition {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub n: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_size: Option<u32>,
    #[serde(default)]
    pub legend: HashMap<String, LegendEntry>,
    pub tiles: Vec<Vec<i32>>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub boss: Vec<BossSpawn>,
    #[serde(default)]
    pub assets: serde_json::Value,
}

impl MapDefinition {
    /// An all-floor map, mostly for tests and tooling
    pub fn open(id: &str, n: i32) -> Self {
        let side = n.max(0) as usize;
        Self {
            id: id.to_string(),
            name: id.to_string(),
            n,
            tile_size: None,
            legend: HashMap::new(),
            tiles: vec![vec![0; side]; side],
            boss: Vec::new(),
            assets: serde_json::Value::Null,
        }
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.n && y < self.n
    }

    /// Base tile code at a cell
    pub fn tile(&self, x: i32, y: i32) -> Option<i32> {
        if !self.in_bounds(x, y) {
            return None;
        }
        self.tiles.get(y as usize)?.get(x as usize).copied()
    }

    /// Out of bounds is blocked; unknown codes and missing flags are passable
    pub fn passable(&self, x: i32, y: i32) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        match self.tile(x, y) {
            Some(code) => self
                .legend
                .get(&code.to_string())
                .and_then(|entry| entry.passable)
                .unwrap_or(true),
            None => true,
        }
    }

    /// In-bounds cells within euclidean `radius` of `center`
    pub fn tiles_in_circle(&self, center: TilePos, radius: i32) -> Vec<TilePos> {
        tiles_in_circle(center, radius)
            .into_iter()
            .filter(|t| self.in_bounds(t.x, t.y))
            .collect()
    }

    pub fn all_tiles(&self) -> Vec<TilePos> {
        (0..self.n)
            .flat_map(|y| (0..self.n).map(move |x| TilePos::new(x, y)))
            .collect()
    }

    /// Cells of the row through `center.y`, `length` either side, in bounds
    pub fn row_tiles(&self, center: TilePos, length: i32) -> Vec<TilePos> {
        let length = length.max(0);
        (-length..=length)
            .map(|dx| TilePos::new(center.x + dx, center.y))
            .filter(|t| self.in_bounds(t.x, t.y))
            .collect()
    }

    /// Random passable tile, falling back to a fixed cell after a few misses
    pub fn random_passable_tile<R: Rng + ?Sized>(&self, rng: &mut R) -> TilePos {
        if self.n > 0 {
            for _ in 0..SPAWN_ATTEMPTS {
                let x = rng.gen_range(0..self.n);
                let y = rng.gen_range(0..self.n);
                if self.passable(x, y) {
                    return TilePos::new(x, y);
                }
            }
        }
        TilePos::new(FALLBACK_SPAWN.0, FALLBACK_SPAWN.1)
    }
}

/// Cells within euclidean `radius` of `center`, unbounded
pub fn tiles_in_circle(center: TilePos, radius: i32) -> Vec<TilePos> {
    let r = radius.max(0);
    let mut out = Vec::new();
    for y in center.y - r..=center.y + r {
        for x in center.x - r..=center.x + r {
            let (dx, dy) = (x - center.x, y - center.y);
            if dx * dx + dy * dy <= r * r {
                out.push(TilePos::new(x, y));
            }
        }
    }
    out
}
