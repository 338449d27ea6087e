//! Centralized simulation constants for the raid core.
//!
//! Data-driven values (boss stats, skill costs) live in JSON files under the
//! data directory; these are the rules that hold for every raid.

// =====================================================
// Tick Loop
// =====================================================

/// Fixed simulation frequency in ticks per second
pub const TICK_HZ: u32 = 15;

/// Minimum time an ended raid stays resident for late spectators (ms)
pub const MIN_RETENTION_MS: u64 = 15_000;

/// Default time an ended raid stays resident (ms)
pub const DEFAULT_RETENTION_MS: u64 = 300_000;

// =====================================================
// Action Points
// =====================================================

/// AP regenerated per second before haste/slow modifiers
pub const AP_REGEN_PER_SEC: f64 = 1.0;

/// AP ceiling for every player
pub const MAX_AP: f64 = 10.0;

/// AP cost of a single-tile move
pub const MOVE_AP_COST: f64 = 1.0;

// =====================================================
// Combat
// =====================================================

/// Upper bound on damage dealt by a single hit
pub const DAMAGE_CAP: i32 = 999;

/// Upper bound for every derived multiplier
pub const MODIFIER_CAP: f64 = 10_000.0;

/// Chance that a player hit on a boss is flagged as critical (cosmetic only)
pub const COSMETIC_CRIT_CHANCE: f64 = 0.2;

// =====================================================
// Status Effects
// =====================================================

/// Stack ceiling when an application does not declare one
pub const DEFAULT_MAX_STACKS: u32 = 5;

/// Duration of an application that does not declare one (ms)
pub const DEFAULT_STATUS_DURATION_MS: f64 = 3_000.0;

/// Period of DOT/HOT hooks (ms)
pub const PERIODIC_TICK_MS: f64 = 1_000.0;

// =====================================================
// Boss AI
// =====================================================

/// Random-action interval when a phase does not declare one (seconds)
pub const DEFAULT_RANDOM_EVERY_SEC: f64 = 3.0;

/// Lower bound on the random-action interval (seconds)
pub const MIN_RANDOM_EVERY_SEC: f64 = 0.1;

/// Row attack half-length when an action does not declare one
pub const DEFAULT_LINE_LENGTH: i32 = 4;

// =====================================================
// Raid Setup
// =====================================================

/// Random spawn attempts before falling back to `FALLBACK_SPAWN`
pub const SPAWN_ATTEMPTS: u32 = 30;

/// Spawn tile used when no random passable tile was found
pub const FALLBACK_SPAWN: (i32, i32) = (2, 2);

/// Map loaded when a team has no dungeon assignment or its map is missing
pub const DEFAULT_MAP: &str = "town";

/// Boss species spawned when a map declares none
pub const DEFAULT_BOSS_ID: &str = "golem";

/// HP of the default boss spawn
pub const DEFAULT_BOSS_HP: i32 = 400;

/// HP of a boss whose spawn and definition both omit it
pub const FALLBACK_BOSS_HP: i32 = 100;
