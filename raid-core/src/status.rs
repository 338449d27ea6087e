//! Status effects: buffs, debuffs, damage/heal over time.
//!
//! Every entity (player or boss) carries a [`StatusEffects`] list holding at
//! most one live entry per [`StatusKind`]. Re-applying an effect refreshes it
//! and adds stacks up to the cap; `taunt` is always replaced wholesale.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_STACKS, DEFAULT_STATUS_DURATION_MS, MODIFIER_CAP, PERIODIC_TICK_MS,
};
use crate::raid::PlayerId;

/// Status effect identifiers.
///
/// Identifiers come from data files, so anything unrecognised is kept
/// verbatim in [`StatusKind::Other`] and simply has no mechanical effect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StatusKind {
    // Periodic
    Burn,
    Poison,
    Bleed,
    Regen,

    // Control
    Stun,
    Taunt,
    Reflect,

    // Modifiers
    Haste,
    Slow,
    Vuln,
    Fortify,
    Empower,
    Adrenaline,
    Shield,

    Other(String),
}

impl StatusKind {
    pub fn as_str(&self) -> &str {
        match self {
            StatusKind::Burn => "burn",
            StatusKind::Poison => "poison",
            StatusKind::Bleed => "bleed",
            StatusKind::Regen => "regen",
            StatusKind::Stun => "stun",
            StatusKind::Taunt => "taunt",
            StatusKind::Reflect => "reflect",
            StatusKind::Haste => "haste",
            StatusKind::Slow => "slow",
            StatusKind::Vuln => "vuln",
            StatusKind::Fortify => "fortify",
            StatusKind::Empower => "empower",
            StatusKind::Adrenaline => "adrenaline",
            StatusKind::Shield => "shield",
            StatusKind::Other(id) => id,
        }
    }

    /// Damage over time kinds fire the DOT hook once per second
    pub fn is_dot(&self) -> bool {
        matches!(self, StatusKind::Burn | StatusKind::Poison | StatusKind::Bleed)
    }

    /// Heal over time kinds fire the HOT hook once per second
    pub fn is_hot(&self) -> bool {
        matches!(self, StatusKind::Regen)
    }
}

impl From<String> for StatusKind {
    fn from(id: String) -> Self {
        match id.as_str() {
            "burn" => StatusKind::Burn,
            "poison" => StatusKind::Poison,
            "bleed" => StatusKind::Bleed,
            "regen" => StatusKind::Regen,
            "stun" => StatusKind::Stun,
            "taunt" => StatusKind::Taunt,
            "reflect" => StatusKind::Reflect,
            "haste" => StatusKind::Haste,
            "slow" => StatusKind::Slow,
            "vuln" | "vulnerable" => StatusKind::Vuln,
            "fortify" => StatusKind::Fortify,
            "empower" => StatusKind::Empower,
            "adrenaline" => StatusKind::Adrenaline,
            "shield" => StatusKind::Shield,
            _ => StatusKind::Other(id),
        }
    }
}

impl From<StatusKind> for String {
    fn from(kind: StatusKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_source() -> String {
    "system".to_string()
}

fn default_stacks() -> u32 {
    1
}

fn default_duration_ms() -> f64 {
    DEFAULT_STATUS_DURATION_MS
}

fn default_magnitude() -> f64 {
    1.0
}

fn default_max_stacks() -> u32 {
    DEFAULT_MAX_STACKS
}

/// One application of a status effect, as declared by a skill, a boss
/// action, or a tile hazard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSpec {
    pub id: StatusKind,
    #[serde(default = "default_source")]
    pub src: String,
    #[serde(default = "default_stacks")]
    pub stacks: u32,
    #[serde(default = "default_duration_ms")]
    pub duration_ms: f64,
    #[serde(default = "default_magnitude")]
    pub magnitude: f64,
    #[serde(default = "default_max_stacks")]
    pub max_stacks: u32,
    /// Player a taunt points at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taunter: Option<PlayerId>,
}

impl StatusSpec {
    pub fn new(id: StatusKind) -> Self {
        Self {
            id,
            src: default_source(),
            stacks: 1,
            duration_ms: DEFAULT_STATUS_DURATION_MS,
            magnitude: 1.0,
            max_stacks: DEFAULT_MAX_STACKS,
            taunter: None,
        }
    }

    pub fn with_source(mut self, src: impl Into<String>) -> Self {
        self.src = src.into();
        self
    }

    pub fn with_stacks(mut self, stacks: u32) -> Self {
        self.stacks = stacks;
        self
    }

    pub fn with_max_stacks(mut self, max_stacks: u32) -> Self {
        self.max_stacks = max_stacks;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_magnitude(mut self, magnitude: f64) -> Self {
        self.magnitude = magnitude;
        self
    }

    pub fn with_taunter(mut self, taunter: PlayerId) -> Self {
        self.taunter = Some(taunter);
        self
    }
}

/// A live status effect on an entity
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEffect {
    pub id: StatusKind,
    pub src: String,
    pub stacks: u32,
    pub max_stacks: u32,
    pub duration_ms: f64,
    pub remain_ms: f64,
    pub magnitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taunter: Option<PlayerId>,
    /// Time accumulated toward the next periodic hook
    #[serde(skip)]
    accum_ms: f64,
}

impl StatusEffect {
    fn from_spec(spec: StatusSpec) -> Self {
        let max_stacks = spec.max_stacks.max(1);
        let duration_ms = finite_or_zero(spec.duration_ms).max(0.0);
        Self {
            id: spec.id,
            src: spec.src,
            stacks: spec.stacks.max(1).min(max_stacks),
            max_stacks,
            duration_ms,
            remain_ms: duration_ms,
            magnitude: finite_or_zero(spec.magnitude),
            taunter: spec.taunter,
            accum_ms: 0.0,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.remain_ms <= 0.0
    }

    /// Amount one periodic hook delivers
    pub fn periodic_amount(&self) -> i32 {
        let amount = (self.magnitude * self.stacks as f64).floor();
        amount.clamp(0.0, i32::MAX as f64) as i32
    }
}

/// Combat modifiers folded from every active effect
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Modifiers {
    pub ap_regen_mul: f64,
    pub dmg_taken_mul: f64,
    pub dmg_dealt_mul: f64,
    pub flat_shield: i32,
}

impl Default for Modifiers {
    fn default() -> Self {
        Self {
            ap_regen_mul: 1.0,
            dmg_taken_mul: 1.0,
            dmg_dealt_mul: 1.0,
            flat_shield: 0,
        }
    }
}

/// A periodic hook fired while ticking
#[derive(Debug, Clone, PartialEq)]
pub enum PeriodicTick {
    Dot { id: StatusKind, amount: i32 },
    Hot { id: StatusKind, amount: i32 },
}

/// Convert a magnitude to an additive delta.
///
/// Values inside `(-1, 1)` are already additive; anything else is a
/// multiplier (`1.3` means `+0.3`).
pub fn to_additive(magnitude: f64) -> f64 {
    if !magnitude.is_finite() {
        0.0
    } else if magnitude > -1.0 && magnitude < 1.0 {
        magnitude
    } else {
        magnitude - 1.0
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn clamp_multiplier(add: f64) -> f64 {
    let mul = 1.0 + add;
    if mul.is_nan() {
        1.0
    } else {
        mul.clamp(0.0, MODIFIER_CAP)
    }
}

/// Active status effects on one entity
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StatusEffects {
    effects: Vec<StatusEffect>,
}

impl StatusEffects {
    /// Insert or refresh an effect.
    ///
    /// Refreshing adds the incoming stacks up to the cap and overwrites
    /// magnitude and duration; remaining time resets to the new duration.
    pub fn add(&mut self, spec: StatusSpec) {
        if spec.id == StatusKind::Taunt {
            self.effects.retain(|e| e.id != StatusKind::Taunt);
            self.effects.push(StatusEffect::from_spec(spec));
            return;
        }

        match self.effects.iter_mut().find(|e| e.id == spec.id) {
            Some(existing) => {
                let incoming = StatusEffect::from_spec(spec);
                existing.max_stacks = incoming.max_stacks;
                existing.stacks = existing
                    .stacks
                    .saturating_add(incoming.stacks)
                    .min(incoming.max_stacks);
                existing.magnitude = incoming.magnitude;
                existing.duration_ms = incoming.duration_ms;
                existing.remain_ms = incoming.duration_ms;
                existing.src = incoming.src;
                existing.taunter = incoming.taunter;
            }
            None => self.effects.push(StatusEffect::from_spec(spec)),
        }
    }

    pub fn remove(&mut self, id: &StatusKind) {
        self.effects.retain(|e| &e.id != id);
    }

    pub fn has(&self, id: &StatusKind) -> bool {
        self.effects.iter().any(|e| &e.id == id)
    }

    pub fn get(&self, id: &StatusKind) -> Option<&StatusEffect> {
        self.effects.iter().find(|e| &e.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatusEffect> {
        self.effects.iter()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Player the active taunt points at, if any
    pub fn taunter(&self) -> Option<PlayerId> {
        self.get(&StatusKind::Taunt).and_then(|e| e.taunter)
    }

    /// Fold every effect into combat modifiers, each clamped to `[0, 10000]`
    pub fn compute_modifiers(&self) -> Modifiers {
        let mut ap_add = 0.0;
        let mut taken_add = 0.0;
        let mut dealt_add = 0.0;
        let mut shield = 0.0;

        for e in &self.effects {
            let stacks = e.stacks as f64;
            match e.id {
                StatusKind::Haste => ap_add += to_additive(e.magnitude) * stacks,
                StatusKind::Slow => ap_add -= to_additive(e.magnitude).abs() * stacks,
                StatusKind::Vuln => taken_add += to_additive(e.magnitude).abs() * stacks,
                StatusKind::Fortify => taken_add -= to_additive(e.magnitude).abs() * stacks,
                StatusKind::Empower | StatusKind::Adrenaline => {
                    dealt_add += to_additive(e.magnitude) * stacks
                }
                StatusKind::Shield => shield += e.magnitude * stacks,
                _ => {}
            }
        }

        Modifiers {
            ap_regen_mul: clamp_multiplier(ap_add),
            dmg_taken_mul: clamp_multiplier(taken_add),
            dmg_dealt_mul: clamp_multiplier(dealt_add),
            flat_shield: finite_or_zero(shield.floor()).clamp(0.0, i32::MAX as f64) as i32,
        }
    }

    /// Advance every effect by `dt_ms`.
    ///
    /// Periodic kinds fire once per full elapsed second; expired entries are
    /// removed after the accumulator pass so a final second still fires.
    pub fn tick(&mut self, dt_ms: f64) -> Vec<PeriodicTick> {
        let dt = finite_or_zero(dt_ms).max(0.0);
        let mut fired = Vec::new();

        for e in &mut self.effects {
            e.remain_ms -= dt;
            if !e.id.is_dot() && !e.id.is_hot() {
                continue;
            }
            e.accum_ms += dt;
            while e.accum_ms >= PERIODIC_TICK_MS {
                e.accum_ms -= PERIODIC_TICK_MS;
                let amount = e.periodic_amount();
                if amount == 0 {
                    continue;
                }
                if e.id.is_dot() {
                    fired.push(PeriodicTick::Dot { id: e.id.clone(), amount });
                } else {
                    fired.push(PeriodicTick::Hot { id: e.id.clone(), amount });
                }
            }
        }

        self.effects.retain(|e| !e.is_expired());
        fired
    }

    /// Absorb up to the flat shield total from `dmg`, debiting shield stacks.
    ///
    /// Returns the damage left over. Each shield pays `magnitude` per stack;
    /// partially used stacks are consumed whole.
    pub fn absorb(&mut self, dmg: i32) -> i32 {
        let flat = self.compute_modifiers().flat_shield;
        if dmg <= 0 || flat <= 0 {
            return dmg;
        }

        let absorbed = flat.min(dmg);
        let mut left = absorbed as f64;
        for e in self.effects.iter_mut().filter(|e| e.id == StatusKind::Shield) {
            if left <= 0.0 {
                break;
            }
            let per = if e.magnitude > 0.0 { e.magnitude } else { 1.0 };
            let take = left.min(per * e.stacks as f64);
            if take <= 0.0 {
                continue;
            }
            let used = (take / per.max(1.0)).ceil() as u32;
            e.stacks = e.stacks.saturating_sub(used);
            left -= take;
        }
        self.effects
            .retain(|e| !(e.id == StatusKind::Shield && e.stacks == 0));

        dmg - absorbed
    }
}
