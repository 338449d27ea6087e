//! Boss definitions: phases, scripted timelines, and typed action kinds.
//!
//! Definitions are loaded from `bosses/<id>.json`. An action's `type` tag
//! selects one [`ActionKind`] variant, each with its own parameter struct;
//! the common fields (windup, flavour text, weight, timeline time) live on
//! [`BossAction`].

pub mod ai;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_LINE_LENGTH, DEFAULT_RANDOM_EVERY_SEC, MIN_RANDOM_EVERY_SEC};
use crate::grid::{BossSpawn, Footprint, TilePos};
use crate::status::StatusSpec;

/// Boss category: affects telegraph styling and narrative announcements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BossCategory {
    #[default]
    Main,
    Sub,
}

fn one() -> i32 {
    1
}

fn one_step() -> usize {
    1
}

fn default_line_length() -> i32 {
    DEFAULT_LINE_LENGTH
}

fn default_weight() -> f64 {
    1.0
}

fn full_range() -> [f64; 2] {
    [0.0, 100.0]
}

/// Circle of `radius` tiles around the boss or its target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaAttack {
    #[serde(default = "one")]
    pub radius: i32,
    #[serde(default)]
    pub dmg: i32,
}

/// Horizontal line through the boss row, `length` tiles each side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineAttack {
    #[serde(default = "default_line_length")]
    pub length: i32,
    #[serde(default)]
    pub dmg: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveToward {
    #[serde(default = "one_step")]
    pub max_steps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalAttack {
    #[serde(default)]
    pub dmg: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summon {
    #[serde(default)]
    pub minions: Vec<BossSpawn>,
}

/// Ground hazard installed as a tile override
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileHazard {
    pub tile: TilePos,
    #[serde(default)]
    pub dmg: i32,
    #[serde(default)]
    pub apply_status: Vec<StatusSpec>,
}

/// Who a boss status application lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTarget {
    #[default]
    Player,
    #[serde(rename = "self")]
    Own,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetedStatus {
    #[serde(flatten)]
    pub spec: StatusSpec,
    #[serde(default)]
    pub target: StatusTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusApplication {
    #[serde(default)]
    pub apply_status: Vec<TargetedStatus>,
}

/// Every action a boss script can dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ActionKind {
    AttackCircleSelf(AreaAttack),
    AttackCircleTarget(AreaAttack),
    AttackLineRow(LineAttack),
    MoveTowardNearest(MoveToward),
    #[serde(rename = "globalAoE")]
    GlobalAoe(GlobalAttack),
    SummonMinions(Summon),
    TileEffect(TileHazard),
    ApplyStatus(StatusApplication),
    /// Unknown `type` tags parse here and do nothing
    #[serde(other)]
    Unsupported,
}

impl ActionKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ActionKind::AttackCircleSelf(_) => "attackCircleSelf",
            ActionKind::AttackCircleTarget(_) => "attackCircleTarget",
            ActionKind::AttackLineRow(_) => "attackLineRow",
            ActionKind::MoveTowardNearest(_) => "moveTowardNearest",
            ActionKind::GlobalAoe(_) => "globalAoE",
            ActionKind::SummonMinions(_) => "summonMinions",
            ActionKind::TileEffect(_) => "tileEffect",
            ActionKind::ApplyStatus(_) => "applyStatus",
            ActionKind::Unsupported => "unsupported",
        }
    }
}

/// A scripted boss action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BossAction {
    #[serde(flatten)]
    pub kind: ActionKind,
    #[serde(default)]
    pub windup_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub say: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Clock time (seconds) for timeline actions
    #[serde(default)]
    pub t: f64,
}

impl BossAction {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            windup_ms: 0,
            say: None,
            name: None,
            key: None,
            id: None,
            action: None,
            weight: 1.0,
            t: 0.0,
        }
    }

    pub fn with_windup_ms(mut self, windup_ms: u64) -> Self {
        self.windup_ms = windup_ms;
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_say(mut self, say: impl Into<String>) -> Self {
        self.say = Some(say.into());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn at(mut self, t: f64) -> Self {
        self.t = t;
        self
    }

    /// Identity used by the once-per-second guard: `key`, then `id`, `name`,
    /// `action`, and finally the type tag
    pub fn guard_key(&self) -> &str {
        self.key
            .as_deref()
            .or(self.id.as_deref())
            .or(self.name.as_deref())
            .or(self.action.as_deref())
            .unwrap_or_else(|| self.kind.tag())
    }

    /// Weight for random selection; non-positive weights never win
    pub fn effective_weight(&self) -> f64 {
        if self.weight.is_finite() && self.weight > 0.0 {
            self.weight
        } else {
            0.0
        }
    }
}

/// A behaviour phase active over an HP-percentage range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    pub name: String,
    #[serde(default = "full_range")]
    pub range_hp_pct: [f64; 2],
    #[serde(default)]
    pub random_every_sec: Option<f64>,
    #[serde(default)]
    pub on_phase_shift: Vec<BossAction>,
    #[serde(default)]
    pub random_actions: Vec<BossAction>,
}

impl Phase {
    pub fn contains(&self, hp_pct: f64) -> bool {
        hp_pct >= self.range_hp_pct[0] && hp_pct <= self.range_hp_pct[1]
    }

    /// Seconds between random actions
    pub fn interval_secs(&self) -> f64 {
        self.random_every_sec
            .filter(|v| v.is_finite() && *v > 0.0)
            .unwrap_or(DEFAULT_RANDOM_EVERY_SEC)
            .max(MIN_RANDOM_EVERY_SEC)
    }
}

/// Static behaviour definition for one boss species
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BossDefinition {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub hp: Option<i32>,
    #[serde(default)]
    pub def: Option<i32>,
    #[serde(default)]
    pub size: Option<Footprint>,
    #[serde(default)]
    pub phases: Vec<Phase>,
    #[serde(default)]
    pub timeline_once: Vec<BossAction>,
}

impl BossDefinition {
    /// A definition with no behaviour; the boss just stands there
    pub fn inert(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            hp: None,
            def: None,
            size: None,
            phases: Vec::new(),
            timeline_once: Vec::new(),
        }
    }

    /// First phase whose range contains `hp_pct`, else the first phase
    pub fn phase_for(&self, hp_pct: f64) -> Option<&Phase> {
        self.phases
            .iter()
            .find(|p| p.contains(hp_pct))
            .or_else(|| self.phases.first())
    }

    pub fn phase(&self, name: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.name == name)
    }
}

/// Source of boss definitions for summons and raid setup
pub trait BossCatalog: Send + Sync {
    /// Always returns a definition; unknown ids yield an inert one
    fn boss_definition(&self, id: &str) -> Arc<BossDefinition>;
}

impl BossCatalog for HashMap<String, Arc<BossDefinition>> {
    fn boss_definition(&self, id: &str) -> Arc<BossDefinition> {
        self.get(id)
            .cloned()
            .unwrap_or_else(|| Arc::new(BossDefinition::inert(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOLEM: &str = r#"{
        "id": "golem", "name": "Stone Golem", "hp": 400, "def": 2,
        "phases": [
            { "name": "calm", "rangeHpPct": [50, 100], "randomEverySec": 2.5,
              "onPhaseShift": [{ "type": "applyStatus", "applyStatus": [{ "id": "fortify", "magnitude": 0.3, "target": "self" }] }],
              "randomActions": [
                { "type": "attackCircleSelf", "radius": 2, "dmg": 12, "windupMs": 800, "say": "The ground shakes!" },
                { "type": "moveTowardNearest", "maxSteps": 2, "weight": 3 }
              ] },
            { "name": "enraged", "rangeHpPct": [0, 49.99],
              "randomActions": [{ "type": "globalAoE", "dmg": 5 }, { "type": "meteorShower" }] }
        ],
        "timelineOnce": [{ "type": "tileEffect", "t": 5, "tile": { "x": 3, "y": 3 }, "dmg": 8,
                           "applyStatus": [{ "id": "burn", "magnitude": 4, "durationMs": 4000 }] }]
    }"#;

    fn golem() -> BossDefinition {
        serde_json::from_str(GOLEM).unwrap()
    }

    #[test]
    fn test_parse_typed_actions() {
        let def = golem();
        let calm = &def.phases[0];
        match &calm.random_actions[0].kind {
            ActionKind::AttackCircleSelf(a) => {
                assert_eq!(a.radius, 2);
                assert_eq!(a.dmg, 12);
            }
            other => panic!("unexpected action {other:?}"),
        }
        assert_eq!(calm.random_actions[0].windup_ms, 800);
        assert_eq!(calm.random_actions[1].weight, 3.0);
        assert!(matches!(
            calm.random_actions[1].kind,
            ActionKind::MoveTowardNearest(MoveToward { max_steps: 2 })
        ));
    }

    #[test]
    fn test_unknown_action_is_unsupported() {
        let def = golem();
        assert_eq!(def.phases[1].random_actions[1].kind, ActionKind::Unsupported);
        assert!(matches!(def.phases[1].random_actions[0].kind, ActionKind::GlobalAoe(_)));
    }

    #[test]
    fn test_status_targets() {
        let def = golem();
        match &def.phases[0].on_phase_shift[0].kind {
            ActionKind::ApplyStatus(app) => {
                assert_eq!(app.apply_status[0].target, StatusTarget::Own);
                assert_eq!(app.apply_status[0].spec.magnitude, 0.3);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_timeline_time_and_hazard() {
        let def = golem();
        let hazard = &def.timeline_once[0];
        assert_eq!(hazard.t, 5.0);
        match &hazard.kind {
            ActionKind::TileEffect(h) => {
                assert_eq!(h.tile, TilePos::new(3, 3));
                assert_eq!(h.apply_status[0].duration_ms, 4000.0);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_phase_selection() {
        let def = golem();
        assert_eq!(def.phase_for(100.0).unwrap().name, "calm");
        assert_eq!(def.phase_for(50.0).unwrap().name, "calm");
        assert_eq!(def.phase_for(20.0).unwrap().name, "enraged");
        assert_eq!(def.phase_for(49.995).unwrap().name, "calm", "Gaps fall back to the first phase");
    }

    #[test]
    fn test_interval_floor() {
        let def = golem();
        assert_eq!(def.phases[0].interval_secs(), 2.5);
        assert_eq!(def.phases[1].interval_secs(), DEFAULT_RANDOM_EVERY_SEC);
        let mut fast = def.phases[0].clone();
        fast.random_every_sec = Some(0.01);
        assert_eq!(fast.interval_secs(), MIN_RANDOM_EVERY_SEC);
    }

    #[test]
    fn test_guard_key_precedence() {
        let action = BossAction::new(ActionKind::GlobalAoe(GlobalAttack { dmg: 1 }));
        assert_eq!(action.guard_key(), "globalAoE");
        let action = action.with_key("nova");
        assert_eq!(action.guard_key(), "nova");
    }

    #[test]
    fn test_guard_key_falls_back_through_id_and_action() {
        let left: BossAction =
            serde_json::from_str(r#"{ "type": "globalAoE", "dmg": 3, "id": "wave-left", "name": "Wave" }"#).unwrap();
        let right: BossAction =
            serde_json::from_str(r#"{ "type": "globalAoE", "dmg": 3, "id": "wave-right", "name": "Wave" }"#).unwrap();
        assert_eq!(left.guard_key(), "wave-left", "id wins over name");
        assert_ne!(left.guard_key(), right.guard_key(), "Same-type actions stay distinct by id");

        let tagged: BossAction =
            serde_json::from_str(r#"{ "type": "globalAoE", "dmg": 3, "action": "pulse" }"#).unwrap();
        assert_eq!(tagged.guard_key(), "pulse", "action is used before the type tag");

        let keyed: BossAction =
            serde_json::from_str(r#"{ "type": "globalAoE", "key": "k", "id": "i", "action": "a" }"#).unwrap();
        assert_eq!(keyed.guard_key(), "k");
    }

    #[test]
    fn test_catalog_falls_back_to_inert() {
        let catalog: HashMap<String, Arc<BossDefinition>> = HashMap::new();
        let def = catalog.boss_definition("ghost");
        assert_eq!(def.id, "ghost");
        assert!(def.phases.is_empty());
    }
}
