//! Player skill definitions, loaded from `skills/skills.json`.

use serde::{Deserialize, Serialize};

use crate::status::StatusSpec;

/// Area shape a skill resolves against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillShape {
    /// Relocate the caster
    Move,
    /// Relocate the caster, same rules as `Move`
    Teleport,
    #[default]
    Single,
    Circle,
}

impl SkillShape {
    pub fn is_relocation(self) -> bool {
        matches!(self, SkillShape::Move | SkillShape::Teleport)
    }
}

/// Who a skill status application lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillStatusTarget {
    #[serde(rename = "self")]
    Caster,
    Ally,
    #[default]
    Enemy,
    Boss,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillStatus {
    #[serde(flatten)]
    pub spec: StatusSpec,
    #[serde(default)]
    pub target: SkillStatusTarget,
}

fn default_range() -> i32 {
    1
}

fn default_radius() -> i32 {
    1
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub shape: SkillShape,
    #[serde(default = "default_range")]
    pub range: i32,
    #[serde(default = "default_radius")]
    pub radius: i32,
    #[serde(default)]
    pub ap_cost: i32,
    /// Seconds before the skill can be cast again
    #[serde(default)]
    pub cooldown: f64,
    /// Number of `1..=atk` rolls summed for damage
    #[serde(default)]
    pub dmg: u32,
    /// Damage that replaces the rolls when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_dmg: Option<i32>,
    #[serde(default)]
    pub heal: i32,
    #[serde(default)]
    pub ignore_defense: bool,
    #[serde(default = "yes")]
    pub hits_bosses: bool,
    #[serde(default)]
    pub apply_status: Vec<SkillStatus>,
}

impl SkillDefinition {
    /// Display label, falling back to the id
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Contents of `skills/skills.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillBook {
    #[serde(default)]
    pub skills: Vec<SkillDefinition>,
}

impl SkillBook {
    pub fn get(&self, id: &str) -> Option<&SkillDefinition> {
        self.skills.iter().find(|s| s.id == id)
    }

    /// Resolve a loadout, silently dropping unknown ids
    pub fn loadout<'a, I>(&self, ids: I) -> Vec<SkillDefinition>
    where
        I: IntoIterator<Item = &'a str>,
    {
        ids.into_iter()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .filter_map(|id| self.get(id).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusKind;

    const BOOK: &str = r#"{ "skills": [
        { "id": "slash", "name": "Slash", "apCost": 2, "cooldown": 1.5, "dmg": 2 },
        { "id": "blink", "name": "Blink", "shape": "teleport", "range": 3, "apCost": 3, "cooldown": 8 },
        { "id": "provoke", "shape": "circle", "radius": 2, "range": 2, "apCost": 1,
          "applyStatus": [{ "id": "taunt", "durationMs": 4000 }] },
        { "id": "adrenaline", "fixedDmg": 40, "ignoreDefense": true, "hitsBosses": false, "range": 0,
          "applyStatus": [{ "id": "adrenaline", "magnitude": 1.5, "target": "self" }] }
    ] }"#;

    #[test]
    fn test_skill_defaults() {
        let book: SkillBook = serde_json::from_str(BOOK).unwrap();
        let slash = book.get("slash").unwrap();
        assert_eq!(slash.shape, SkillShape::Single);
        assert_eq!(slash.range, 1);
        assert!(slash.hits_bosses);
        assert!(slash.fixed_dmg.is_none());
    }

    #[test]
    fn test_status_targets_default_to_enemy() {
        let book: SkillBook = serde_json::from_str(BOOK).unwrap();
        let provoke = book.get("provoke").unwrap();
        assert_eq!(provoke.apply_status[0].target, SkillStatusTarget::Enemy);
        assert_eq!(provoke.apply_status[0].spec.id, StatusKind::Taunt);
        assert_eq!(provoke.label(), "provoke");

        let adrenaline = book.get("adrenaline").unwrap();
        assert_eq!(adrenaline.apply_status[0].target, SkillStatusTarget::Caster);
        assert!(!adrenaline.hits_bosses);
    }

    #[test]
    fn test_loadout_drops_unknown() {
        let book: SkillBook = serde_json::from_str(BOOK).unwrap();
        let loadout = book.loadout(["slash", " blink ", "", "fireball"]);
        let ids: Vec<_> = loadout.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["slash", "blink"]);
        assert!(book.get("blink").unwrap().shape.is_relocation());
    }
}
