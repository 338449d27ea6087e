//! Victory rewards.
//!
//! Every row of the dungeon's reward table is rolled once; a successful roll
//! grants the reward to every eligible participant. Eligibility requires a
//! raid permit, and one permit is consumed from each player who received
//! anything. Failures are isolated per player and never abort the others.

use std::collections::{BTreeMap, HashSet};

use rand::Rng;
use tracing::{debug, error, warn};

use raid_core::raid::{PlayerId, RewardGrant, RewardKind};

use crate::storage::repository::{PermitSlot, RewardRepo, RewardRow};

/// A raid member at the moment the raid ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub ch_id: PlayerId,
    pub name: String,
}

fn parse_kind(raw: &str) -> Option<RewardKind> {
    match raw.trim().to_uppercase().as_str() {
        "ITEM" => Some(RewardKind::Item),
        "KEYWORD" => Some(RewardKind::Keyword),
        _ => None,
    }
}

/// Percent chance clamped to `0..=100`, non-finite treated as 0
fn clamp_chance(chance: f64) -> f64 {
    if chance.is_finite() {
        chance.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Roll and grant rewards for `dungeon_id`, returning the item grants
pub async fn grant_rewards<R: Rng + Send>(
    repo: &dyn RewardRepo,
    dungeon_id: &str,
    participants: &[Participant],
    rng: &mut R,
) -> Vec<RewardGrant> {
    let table = match repo.reward_table(dungeon_id).await {
        Ok(rows) => rows,
        Err(e) => {
            error!(dungeon = dungeon_id, error = %e, "Failed to load reward table");
            Vec::new()
        }
    };
    if table.is_empty() {
        debug!(dungeon = dungeon_id, "No rewards configured");
        return Vec::new();
    }

    let eligible = eligible_players(repo, participants).await;
    if eligible.is_empty() {
        debug!(dungeon = dungeon_id, "No participant holds a raid permit");
        return Vec::new();
    }

    let mut grants = Vec::new();
    let mut rewarded: HashSet<PlayerId> = HashSet::new();

    for row in &table {
        let Some(kind) = parse_kind(&row.kind) else {
            warn!(dungeon = dungeon_id, kind = %row.kind, "Unknown reward type");
            continue;
        };
        let chance = clamp_chance(row.chance);
        if rng.gen::<f64>() * 100.0 >= chance {
            continue;
        }
        let count = row.count.max(1);

        match kind {
            RewardKind::Item => {
                grant_item(repo, row, count, &eligible, &mut grants, &mut rewarded).await;
            }
            RewardKind::Keyword => {
                for (who, _) in eligible.values() {
                    match repo.grant_keyword(who.ch_id, &row.reward_id).await {
                        Ok(()) => {
                            rewarded.insert(who.ch_id);
                        }
                        Err(e) => {
                            warn!(ch_id = who.ch_id, keyword = %row.reward_id, error = %e, "Keyword grant failed");
                        }
                    }
                }
            }
        }
    }

    for (who, slot) in eligible.values() {
        if !rewarded.contains(&who.ch_id) {
            continue;
        }
        if let Err(e) = repo.consume_permit(*slot).await {
            warn!(ch_id = who.ch_id, error = %e, "Failed to consume raid permit");
        }
    }

    grants
}

async fn eligible_players<'a>(
    repo: &dyn RewardRepo,
    participants: &'a [Participant],
) -> BTreeMap<PlayerId, (&'a Participant, PermitSlot)> {
    let mut eligible = BTreeMap::new();
    for who in participants {
        match repo.find_permit(who.ch_id).await {
            Ok(Some(slot)) => {
                eligible.insert(who.ch_id, (who, slot));
            }
            Ok(None) => debug!(ch_id = who.ch_id, "No raid permit, skipping rewards"),
            Err(e) => warn!(ch_id = who.ch_id, error = %e, "Permit check failed, skipping rewards"),
        }
    }
    eligible
}

async fn grant_item(
    repo: &dyn RewardRepo,
    row: &RewardRow,
    count: i32,
    eligible: &BTreeMap<PlayerId, (&Participant, PermitSlot)>,
    grants: &mut Vec<RewardGrant>,
    rewarded: &mut HashSet<PlayerId>,
) {
    let item = match repo.get_item(&row.reward_id).await {
        Ok(Some(item)) => item,
        Ok(None) => {
            warn!(item = %row.reward_id, "Reward item does not exist");
            return;
        }
        Err(e) => {
            error!(item = %row.reward_id, error = %e, "Failed to look up reward item");
            return;
        }
    };

    for (who, _) in eligible.values() {
        match repo.grant_item(who.ch_id, &who.name, &item, count).await {
            Ok(()) => {
                rewarded.insert(who.ch_id);
                grants.push(RewardGrant {
                    player_id: who.ch_id,
                    kind: RewardKind::Item,
                    reward_id: item.it_name.clone(),
                    img: item.it_img.clone(),
                    count,
                });
            }
            Err(e) => {
                warn!(ch_id = who.ch_id, item = %item.it_id, error = %e, "Item grant failed");
            }
        }
    }
}
