//! Boss AI orchestrator.
//!
//! Each tick advances every living boss's clock and decides which scripted
//! actions to dispatch: phase on-enter lists, one-shot timeline entries, and
//! weighted random picks from the active phase's pool. Dispatched actions are
//! returned to the caller, which runs their windup and resolution.

use std::sync::Arc;

use rand::Rng;
use tracing::debug;

use super::BossAction;
use crate::raid::{Boss, RaidState};

/// A boss action picked for execution this tick
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDispatch {
    pub boss_uid: String,
    pub action: BossAction,
}

/// Step the AI of every living boss by `dt` seconds
pub fn step_bosses(raid: &mut RaidState, dt: f64) -> Vec<ActionDispatch> {
    if raid.is_over() {
        return Vec::new();
    }

    let uids: Vec<String> = raid
        .bosses
        .values()
        .filter(|b| b.is_alive())
        .map(|b| b.uid.clone())
        .collect();

    let mut out = Vec::new();
    for uid in uids {
        if let Some((boss, rng)) = raid.boss_with_rng(&uid) {
            step_boss(boss, rng, dt, &mut out);
        }
    }
    out
}

/// Advance one boss and collect its dispatches
pub fn step_boss<R: Rng + ?Sized>(
    boss: &mut Boss,
    rng: &mut R,
    dt: f64,
    out: &mut Vec<ActionDispatch>,
) {
    let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
    boss.clock += dt;

    let def = Arc::clone(&boss.definition);
    let phase = def.phase_for(boss.hp_pct());

    if let Some(phase) = phase {
        if boss.phase.as_deref() != Some(phase.name.as_str()) {
            debug!(boss = %boss.uid, phase = %phase.name, "Phase shift");
            boss.phase = Some(phase.name.clone());
            boss.random_timer = rng.gen::<f64>() * phase.interval_secs();

            if boss.phases_entered.insert(phase.name.clone()) {
                for action in &phase.on_phase_shift {
                    dispatch_guarded(boss, action, out);
                }
            }
        }
    }

    for (index, action) in def.timeline_once.iter().enumerate() {
        if boss.clock >= action.t && !boss.once_done.contains(&index) {
            boss.once_done.insert(index);
            dispatch_guarded(boss, action, out);
        }
    }

    let Some(phase) = phase else {
        return;
    };
    if phase.random_actions.is_empty() {
        return;
    }

    let interval = phase.interval_secs();
    boss.random_timer -= dt;
    while boss.random_timer <= 0.0 {
        if let Some(action) = weighted_pick(&phase.random_actions, rng) {
            dispatch_guarded(boss, action, out);
        }
        boss.random_timer += interval;
    }
}

/// Weighted choice; the last entry absorbs floating-point leftovers
pub fn weighted_pick<'a, R: Rng + ?Sized>(
    pool: &'a [BossAction],
    rng: &mut R,
) -> Option<&'a BossAction> {
    let sum: f64 = pool.iter().map(BossAction::effective_weight).sum();
    if sum <= 0.0 {
        return None;
    }
    let mut r = rng.gen::<f64>() * sum;
    for action in pool {
        r -= action.effective_weight();
        if r <= 0.0 {
            return Some(action);
        }
    }
    pool.last()
}

/// Dispatch unless the same logical action already ran this clock second
fn dispatch_guarded(boss: &mut Boss, action: &BossAction, out: &mut Vec<ActionDispatch>) {
    let second = boss.clock.floor() as i64;
    let key = action.guard_key().to_string();
    if boss.last_exec_sec.get(&key) == Some(&second) {
        debug!(boss = %boss.uid, action = %key, "Suppressed duplicate dispatch");
        return;
    }
    boss.last_exec_sec.insert(key, second);
    debug!(boss = %boss.uid, action = action.kind.tag(), "Dispatch");
    out.push(ActionDispatch {
        boss_uid: boss.uid.clone(),
        action: action.clone(),
    });
}
