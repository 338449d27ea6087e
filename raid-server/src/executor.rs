//! Async half of boss actions.
//!
//! The telegraph is computed synchronously inside the tick, so `boss:windup`
//! goes out in the same batch as the snapshot that triggered it. Resolution
//! runs in a spawned task after the windup, against whatever the raid looks
//! like by then.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use raid_core::actions::{self, PreparedAction};
use raid_core::boss::ai::ActionDispatch;
use raid_core::raid::RaidState;

use crate::registry::RaidHandle;
use crate::service::RaidService;

/// Telegraph a dispatched action under the caller's lock and schedule its
/// resolution. Events queued here are drained by the caller.
pub fn dispatch(
    service: &RaidService,
    handle: &Arc<RaidHandle>,
    raid: &mut RaidState,
    dispatch: ActionDispatch,
) {
    let Some(prepared) = actions::prepare(raid, &dispatch.boss_uid, &dispatch.action) else {
        return;
    };
    debug!(
        raid_id = %handle.id,
        boss = %prepared.boss_uid,
        action = prepared.action.kind.tag(),
        windup_ms = prepared.windup_ms(),
        "Boss action telegraphed"
    );
    service.metrics.record_boss_action();

    let task = tokio::spawn(resolve_after_windup(
        service.clone(),
        Arc::clone(handle),
        prepared,
    ));
    handle.track(task);
}

async fn resolve_after_windup(service: RaidService, handle: Arc<RaidHandle>, prepared: PreparedAction) {
    let windup = prepared.windup_ms();
    if windup > 0 {
        tokio::time::sleep(Duration::from_millis(windup)).await;
    }

    let mut raid = handle.lock();
    actions::resolve(&mut raid, &prepared, service.data.as_ref());
    service.hub.publish(&handle.id, raid.drain_events());
}
