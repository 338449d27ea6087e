//! Fixed-rate tick driver.
//!
//! One tokio interval advances every running raid, then sweeps ended raids
//! past their retention. Each raid computes its own dt from the last tick
//! it saw, so a late interval simply produces a larger step.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use raid_core::simulation::tick_raid;

use crate::executor;
use crate::lifecycle;
use crate::registry::RaidHandle;
use crate::service::RaidService;

/// Spawn the driver; abort the handle to stop it
pub fn spawn_tick_loop(service: RaidService) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = service.config.tick_interval();
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(tick_hz = service.config.tick_hz, "Tick loop started");
        loop {
            interval.tick().await;
            tick_all(&service, Instant::now());
        }
    })
}

/// Advance every running raid once and sweep expired ones
pub fn tick_all(service: &RaidService, now: Instant) {
    let handles = service.registry.handles();
    let mut running = 0;
    for handle in &handles {
        if tick_one(service, handle, now) {
            running += 1;
        }
    }
    service.metrics.record_tick(running);

    for id in service.registry.sweep(now, service.config.retention()) {
        service.hub.remove(&id);
        info!(raid_id = %id, "Raid evicted after retention");
    }
}

/// Returns whether the raid was running at the start of the tick
pub fn tick_one(service: &RaidService, handle: &Arc<RaidHandle>, now: Instant) -> bool {
    let finished = {
        let mut raid = handle.lock();
        if !raid.is_running() {
            return false;
        }
        let dt = raid.take_dt(now.into_std());
        let outcome = tick_raid(&mut raid, dt);
        for dispatch in outcome.dispatches {
            executor::dispatch(service, handle, &mut raid, dispatch);
        }
        service.hub.publish(&handle.id, raid.drain_events());
        outcome.finished
    };

    if let Some(outcome) = finished {
        debug!(raid_id = %handle.id, result = outcome.as_str(), "Tick ended raid");
        lifecycle::spawn_termination(service, handle);
    }
    true
}
