//! Control loop thread body and the single control cycle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, error, trace, warn};
use std::{
    sync::{atomic::Ordering, Arc},
    thread,
    time::Instant
};

// Internal
use super::Shared;
use crate::{
    limits::{LimitReport, Limits},
    model::Command,
    params::Params
};
use util::time::period_from_frequency;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Execute control cycles until the stop flag is raised.
///
/// Cycles are scheduled on absolute deadlines so that the loop doesn't drift.
/// A cycle whose measured period differs from the target by more than the
/// timing tolerance is reported but never aborts the loop.
pub(crate) fn run(shared: Arc<Shared>) {
    debug!("Control loop running");

    let mut cycle_start_instant = Instant::now();

    while !shared.stop.load(Ordering::SeqCst) {
        let params = shared.params.get();

        let period = match period_from_frequency(params.control_frequency_hz) {
            Some(p) => p,
            None => {
                error!(
                    "Invalid control frequency {} Hz, stopping the control loop",
                    params.control_frequency_hz
                );
                break
            }
        };

        let report = tick(&shared, &params, period.as_secs_f64());
        if report.any() {
            trace!("Command limited: {:?}", report);
        }

        // ---- CYCLE MANAGEMENT ----

        let deadline = cycle_start_instant + period;
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        }

        let cycle_dur = Instant::now() - cycle_start_instant;
        let timing_ratio = (cycle_dur.as_secs_f64() - period.as_secs_f64())
            / period.as_secs_f64();

        if timing_ratio.abs() > params.timing_tolerance {
            let num_violations = shared.timing_violations.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                "Loop frequency violation #{}: off by {:.0}%",
                num_violations,
                timing_ratio * 100.0
            );
        }

        cycle_start_instant = deadline;
        shared.ticks.fetch_add(1, Ordering::Relaxed);
    }

    debug!("Control loop exited");
}

/// Run one control cycle of length `dt` seconds.
pub(crate) fn tick(shared: &Shared, params: &Params, dt: f64) -> LimitReport {
    let limits = Limits::new(params);
    let model = &shared.model;

    let goal = model.get_goal();
    let state = model.get_state();
    let current = model.get_command();

    // Speed is controlled in throttle space
    let throttle_error = limits.speed_to_throttle(goal.speed_ms)
        - limits.speed_to_throttle(state.speed_ms);
    let error = model.get_error();

    let (throttle_delta, steering_rad) = {
        let mut pids = shared.pids.lock();
        pids.refresh(params);

        (
            pids.speed.get_command(throttle_error, dt),
            pids.heading.get_command(error.heading_rad, dt)
        )
    };

    let desired = Command {
        throttle: current.throttle + throttle_delta,
        steering_rad,
        steering_rate_rads: 0.0
    };

    let (command, report) = limits.limit(state.speed_ms, &current, desired, dt);

    model.command(command.throttle, command.steering_rad, dt);

    report
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        controller::PidPair,
        model::Model,
        params::SharedParams
    };
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU64};

    fn shared(params: Params) -> Shared {
        let handle = SharedParams::new(params).unwrap();
        Shared {
            model: Model::new(handle.clone()),
            pids: Mutex::new(PidPair::new(&params)),
            params: handle,
            stop: AtomicBool::new(false),
            ticks: AtomicU64::new(0),
            timing_violations: AtomicU64::new(0)
        }
    }

    #[test]
    fn test_tick_accelerates_towards_goal() {
        let params = Params::new(1.0, 0.5, 1.0, 1.0).unwrap();
        let s = shared(params);
        s.model.set_goal(2.0, 0.0);

        let report = tick(&s, &params, 0.01);

        // From rest only 5 m/s^2 * 0.01 s is reachable
        assert!(report.acceleration_limited);
        assert!((s.model.get_state().speed_ms - 0.05).abs() < 1e-12);
        assert!((s.model.get_command().throttle - 0.005).abs() < 1e-12);
    }

    #[test]
    fn test_ticks_converge() {
        let params = Params::new(1.0, 0.5, 1.0, 1.0).unwrap();
        let s = shared(params);
        s.model.set_goal(2.0, 0.8);

        for _ in 0..2000 {
            tick(&s, &params, 0.01);
        }

        let e = s.model.get_error();
        assert!(e.speed_ms.abs() < 1e-3, "speed error {}", e.speed_ms);
        assert!(e.heading_rad.abs() < 1e-3, "heading error {}", e.heading_rad);
    }

    #[test]
    fn test_steering_never_exceeds_max() {
        let params = Params::new(1.0, 0.3, 1.0, 5.0).unwrap();
        let s = shared(params);
        s.model.set_goal(1.0, 3.0);

        for _ in 0..200 {
            tick(&s, &params, 0.01);
            assert!(s.model.get_command().steering_rad.abs() <= 0.3);
        }
    }
}
