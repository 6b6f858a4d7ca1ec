//! Process lifecycle (spec.md §4.10, ambient): bootstraps every component
//! onto one [`Hub`] and one [`Scheduler`], and owns startup/shutdown.
//!
//! There is no `original_source` analogue for this module — the Python
//! source's `main.py` (not retrieved) is presumed to do this wiring
//! imperatively; `Reactor` gives it a named, testable shape, grounded in the
//! teacher's own `wf-runtime::lifecycle::Reactor` (bootstrap/run/shutdown,
//! `TaskGroup`-style ordered construction), adapted from the teacher's
//! multi-task async groups to this crate's single scheduler queue.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::ThreadRng;
use rk_config::Configuration;
use rk_core::drivers::{MotorDriver, SonarDriver};
use rk_core::geofence::Geofence;

use crate::error::RuntimeResult;
use crate::estimator::MonteCarloEstimator;
use crate::hub::Hub;
use crate::log_macros::rk_info;
use crate::motor_controller::MotorController;
use crate::navigator::Navigator;
use crate::scheduler::Scheduler;
use crate::sonar::Sonar;

/// How often the signal-bridge task checks the shared shutdown flag.
const SIGNAL_POLL_MS: u64 = 100;

/// Owns every long-lived component and the scheduler/hub they share.
///
/// `bootstrap` builds the geofence, the estimator, and the three services in
/// dependency order, then `run` publishes `StartRequest` and drives the
/// scheduler to completion. `TerminateRequest` is the only message that
/// causes a clean exit: each service already cancels its own periodic task
/// on `TerminateRequest` (see their `Consumer::send` impls), which empties
/// the scheduler's queue and lets `run` return on its own.
pub struct Reactor {
    scheduler: Scheduler,
    hub: Hub,
    estimator: Rc<RefCell<MonteCarloEstimator<ThreadRng>>>,
    shutdown_requested: Arc<AtomicBool>,
}

impl Reactor {
    /// Build every component, calling each `initialise`-equivalent
    /// constructor once, in dependency order (geofence before the estimator
    /// that owns one; drivers before the services that wrap them).
    ///
    /// The motor and sonar services are generic over their driver trait at
    /// construction time only — once registered on the hub they are held as
    /// `Rc<RefCell<dyn Consumer>>`, so `Reactor` itself carries no driver
    /// type parameters.
    pub fn bootstrap<D, S>(conf: &Configuration, motor_driver: D, sonar_driver: S) -> RuntimeResult<Self>
    where
        D: MotorDriver + 'static,
        S: SonarDriver + 'static,
    {
        let scheduler = Scheduler::new();
        let hub = Hub::new(scheduler.clone());

        let points_x = conf.get_list_float("Geofence", "points_x", true)?;
        let points_y = conf.get_list_float("Geofence", "points_y", true)?;
        let geofence = Geofence::new(&points_x, &points_y)?;

        let estimator = Rc::new(RefCell::new(MonteCarloEstimator::new(
            hub.clone(),
            conf,
            geofence,
            rand::rng(),
        )?));
        hub.add_consumer(Rc::clone(&estimator) as Rc<RefCell<dyn crate::hub::Consumer>>);

        MotorController::spawn(hub.clone(), scheduler.clone(), motor_driver, conf)?;
        Navigator::spawn(hub.clone(), scheduler.clone(), conf)?;
        Sonar::spawn(hub.clone(), scheduler.clone(), sonar_driver, conf)?;

        Ok(Self { scheduler, hub, estimator, shutdown_requested: Arc::new(AtomicBool::new(false)) })
    }

    /// The current weighted-mean pose estimate, for status reporting.
    pub fn estimate_position(&self) -> (f64, f64, f64) {
        self.estimator.borrow().estimate_position()
    }

    /// Returns a clone of the flag a signal handler can flip from outside
    /// the scheduler thread. `run` polls it every [`SIGNAL_POLL_MS`] and
    /// turns the first observed `true` into a published `TerminateRequest`
    /// — the signal handler itself never touches the hub or scheduler.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown_requested)
    }

    /// Publish `StartRequest`, then drive the scheduler to completion.
    pub fn run(self) {
        rk_info!(sys, "reactor starting");
        let flag = Arc::clone(&self.shutdown_requested);
        let hub = self.hub.clone();
        self.scheduler.interval(
            move |handle| {
                if flag.load(Ordering::Relaxed) {
                    hub.deliver(rk_core::message::Payload::TerminateRequest);
                    handle.cancel();
                }
            },
            SIGNAL_POLL_MS,
        );

        self.hub.deliver(rk_core::message::Payload::StartRequest);
        self.scheduler.run();
        rk_info!(sys, "reactor stopped, scheduler queue drained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rk_core::drivers::{SimMotorDriver, SimSonarDriver};

    const TOML: &str = r#"
[Geofence]
points_x = [0.0, 10.0, 10.0, 0.0, 0.0]
points_y = [0.0, 0.0, 10.0, 10.0, 0.0]

[MCPositionEstimator]
localisation = "continuous"
start_x = 1.0
start_y = 1.0
start_hed = 0.0
num_particles = 10

[MotorController]
emit_interval_ms = 5
command_interval_ms = 5
left_motor_port = "port_A"
right_motor_port = "port_B"
max_power = 100.0
max_dps = 720.0
encoder_cps = 360
wheel_radius = 0.02
wheel_base = 0.1
turn_encoder_a = 1.0
turn_encoder_b = 0.0
move_encoder_a = 1.0
move_encoder_b = 0.0
turn_std_a = 0.0
turn_std_b = 0.0
move_std_a = 0.0
move_std_b = 0.0
radius_std_a = 0.0
radius_std_b = 0.0

[Navigator]
waypoints_x = [1.0]
waypoints_y = [1.0]
interval_ms = 5
waypoint_threshold = 0.05
startup_wait = 0
waypoint_wait = 0
stop_wait = 0

[Sonar]
interval_ms = 5
std = 0.1
constant_std = 0.01
normal_std = 0.2
sonar_port = "port_1"
position_x = 0.0
position_y = 0.0
"#;

    #[test]
    fn terminate_request_drains_the_queue_and_run_returns() {
        let conf = Configuration::parse(TOML).unwrap();
        let reactor = Reactor::bootstrap(&conf, SimMotorDriver::new(), SimSonarDriver::new(1.0)).unwrap();
        let flag = reactor.shutdown_flag();
        flag.store(true, Ordering::Relaxed);
        reactor.run();
    }
}
