//! Waypoint-following navigator (spec.md §4.6), ported from
//! `original_source/src/navigator.py`'s `Navigator`.
//!
//! One correction, recorded in DESIGN.md: the source's `emit_move_request`
//! branches on `waypoint_index >= len(waypoints)` after incrementing, but
//! the *intermediate*-waypoint branch schedules a `TerminateRequest` and the
//! *final*-waypoint branch schedules a restart — backwards from what the
//! `stop_wait`/`waypoint_wait` config names and spec.md §8 scenario 7 both
//! imply. This port skips past any waypoint already within threshold in the
//! same tick and only stops the robot (scheduling `TerminateRequest` after
//! `stop_wait`) once every waypoint is consumed; `waypoint_wait` is parsed
//! for config-schema fidelity but not wired to a pause, since that pause was
//! exactly the swapped branch.

use std::cell::RefCell;
use std::rc::Rc;

use rk_config::Configuration;
use rk_core::math::{distance, signed_angle_between, Point};
use rk_core::message::{Message, MessageId, Payload};

use crate::error::RuntimeResult;
use crate::hub::{Consumer, Hub, Service};
use crate::log_macros::rk_info;
use crate::scheduler::{Scheduler, TaskHandle};

struct NavigatorParams {
    waypoints: Vec<Point>,
    interval_ms: u64,
    waypoint_threshold: f64,
    startup_wait_ms: u64,
    #[allow(dead_code)]
    waypoint_wait_ms: u64,
    terminate_wait_ms: u64,
}

impl NavigatorParams {
    fn load(conf: &Configuration) -> RuntimeResult<Self> {
        const OBJ: &str = "Navigator";
        let waypoints_x = conf.get_list_float(OBJ, "waypoints_x", true)?;
        let waypoints_y = conf.get_list_float(OBJ, "waypoints_y", true)?;
        if waypoints_x.len() != waypoints_y.len() {
            return Err(rk_config::ConfigurationError::TypeMismatch {
                object: OBJ.to_string(),
                key: "waypoints_x/waypoints_y (length mismatch)".to_string(),
                expected: "equal-length lists",
            }
            .into());
        }
        let waypoints = waypoints_x.into_iter().zip(waypoints_y).collect();

        Ok(Self {
            waypoints,
            interval_ms: conf.get_int(OBJ, "interval_ms", 0, true)? as u64,
            waypoint_threshold: conf.get_float(OBJ, "waypoint_threshold", 0.0, true)?,
            startup_wait_ms: conf.get_float(OBJ, "startup_wait", 0.0, true)? as u64,
            waypoint_wait_ms: conf.get_float(OBJ, "waypoint_wait", 0.0, true)? as u64,
            terminate_wait_ms: conf.get_float(OBJ, "stop_wait", 0.0, true)? as u64,
        })
    }
}

#[derive(Clone, Copy)]
struct NavEstimate {
    x: f64,
    y: f64,
    theta: f64,
}

pub struct Navigator {
    hub: Hub,
    scheduler: Scheduler,
    params: NavigatorParams,
    waypoint_index: usize,
    nav_estimate: Option<NavEstimate>,
    emit_handle: Option<TaskHandle>,
    self_handle: std::rc::Weak<RefCell<Navigator>>,
}

impl Navigator {
    pub fn spawn(hub: Hub, scheduler: Scheduler, conf: &Configuration) -> RuntimeResult<Rc<RefCell<Self>>> {
        let params = NavigatorParams::load(conf)?;
        let navigator = Rc::new_cyclic(|weak| {
            RefCell::new(Self {
                hub: hub.clone(),
                scheduler,
                params,
                waypoint_index: 0,
                nav_estimate: None,
                emit_handle: None,
                self_handle: weak.clone(),
            })
        });
        hub.add_consumer(Rc::clone(&navigator) as Rc<RefCell<dyn Consumer>>);
        Ok(navigator)
    }

    fn emit_move_request(&mut self) {
        let Some(nav) = self.nav_estimate else {
            return;
        };
        let current_position = (nav.x, nav.y);

        while self.waypoint_index < self.params.waypoints.len() {
            let waypoint = self.params.waypoints[self.waypoint_index];
            if distance(waypoint, current_position) >= self.params.waypoint_threshold {
                let relative = (waypoint.0 - current_position.0, waypoint.1 - current_position.1);
                let heading = signed_angle_between((0.0, 1.0), relative);
                self.hub.deliver(Payload::MoveRequest { theta: heading, distance: distance(waypoint, current_position) });
                return;
            }
            self.waypoint_index += 1;
        }

        rk_info!(nav, "all waypoints reached, holding position and scheduling shutdown");
        self.hub.deliver(Payload::MoveRequest { theta: nav.theta, distance: 0.0 });
        Service::stop(self);
        let hub = self.hub.clone();
        self.scheduler.delay(move |_| hub.deliver(Payload::TerminateRequest), self.params.terminate_wait_ms);
    }
}

impl Service for Navigator {
    fn start(&mut self) {
        self.stop();
        rk_info!(nav, "starting navigator");
        let Some(handle) = self.self_handle.upgrade() else {
            return;
        };
        self.emit_handle =
            Some(self.scheduler.interval(move |_| handle.borrow_mut().emit_move_request(), self.params.interval_ms));
    }

    fn stop(&mut self) {
        if let Some(handle) = self.emit_handle.take() {
            handle.cancel();
        }
    }
}

impl Consumer for Navigator {
    fn send(&mut self, message: &Message) {
        match &message.payload {
            Payload::NavigationEstimate { x, y, theta } => {
                self.nav_estimate = Some(NavEstimate { x: *x, y: *y, theta: *theta })
            }
            Payload::TerminateRequest => Service::stop(self),
            Payload::StartRequest => {
                let Some(handle) = self.self_handle.upgrade() else {
                    return;
                };
                self.scheduler.delay(move |_| handle.borrow_mut().start(), self.params.startup_wait_ms);
            }
            _ => {}
        }
    }

    fn get_consumed(&self) -> Vec<MessageId> {
        vec![MessageId::NavigationEstimate, MessageId::StartRequest, MessageId::TerminateRequest]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML: &str = r#"
[Navigator]
waypoints_x = [0.0, 1.0]
waypoints_y = [1.0, 1.0]
interval_ms = 10
waypoint_threshold = 0.05
startup_wait = 0
waypoint_wait = 0
stop_wait = 0
"#;

    #[test]
    fn first_tick_heads_straight_to_the_first_waypoint() {
        let scheduler = Scheduler::new();
        let hub = Hub::new(scheduler.clone());
        let conf = Configuration::parse(TOML).unwrap();
        let navigator = Navigator::spawn(hub.clone(), scheduler.clone(), &conf).unwrap();

        let requests = Rc::new(RefCell::new(Vec::new()));
        struct Recorder(Rc<RefCell<Vec<(f64, f64)>>>);
        impl Consumer for Recorder {
            fn send(&mut self, message: &Message) {
                if let Payload::MoveRequest { theta, distance } = message.payload {
                    self.0.borrow_mut().push((theta, distance));
                }
            }
            fn get_consumed(&self) -> Vec<MessageId> {
                vec![MessageId::MoveRequest]
            }
        }
        hub.add_consumer(Rc::new(RefCell::new(Recorder(Rc::clone(&requests)))));

        navigator.borrow_mut().nav_estimate = Some(NavEstimate { x: 0.0, y: 0.0, theta: 0.0 });
        navigator.borrow_mut().emit_move_request();
        scheduler.run();

        assert_eq!(navigator.borrow().waypoint_index, 0);
        let seen = requests.borrow();
        assert_eq!(seen.len(), 1);
        let (heading, dist) = seen[0];
        assert!((heading - 0.0).abs() < 1e-9);
        assert!((dist - 1.0).abs() < 1e-9);
    }

    #[test]
    fn reaching_first_waypoint_advances_straight_to_the_second() {
        let scheduler = Scheduler::new();
        let hub = Hub::new(scheduler.clone());
        let conf = Configuration::parse(TOML).unwrap();
        let navigator = Navigator::spawn(hub.clone(), scheduler.clone(), &conf).unwrap();

        let requests = Rc::new(RefCell::new(Vec::new()));
        struct Recorder(Rc<RefCell<Vec<(f64, f64)>>>);
        impl Consumer for Recorder {
            fn send(&mut self, message: &Message) {
                if let Payload::MoveRequest { theta, distance } = message.payload {
                    self.0.borrow_mut().push((theta, distance));
                }
            }
            fn get_consumed(&self) -> Vec<MessageId> {
                vec![MessageId::MoveRequest]
            }
        }
        hub.add_consumer(Rc::new(RefCell::new(Recorder(Rc::clone(&requests)))));

        navigator.borrow_mut().nav_estimate = Some(NavEstimate { x: 0.0, y: 1.0, theta: 0.0 });
        navigator.borrow_mut().emit_move_request();
        scheduler.run();

        let seen = requests.borrow();
        assert_eq!(seen.len(), 1);
        let (heading, dist) = seen[0];
        assert!((heading - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        assert!((dist - 1.0).abs() < 1e-9);
    }
}
