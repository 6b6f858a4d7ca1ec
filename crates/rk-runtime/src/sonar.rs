//! Ultrasonic range sensor service (spec.md §4.8), ported from
//! `original_source/src/drivers/sonar.py`'s `Sonar`.

use std::cell::RefCell;
use std::rc::Rc;

use rk_config::Configuration;
use rk_core::drivers::{SonarDriver, SonarPort};
use rk_core::message::{Message, MessageId, Payload};

use crate::error::RuntimeResult;
use crate::hub::{Consumer, Hub, Service};
use crate::log_macros::rk_warn;
use crate::scheduler::{Scheduler, TaskHandle};

fn sonar_port_from_str(conf: &Configuration, object: &str, key: &str) -> RuntimeResult<SonarPort> {
    let raw = conf.get_str(object, key, "", true)?;
    match raw.as_str() {
        "port_1" => Ok(SonarPort::One),
        "port_2" => Ok(SonarPort::Two),
        "port_3" => Ok(SonarPort::Three),
        "port_4" => Ok(SonarPort::Four),
        _ => Err(rk_config::ConfigurationError::TypeMismatch {
            object: object.to_string(),
            key: key.to_string(),
            expected: "one of 'port_1'..'port_4'",
        }
        .into()),
    }
}

struct SonarParams {
    interval_ms: u64,
    std: f64,
    constant_std: f64,
    normal_std: f64,
    port: SonarPort,
    /// Sonar mount offset in the robot frame. Recorded for schema fidelity
    /// (spec.md §6 lists both as required) but not yet consumed by the
    /// ray-casting in `Geofence::distance_to_closest_wall`, which still
    /// assumes the sensor sits at the particle's own `(x, y)`.
    #[allow(dead_code)]
    position_x: f64,
    #[allow(dead_code)]
    position_y: f64,
}

impl SonarParams {
    fn load(conf: &Configuration) -> RuntimeResult<Self> {
        const OBJ: &str = "Sonar";
        Ok(Self {
            interval_ms: conf.get_int(OBJ, "interval_ms", 0, true)? as u64,
            std: conf.get_float(OBJ, "std", 0.0, true)?,
            constant_std: conf.get_float(OBJ, "constant_std", 0.0, true)?,
            normal_std: conf.get_float(OBJ, "normal_std", 0.0, true)?,
            port: sonar_port_from_str(conf, OBJ, "sonar_port")?,
            position_x: conf.get_float(OBJ, "position_x", 0.0, true)?,
            position_y: conf.get_float(OBJ, "position_y", 0.0, true)?,
        })
    }
}

pub struct Sonar<D: SonarDriver> {
    hub: Hub,
    scheduler: Scheduler,
    driver: D,
    params: SonarParams,
    emit_handle: Option<TaskHandle>,
    self_handle: std::rc::Weak<RefCell<Sonar<D>>>,
}

impl<D: SonarDriver + 'static> Sonar<D> {
    pub fn spawn(hub: Hub, scheduler: Scheduler, mut driver: D, conf: &Configuration) -> RuntimeResult<Rc<RefCell<Self>>> {
        let params = SonarParams::load(conf)?;
        driver.set_sensor_type(params.port);
        let sonar = Rc::new_cyclic(|weak| {
            RefCell::new(Self {
                hub: hub.clone(),
                scheduler,
                driver,
                params,
                emit_handle: None,
                self_handle: weak.clone(),
            })
        });
        hub.add_consumer(Rc::clone(&sonar) as Rc<RefCell<dyn Consumer>>);
        Ok(sonar)
    }

    fn read_and_emit(&mut self) {
        let Some(reading_m) = self.driver.read(self.params.port) else {
            rk_warn!(sonar, "sonar read failed, skipping this tick");
            return;
        };
        self.hub.deliver(Payload::SonarReading {
            reading_m,
            std: self.params.std,
            constant_std: self.params.constant_std,
            normal_std: self.params.normal_std,
        });
    }
}

impl<D: SonarDriver + 'static> Service for Sonar<D> {
    fn start(&mut self) {
        self.stop();
        let Some(handle) = self.self_handle.upgrade() else {
            return;
        };
        self.emit_handle =
            Some(self.scheduler.interval(move |_| handle.borrow_mut().read_and_emit(), self.params.interval_ms));
    }

    fn stop(&mut self) {
        if let Some(handle) = self.emit_handle.take() {
            handle.cancel();
        }
    }
}

impl<D: SonarDriver + 'static> Consumer for Sonar<D> {
    fn send(&mut self, message: &Message) {
        match &message.payload {
            Payload::TerminateRequest => Service::stop(self),
            Payload::StartRequest => Service::start(self),
            _ => {}
        }
    }

    fn get_consumed(&self) -> Vec<MessageId> {
        vec![MessageId::StartRequest, MessageId::TerminateRequest]
    }
}
