//! Single-threaded cooperative runtime for the control core (spec.md §4-§5,
//! §10). Grounded in `wp-labs/wp-reactor`'s runtime crate for the shape of
//! the scheduler, lifecycle and logging modules, generalised from its
//! `tokio` multi-task-per-core model to the one cooperative thread spec.md
//! §5 requires: no async runtime, no locks, a single `Rc<RefCell<_>>`-based
//! scheduler shared by every component.

pub mod log_macros;

pub mod clock;
pub mod error;
pub mod estimator;
pub mod hub;
pub mod lifecycle;
pub mod motor_controller;
pub mod navigator;
pub mod scheduler;
pub mod sonar;
pub mod tracing_init;

pub use error::{RuntimeError, RuntimeReason};
pub use estimator::{LocalisationMethod, MonteCarloEstimator};
pub use hub::{Consumer, Hub, Service};
pub use lifecycle::Reactor;
pub use motor_controller::MotorController;
pub use navigator::Navigator;
pub use scheduler::{Scheduler, TaskHandle};
pub use sonar::Sonar;
