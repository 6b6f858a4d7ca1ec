pub mod drivers;
pub mod error;
pub mod geofence;
pub mod math;
pub mod message;
pub mod particle;

pub use error::{CoreError, CoreReason};
pub use geofence::Geofence;
pub use math::{distance, signed_angle_between};
pub use message::{Message, MessageId};
pub use particle::{NormalParticle, Particle};
