//! Message types exchanged over the hub. Ported from
//! `original_source/src/messages.py`, expanded to the full set spec.md §3
//! requires (`messages.py` as retrieved only covers an earlier subset).

/// Closed enumeration of message kinds. Used as the subscription index key
/// (`MessageHub` indexes subscribers by `MessageId`) — stable, small,
/// `Copy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageId {
    SonarReading,
    NavigationEstimate,
    MoveEstimate,
    TurnEstimate,
    CircularMoveEstimate,
    MoveRequest,
    StartRequest,
    TerminateRequest,
}

/// Kind-specific payload. All angles are radians, all distances are metres
/// (spec.md §9).
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    SonarReading { reading_m: f64, std: f64, constant_std: f64, normal_std: f64 },
    MoveEstimate { distance: f64, distance_std: f64, theta_std: f64 },
    TurnEstimate { theta: f64, theta_std: f64 },
    CircularMoveEstimate { radius: f64, angle: f64, radius_std: f64, theta_std: f64 },
    NavigationEstimate { x: f64, y: f64, theta: f64 },
    /// `theta` is an absolute world heading, not a delta.
    MoveRequest { theta: f64, distance: f64 },
    StartRequest,
    TerminateRequest,
}

/// A tagged, immutable record published on the hub.
///
/// Equality/hashing for subscription routing is by [`MessageId`] alone —
/// `Message` itself derives structural `PartialEq` over its full payload so
/// tests can compare concrete field values; nothing in this crate hashes or
/// deduplicates on `Message` identity (spec.md §3).
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub timestamp_ms: u64,
    pub payload: Payload,
}

impl Message {
    pub fn new(timestamp_ms: u64, payload: Payload) -> Self {
        Self { timestamp_ms, payload }
    }

    pub fn id(&self) -> MessageId {
        match &self.payload {
            Payload::SonarReading { .. } => MessageId::SonarReading,
            Payload::MoveEstimate { .. } => MessageId::MoveEstimate,
            Payload::TurnEstimate { .. } => MessageId::TurnEstimate,
            Payload::CircularMoveEstimate { .. } => MessageId::CircularMoveEstimate,
            Payload::NavigationEstimate { .. } => MessageId::NavigationEstimate,
            Payload::MoveRequest { .. } => MessageId::MoveRequest,
            Payload::StartRequest => MessageId::StartRequest,
            Payload::TerminateRequest => MessageId::TerminateRequest,
        }
    }

    pub fn sonar_reading(timestamp_ms: u64, reading_m: f64, std: f64, constant_std: f64, normal_std: f64) -> Self {
        Self::new(timestamp_ms, Payload::SonarReading { reading_m, std, constant_std, normal_std })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_matches_payload() {
        let m = Message::sonar_reading(0, 1.0, 0.1, 0.01, 0.2);
        assert_eq!(m.id(), MessageId::SonarReading);
    }
}
