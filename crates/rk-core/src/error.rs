use derive_more::From;

/// Error reasons shared across the geometry, particle, and message types.
///
/// Mirrors the teacher's `CoreReason` / `RuntimeReason` split (one reason
/// enum per crate, `thiserror` for display, a crate-level `Result` alias) —
/// without the `orion_error::StructError` wrapper, which this crate has no
/// use for: there is no multi-tenant operator context or span bookkeeping to
/// carry alongside the error.
#[derive(Debug, Clone, PartialEq, thiserror::Error, From)]
pub enum CoreReason {
    #[error("malformed geofence polygon: {0}")]
    MalformedGeofence(String),
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),
}

pub type CoreError = CoreReason;
pub type CoreResult<T> = Result<T, CoreError>;
