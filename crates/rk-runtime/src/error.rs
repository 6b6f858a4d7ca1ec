use derive_more::From;

/// Error reasons raised by the runtime crate: scheduling, service lifecycle,
/// and estimator numerics. Mirrors the teacher's `RuntimeReason` /
/// `StructError<RuntimeReason>` split but, like [`rk_core::CoreReason`], drops
/// the `orion_error` operator-context wrapper — there is no multi-tenant
/// request to carry context for here, just a single long-running process.
#[derive(Debug, Clone, PartialEq, thiserror::Error, From)]
pub enum RuntimeReason {
    #[error("unknown task handle")]
    UnknownTask,
    #[error("service '{0}' is already running")]
    AlreadyRunning(String),
    #[error("service '{0}' is not running")]
    NotRunning(String),
    #[error("particle filter degenerated: {0}")]
    DegenerateFilter(String),
    #[error("{0}")]
    Configuration(rk_config::ConfigurationError),
    #[error("{0}")]
    Core(rk_core::CoreError),
}

pub type RuntimeError = RuntimeReason;
pub type RuntimeResult<T> = Result<T, RuntimeError>;
