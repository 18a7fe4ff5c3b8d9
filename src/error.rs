use thiserror::Error;

/// Convenience alias for fallible simulator operations.
pub type SimResult<T> = Result<T, SimError>;

/// Errors surfaced by the simulation core.
///
/// Infeasible dispatch is deliberately absent: storage requests are clipped
/// and power imbalances are resolved through import, export, shedding, and
/// curtailment, so the transition itself never fails on physics.
#[derive(Error, Debug)]
pub enum SimError {
    /// Action index outside `[0, num_actions)`. The call leaves all state
    /// untouched; the caller may retry with a valid action.
    #[error("invalid action {action}: action space has {num_actions} actions")]
    InvalidAction { action: usize, num_actions: usize },

    /// Simulation window rejected at construction time.
    #[error("invalid time range: {reason}")]
    InvalidTimeRange { reason: String },

    /// `step` was called before the first `reset`.
    #[error("simulator has not been reset")]
    NotReady,

    /// `step` was called on a finished episode; only `reset` leaves the
    /// terminal state.
    #[error("episode is complete; call reset() before stepping again")]
    EpisodeComplete,

    /// Scenario configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Dataset file could not be read.
    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    /// Dataset content could not be interpreted as a time series.
    #[error("malformed dataset: {0}")]
    Dataset(String),
}
