//! Trajectory persistence.

/// CSV export of episode trajectories.
pub mod export;
