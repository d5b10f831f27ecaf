use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsError {
    /// The backing store could not be reached. Fatal for the whole batch;
    /// surfaced to the caller rather than folded into per-item results.
    #[error("Stat store unavailable: {0}")]
    StoreUnavailable(String),

    /// A value was not usable for its stat. Never fatal for a batch: the stat
    /// is skipped and the failure recorded in the per-item report. Per-player
    /// rotation failures are likewise folded into the rotation result map.
    #[error("Invalid value for stat '{stat}': {reason}")]
    InvalidStatValue { stat: String, reason: String },
}
