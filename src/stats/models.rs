use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;
use std::fmt;
use strum_macros::EnumIter;

/// A rolling window backed by one baseline slot on every stat record.
///
/// The external scheduler owns the reset cadence; the store only knows the
/// slot names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    Session,
    Daily,
    Yesterday,
    Weekly,
    Monthly,
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Window::Session => "session",
                Window::Daily => "daily",
                Window::Yesterday => "yesterday",
                Window::Weekly => "weekly",
                Window::Monthly => "monthly",
            }
        )
    }
}

/// One baseline snapshot per window. A slot is `None` only for legacy rows
/// persisted before that window existed; readers treat `None` as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Baselines {
    pub session: Option<f64>,
    pub daily: Option<f64>,
    pub yesterday: Option<f64>,
    pub weekly: Option<f64>,
    pub monthly: Option<f64>,
}

impl Baselines {
    /// All five slots snapshotted at the same value. This is what a freshly
    /// tracked stat gets, so its initial deltas are all zero.
    pub fn filled(value: f64) -> Self {
        Self {
            session: Some(value),
            daily: Some(value),
            yesterday: Some(value),
            weekly: Some(value),
            monthly: Some(value),
        }
    }

    pub fn get(&self, window: Window) -> Option<f64> {
        match window {
            Window::Session => self.session,
            Window::Daily => self.daily,
            Window::Yesterday => self.yesterday,
            Window::Weekly => self.weekly,
            Window::Monthly => self.monthly,
        }
    }

    pub fn set(&mut self, window: Window, value: f64) {
        match window {
            Window::Session => self.session = Some(value),
            Window::Daily => self.daily = Some(value),
            Window::Yesterday => self.yesterday = Some(value),
            Window::Weekly => self.weekly = Some(value),
            Window::Monthly => self.monthly = Some(value),
        }
    }
}

/// Stored state for one (player, stat) pair: the current lifetime value plus
/// the five baseline snapshots. Deltas are never stored; they are recomputed
/// on read as `lifetime - baseline`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatRecord {
    pub lifetime: f64,
    pub baselines: Baselines,
    pub updated_at: DateTime<Utc>,
}

impl StatRecord {
    /// Record for a stat seen for the first time: every baseline snapshots
    /// the current lifetime value.
    pub fn fresh(lifetime: f64) -> Self {
        Self {
            lifetime,
            baselines: Baselines::filled(lifetime),
            updated_at: Utc::now(),
        }
    }
}

/// Read-side view of one stat: the lifetime value and the per-window deltas.
/// Deltas may be negative when the upstream lifetime value regressed; that is
/// reportable state, not an error, and is never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatDeltas {
    pub lifetime: f64,
    pub session: f64,
    pub daily: f64,
    pub yesterday: f64,
    pub weekly: f64,
    pub monthly: f64,
}

impl StatDeltas {
    /// `lifetime - baseline` per window. Absent baseline slots read as 0.
    pub fn from_record(record: &StatRecord) -> Self {
        let b = &record.baselines;
        let delta = |slot: Option<f64>| record.lifetime - slot.unwrap_or(0.0);
        Self {
            lifetime: record.lifetime,
            session: delta(b.session),
            daily: delta(b.daily),
            yesterday: delta(b.yesterday),
            weekly: delta(b.weekly),
            monthly: delta(b.monthly),
        }
    }

    pub fn get(&self, window: Window) -> f64 {
        match window {
            Window::Session => self.session,
            Window::Daily => self.daily,
            Window::Yesterday => self.yesterday,
            Window::Weekly => self.weekly,
            Window::Monthly => self.monthly,
        }
    }
}

/// Per-player profile data with a lifecycle independent from stat records.
#[derive(Debug, Clone, Default, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PlayerMeta {
    pub level: i32,
    pub icon: String,
    pub ign_color: Option<String>,
    pub guild_tag: Option<String>,
    pub guild_hex: Option<String>,
    pub rank: Option<String>,
}

/// Outcome for a single stat within a batch update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatOutcome {
    /// Record upserted with the resolved lifetime and baselines.
    Applied,
    /// Upstream value was not a usable number; the stat was skipped.
    Invalid { reason: String },
    /// Storage rejected this stat; the rest of the batch continued.
    Failed { reason: String },
}

/// Per-stat result breakdown for one batch update. Batch operations report
/// item-level outcomes instead of an all-or-nothing boolean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateReport {
    /// Canonical casing the update resolved to.
    pub player: String,
    pub outcomes: HashMap<String, StatOutcome>,
}

impl UpdateReport {
    pub fn applied_count(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| matches!(o, StatOutcome::Applied))
            .count()
    }

    pub fn all_applied(&self) -> bool {
        self.applied_count() == self.outcomes.len()
    }
}

/// Outcome for a single player within a rotation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RotationOutcome {
    Rotated,
    Failed { reason: String },
}

/// Per-player result map for one rotation pass over the roster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RotationReport {
    pub results: HashMap<String, RotationOutcome>,
}

impl RotationReport {
    pub fn rotated_count(&self) -> usize {
        self.results
            .values()
            .filter(|o| matches!(o, RotationOutcome::Rotated))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.len() - self.rotated_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn fresh_record_has_zero_deltas_everywhere() {
        let record = StatRecord::fresh(123.0);
        let deltas = StatDeltas::from_record(&record);

        assert_eq!(deltas.lifetime, 123.0);
        for window in Window::iter() {
            assert_eq!(deltas.get(window), 0.0);
        }
    }

    #[test]
    fn deltas_are_lifetime_minus_baseline_including_negative() {
        let mut record = StatRecord::fresh(50.0);
        record.lifetime = 70.0;
        record.baselines.set(Window::Daily, 70.0);

        let deltas = StatDeltas::from_record(&record);
        assert_eq!(deltas.session, 20.0);
        assert_eq!(deltas.daily, 0.0);
        assert_eq!(deltas.yesterday, 20.0);

        // Upstream reset: lifetime fell below the baseline.
        let mut reset = record.clone();
        reset.lifetime = 10.0;
        let deltas = StatDeltas::from_record(&reset);
        assert_eq!(deltas.session, -40.0);
    }

    #[test]
    fn absent_baseline_slots_read_as_zero() {
        let record = StatRecord {
            lifetime: 42.0,
            baselines: Baselines {
                session: Some(40.0),
                daily: None,
                yesterday: None,
                weekly: None,
                monthly: Some(42.0),
            },
            updated_at: Utc::now(),
        };

        let deltas = StatDeltas::from_record(&record);
        assert_eq!(deltas.session, 2.0);
        assert_eq!(deltas.daily, 42.0);
        assert_eq!(deltas.monthly, 0.0);
    }

    #[test]
    fn baseline_accessors_cover_every_window() {
        let mut baselines = Baselines::default();
        for (i, window) in Window::iter().enumerate() {
            baselines.set(window, i as f64);
        }
        for (i, window) in Window::iter().enumerate() {
            assert_eq!(baselines.get(window), Some(i as f64));
        }
    }
}
