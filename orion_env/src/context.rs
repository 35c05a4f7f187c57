//! Core environment context trait for Orion nodes.

use async_trait::async_trait;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;

/// Length in bytes of the symmetric key material handed to submitters.
pub const KEY_LEN: usize = 32;

/// Largest delay, in time units, a configuration may ask for.
pub const MAX_TIME_UNITS: f64 = 1.0e9;

/// Converts logical units to a wall-clock duration.
///
/// Negative and NaN inputs count as zero. Returns `None` when the result
/// does not fit in a `Duration` (infinite or overflowing), which callers
/// treat as "never elapses".
pub fn units_to_duration(units: f64, seconds_per_unit: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(units.max(0.0) * seconds_per_unit).ok()
}

/// The central interface for Environment Interaction.
///
/// This trait abstracts the "real world" so that the node state machines can
/// run in both production (tokio, OS entropy) and simulation (scaled clock,
/// seeded RNG) environments.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, `OsRng`
/// - **Simulation**: `SimContext` - scaled `tokio::time`, `ChaCha8Rng(seed)`
///
/// # Time Units
///
/// Nodes express every delay in logical *time units*. The context decides
/// how long a unit lasts on the wall clock.
#[async_trait]
pub trait OrionContext: Send + Sync + 'static {
    /// Returns the elapsed logical time since context creation.
    fn now(&self) -> Duration;

    /// Suspends execution for `units` logical time units.
    ///
    /// In production: one unit is one second of `tokio::time::sleep`
    /// In simulation: one unit is `time_scale` seconds
    async fn sleep_units(&self, units: f64);

    /// Returns an independent RNG stream for one node.
    ///
    /// Seeded contexts derive the stream from the master seed and
    /// `stream_id`, so every node draws a reproducible sequence regardless of
    /// how the runtime interleaves tasks.
    fn derive_rng(&self, stream_id: u64) -> ChaCha8Rng;

    /// Generates symmetric key material from a seed extension.
    ///
    /// # Arguments
    /// * `seed_extension` - A value to combine with the global seed
    fn derive_key_material(&self, seed_extension: u64) -> [u8; KEY_LEN];

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_to_duration() {
        assert_eq!(units_to_duration(2.5, 2.0), Some(Duration::from_secs(5)));
        assert_eq!(units_to_duration(-3.0, 1.0), Some(Duration::ZERO));
        assert_eq!(units_to_duration(f64::NAN, 1.0), Some(Duration::ZERO));
        assert_eq!(units_to_duration(MAX_TIME_UNITS, 1.0), Some(Duration::from_secs(1_000_000_000)));
    }

    #[test]
    fn test_unrepresentable_durations() {
        assert_eq!(units_to_duration(f64::INFINITY, 1.0), None);
        assert_eq!(units_to_duration(1.0e300, 1.0), None);
        assert_eq!(units_to_duration(1.0, f64::INFINITY), None);
    }
}
