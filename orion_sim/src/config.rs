//! Run configuration.

use orion_core::{AggregatorConfig, SimError, SimResult, SubmitterConfig, TopologyConfig};
use orion_env::MAX_TIME_UNITS;

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism (0 = OS entropy)
    pub seed: u64,

    /// Wall-clock seconds per time unit
    pub time_scale: f64,

    /// Run length in time units (0 = unlimited)
    pub max_duration_units: f64,

    pub topology: TopologyConfig,
    pub submitter: SubmitterConfig,
    pub aggregator: AggregatorConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            time_scale: 1.0,
            max_duration_units: 0.0,
            topology: TopologyConfig::default(),
            submitter: SubmitterConfig::default(),
            aggregator: AggregatorConfig::default(),
        }
    }
}

impl SimConfig {
    /// Checks every field before any node is built.
    ///
    /// All time values must be finite and at most `MAX_TIME_UNITS`, so no
    /// sleep can overflow a `Duration`.
    pub fn validate(&self) -> SimResult<()> {
        if self.topology.num_holders == 0 {
            return Err(SimError::Config("at least one holder is required".to_string()));
        }
        if !(self.time_scale > 0.0 && self.time_scale <= MAX_TIME_UNITS) {
            return Err(SimError::Config(format!("invalid time scale {}", self.time_scale)));
        }
        check_units("duration", self.max_duration_units)?;

        let submitter = &self.submitter;
        check_units("think time min", submitter.think_time_min)?;
        check_units("think time max", submitter.think_time_max)?;
        if submitter.think_time_max < submitter.think_time_min {
            return Err(SimError::Config(format!(
                "invalid think time range [{}, {}]",
                submitter.think_time_min, submitter.think_time_max
            )));
        }

        check_units("cycle period", self.aggregator.cycle_period)?;
        if let Some(timeout) = self.aggregator.gather_timeout {
            check_units("gather timeout", timeout)?;
            if timeout == 0.0 {
                return Err(SimError::Config("gather timeout must be positive".to_string()));
            }
        }
        Ok(())
    }
}

fn check_units(name: &str, units: f64) -> SimResult<()> {
    if (0.0..=MAX_TIME_UNITS).contains(&units) {
        Ok(())
    } else {
        Err(SimError::Config(format!(
            "{} must be in [0, {}] time units, got {}",
            name, MAX_TIME_UNITS, units
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = SimConfig::default();
        config.topology.num_holders = 0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.time_scale = 0.0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.submitter.think_time_max = 1.0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.aggregator.gather_timeout = Some(-2.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unrepresentable_times() {
        for bad in [f64::INFINITY, f64::NAN, 1.0e300] {
            let mut config = SimConfig::default();
            config.max_duration_units = bad;
            assert!(config.validate().is_err(), "duration {} accepted", bad);

            let mut config = SimConfig::default();
            config.aggregator.cycle_period = bad;
            assert!(config.validate().is_err(), "cycle period {} accepted", bad);

            let mut config = SimConfig::default();
            config.submitter.think_time_max = bad;
            assert!(config.validate().is_err(), "think time {} accepted", bad);

            let mut config = SimConfig::default();
            config.aggregator.gather_timeout = Some(bad);
            assert!(config.validate().is_err(), "gather timeout {} accepted", bad);

            let mut config = SimConfig::default();
            config.time_scale = bad;
            assert!(config.validate().is_err(), "time scale {} accepted", bad);
        }
    }
}
