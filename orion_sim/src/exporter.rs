//! JSON exporter for finished runs.
//!
//! Writes the final projection plus run metadata so a run can be inspected
//! or diffed after the process exits.

use crate::projection::ProjectionSnapshot;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Complete run export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunExport {
    /// Seed used (0 = OS entropy, not reproducible)
    pub seed: u64,

    pub num_holders: u32,

    /// Elapsed logical time units
    pub duration_units: f64,

    /// Idle capital at the end of the run
    pub idle_capital: f64,

    /// Final projection
    pub state: ProjectionSnapshot,

    /// Fatal error that ended the run, if any
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl RunExport {
    /// Creates an export container.
    pub fn new(seed: u64, num_holders: u32) -> Self {
        Self {
            seed,
            num_holders,
            duration_units: 0.0,
            idle_capital: 0.0,
            state: ProjectionSnapshot::default(),
            error: None,
        }
    }

    /// Records the final state and outcome.
    pub fn finalize(&mut self, duration_units: f64, state: ProjectionSnapshot, error: Option<String>) {
        self.duration_units = duration_units;
        self.idle_capital = state.idle_capital();
        self.state = state;
        self.error = error;
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::HolderView;
    use orion_env::NodeId;

    #[test]
    fn test_write_and_read_back() {
        let mut state = ProjectionSnapshot::default();
        state.holders.insert(
            NodeId::Holder(1),
            HolderView {
                balance: 60.0,
                display_balance: 60.0,
                has_intent: false,
            },
        );
        state.holders.insert(
            NodeId::Holder(2),
            HolderView {
                balance: 40.0,
                display_balance: 40.0,
                has_intent: true,
            },
        );

        let mut export = RunExport::new(42, 2);
        export.finalize(12.5, state.clone(), Some("Gather timed out".to_string()));
        assert_eq!(export.idle_capital, 100.0);

        let path = std::env::temp_dir().join(format!("orion-export-{}.json", std::process::id()));
        export.write_to_file(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let back: RunExport = serde_json::from_str(&text).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(back.seed, 42);
        assert_eq!(back.duration_units, 12.5);
        assert_eq!(back.state, state);
        assert_eq!(back.error.as_deref(), Some("Gather timed out"));
    }

    #[test]
    fn test_error_omitted_when_clean() {
        let export = RunExport::new(1, 1);
        let json = export.to_json().unwrap();
        assert!(!json.contains("\"error\""));
    }
}
