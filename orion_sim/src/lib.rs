//! Orion Simulation Harness
//!
//! Wires an [`orion_core::Topology`] into running tasks and exposes what
//! they do to the outside world.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        Simulation                          │
//! │  ┌───────────┐   ┌──────────┐   ┌────────────┐  ┌──────┐   │
//! │  │Submitter i│──►│ Holder i │◄─►│ Aggregator │─►│ Sink │   │
//! │  └───────────┘   └──────────┘   └────────────┘  └──────┘   │
//! │        │              │               │            │       │
//! │        └──────────────┴──── observe ──┴────────────┘       │
//! │                              │                             │
//! │                     ┌────────▼────────┐                    │
//! │                     │ StateProjection │──► fetch_latest()  │
//! │                     └─────────────────┘                    │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use orion_sim::{SimConfig, SimContext, Simulation, StateProjection};
//! use orion_core::Topology;
//!
//! let config = SimConfig::default();
//! let ctx = SimContext::shared(config.seed, config.time_scale)?;
//! let topology = Topology::build(&config.topology, ctx.as_ref())?;
//! let projection = Arc::new(StateProjection::new());
//!
//! let mut sim = Simulation::new(ctx, projection.clone(), config.submitter, config.aggregator);
//! sim.start(&topology).await?;
//! // ...
//! sim.stop().await?;
//! ```

mod config;
mod context;
mod driver;
mod exporter;
mod keys;
pub mod projection;

pub use config::SimConfig;
pub use context::SimContext;
pub use driver::Simulation;
pub use exporter::RunExport;
pub use keys::DeterministicKeyProvider;
pub use projection::{ProjectionSnapshot, StateProjection};
