//! Orion Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction that lets the Orion node
//! state machines run against both a **Production** context (tokio clock,
//! OS entropy) and a **Simulation** context (scaled clock, seeded RNG).
//!
//! # Core Concept: Actors Over Mailboxes
//!
//! Every node owns exactly one FIFO mailbox in a [`MailboxRegistry`]. Nodes
//! never touch each other's state; they only:
//! - Send messages (`send()`), which never blocks
//! - Wait for their next message (`receive()`)
//! - Sleep on the context clock (`sleep_units()`)
//! - Draw randomness from a context-derived stream (`derive_rng()`)
//!
//! # Example
//!
//! ```ignore
//! use orion_env::{OrionContext, MailboxRegistry, NodeId};
//!
//! async fn node_loop<Ctx: OrionContext>(ctx: &Ctx, mailboxes: &MailboxRegistry<Msg>) {
//!     loop {
//!         let (from, msg) = mailboxes.receive(NodeId::Sink).await?;
//!         handle(from, msg);
//!     }
//! }
//! ```

mod context;
mod mailbox;
mod types;
mod error;
mod tokio_impl;

pub use context::{units_to_duration, OrionContext, KEY_LEN, MAX_TIME_UNITS};
pub use mailbox::MailboxRegistry;
pub use types::{NodeId, NodeKind, ParseNodeIdError};
pub use error::EnvError;
pub use tokio_impl::TokioContext;
