//! Concurrent runner for Maekawa processes.
//!
//! Where `maekawa-simulation` steps every process from a single loop, this
//! crate gives each process its own tokio task. Processes share nothing but
//! their inboxes; the driver only injects `RequestCs` / `ReleaseCs` and waits
//! for the cluster to go quiet.
//!
//! ```text
//!   driver ── request/release ──► inbox P0 ─► task P0 ─┐
//!                                 inbox P1 ─► task P1 ─┤ outgoing messages
//!                                 inbox P2 ─► task P2 ─┘ routed by the sender
//! ```
//!
//! Quiescence is tracked with an in-flight counter: raised before every
//! enqueue, lowered once the handler has enqueued its own outputs. A shared
//! holder counter catches two processes in the critical section at once.

mod cluster;
mod error;

pub use cluster::TaskCluster;
pub use error::ClusterError;
