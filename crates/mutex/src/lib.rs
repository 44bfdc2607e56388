//! Maekawa mutual exclusion state machine.
//!
//! Every process plays two roles at once:
//!
//! - **Requester**: asks its quorum for votes and enters the critical section
//!   once every voter has granted (`RequestCs`, `GRANT`, `INQUIRE`, `FAILED`).
//! - **Voter**: hands its single vote to one requester at a time and queues
//!   the rest by priority (`REQUEST`, `RELEASE`, `RELINQUISH`).
//!
//! [`ProcessStateMachine`] composes the two and implements
//! [`maekawa_core::StateMachine`]. All I/O is performed by the runner via the
//! returned `Action`s.

mod process;
mod requester;
mod voter;

pub use process::ProcessStateMachine;
pub use requester::RequesterState;
pub use voter::VoterState;
