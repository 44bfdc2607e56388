//! Core abstractions shared by every runner.
//!
//! A process is a synchronous state machine: the runner feeds it [`Event`]s
//! and performs the [`Action`]s it returns. The state machine never touches
//! another process directly; all interaction is messages.

mod action;
mod error;
mod event;
mod state;
mod traits;

pub use action::Action;
pub use error::ProtocolViolation;
pub use event::Event;
pub use state::ProcessState;
pub use traits::StateMachine;
