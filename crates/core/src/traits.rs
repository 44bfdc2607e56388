//! Core traits for state machines.

use crate::{Action, Event, ProcessState, ProtocolViolation};
use maekawa_types::ProcessId;

/// A state machine that processes events.
///
/// This is the core abstraction shared by the deterministic simulation and
/// the task-per-process runner. A process implemented as a state machine is:
///
/// - **Synchronous**: No async, no `.await`
/// - **Deterministic**: Same state + event = same actions
/// - **Pure-ish**: Mutates self, but performs no I/O
///
/// # Example
///
/// ```ignore
/// impl StateMachine for ProcessStateMachine {
///     fn handle(&mut self, event: Event) -> Result<Vec<Action>, ProtocolViolation> {
///         match event {
///             Event::RequestCs => self.request_cs(),
///             Event::ReleaseCs => self.release_cs(),
///             Event::MessageReceived(msg) => self.on_message(msg),
///         }
///     }
///     // ...
/// }
/// ```
pub trait StateMachine {
    /// Process an event, returning actions to perform.
    ///
    /// # Guarantees
    ///
    /// - **Synchronous**: This method never blocks or awaits
    /// - **Deterministic**: Given the same state and event, always returns the same actions
    /// - **No I/O**: All message delivery is performed by the runner via the returned actions
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolViolation`] when the event breaks a precondition
    /// (releasing while not holding, a grant nobody asked for). State is left
    /// unchanged in that case.
    fn handle(&mut self, event: Event) -> Result<Vec<Action>, ProtocolViolation>;

    /// Identity of the process this state machine drives.
    fn id(&self) -> ProcessId;

    /// Current critical-section state.
    fn state(&self) -> ProcessState;
}
