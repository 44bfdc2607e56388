//! Inbound events.

use maekawa_messages::Message;

/// Everything that can happen to a process.
///
/// The driver produces `RequestCs` and `ReleaseCs`; the runner produces
/// `MessageReceived` when the bus delivers a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Ask for the critical section.
    RequestCs,

    /// Leave the critical section.
    ReleaseCs,

    /// A message addressed to this process was delivered.
    MessageReceived(Message),
}
