//! Protocol messages for quorum mutual exclusion.

mod message;

pub use message::{Message, MessageKind};
