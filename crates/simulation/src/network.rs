//! In-process message bus.
//!
//! Messages are queued per `(sender, receiver)` channel, so two messages
//! from A to B are always delivered in send order. Which channel delivers
//! next is up to the [`DeliveryOrder`].

use crate::RoutingError;
use maekawa_messages::Message;
use maekawa_types::{ConfigError, ProcessId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use tracing::trace;

/// How the bus picks the next channel to deliver from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryOrder {
    /// Global send order.
    #[default]
    Fifo,

    /// Random non-empty channel, drawn from the runner's seeded RNG.
    Shuffled,
}

impl fmt::Display for DeliveryOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeliveryOrder::Fifo => "fifo",
            DeliveryOrder::Shuffled => "shuffled",
        })
    }
}

impl FromStr for DeliveryOrder {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fifo" => Ok(DeliveryOrder::Fifo),
            "shuffled" | "random" => Ok(DeliveryOrder::Shuffled),
            _ => Err(ConfigError::InvalidDelivery(s.to_string())),
        }
    }
}

/// Per-channel FIFO message bus for `n` processes.
#[derive(Debug)]
pub struct MessageBus {
    n: usize,
    order: DeliveryOrder,
    /// Non-empty channels only; each entry is tagged with its global send sequence.
    channels: BTreeMap<(ProcessId, ProcessId), VecDeque<(u64, Message)>>,
    next_seq: u64,
    pending: usize,
}

impl MessageBus {
    /// Create an empty bus.
    pub fn new(n: usize, order: DeliveryOrder) -> Self {
        Self {
            n,
            order,
            channels: BTreeMap::new(),
            next_seq: 0,
            pending: 0,
        }
    }

    /// Queue a message for delivery.
    pub fn send(&mut self, msg: Message) -> Result<(), RoutingError> {
        if !msg.from.is_valid_for(self.n) || !msg.to.is_valid_for(self.n) {
            return Err(RoutingError::UnknownProcess {
                from: msg.from,
                to: msg.to,
                n: self.n,
            });
        }

        trace!(message = %msg, seq = self.next_seq, "Queued");
        self.channels
            .entry(msg.channel())
            .or_default()
            .push_back((self.next_seq, msg));
        self.next_seq += 1;
        self.pending += 1;
        Ok(())
    }

    /// Take the next message to deliver, if any.
    pub fn next(&mut self, rng: &mut impl Rng) -> Option<Message> {
        let channel = match self.order {
            DeliveryOrder::Fifo => self
                .channels
                .iter()
                .filter_map(|(key, queue)| queue.front().map(|(seq, _)| (*seq, *key)))
                .min()
                .map(|(_, key)| key)?,
            DeliveryOrder::Shuffled => {
                if self.channels.is_empty() {
                    return None;
                }
                let index = rng.gen_range(0..self.channels.len());
                *self.channels.keys().nth(index)?
            }
        };

        let queue = self.channels.get_mut(&channel)?;
        let (_, msg) = queue.pop_front()?;
        if queue.is_empty() {
            self.channels.remove(&channel);
        }
        self.pending -= 1;
        Some(msg)
    }

    /// Number of undelivered messages.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// True when nothing is left to deliver.
    pub fn is_quiescent(&self) -> bool {
        self.pending == 0
    }
}
