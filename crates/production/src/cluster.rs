//! One tokio task per process, wired together by unbounded channels.

use crate::ClusterError;
use maekawa_core::{Action, Event, ProcessState, StateMachine};
use maekawa_messages::Message;
use maekawa_mutex::ProcessStateMachine;
use maekawa_types::{ProcessId, QuorumSystem};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info_span, trace, Instrument};

/// Input of a process task.
enum Command {
    /// Feed an event to the state machine. Counted as in flight.
    Event(Event),

    /// Report the current state. Not counted.
    State(oneshot::Sender<ProcessState>),

    /// Stop the task and hand back the state machine.
    Shutdown,
}

/// State shared by the driver and every process task.
struct Shared {
    /// Events enqueued but not yet fully handled.
    in_flight: AtomicUsize,

    /// Signalled when `in_flight` drops to zero.
    idle: Notify,

    /// Processes currently in the critical section.
    holders: AtomicUsize,

    /// First error raised inside a task.
    error: Mutex<Option<ClusterError>>,
}

impl Shared {
    fn record(&self, err: ClusterError) {
        error!(error = %err, "Process task failed");
        let mut slot = self.error.lock();
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    fn settle(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Routes messages to process inboxes.
#[derive(Clone)]
struct Router {
    inboxes: Arc<Vec<mpsc::UnboundedSender<Command>>>,
    shared: Arc<Shared>,
}

impl Router {
    /// Enqueue an event, counting it in flight first.
    fn deliver(&self, id: ProcessId, event: Event) -> Result<(), ClusterError> {
        let inbox = self
            .inboxes
            .get(id.index())
            .ok_or(ClusterError::UnknownProcess(id))?;

        self.shared.in_flight.fetch_add(1, Ordering::SeqCst);
        if inbox.send(Command::Event(event)).is_err() {
            self.shared.settle();
            return Err(ClusterError::Stopped(id));
        }
        Ok(())
    }

    fn send(&self, msg: Message) -> Result<(), ClusterError> {
        if !msg.to.is_valid_for(self.inboxes.len()) {
            return Err(ClusterError::Unroutable(msg));
        }
        trace!(message = %msg, "Routing");
        self.deliver(msg.to, Event::MessageReceived(msg))
    }
}

/// A running cluster of process tasks.
///
/// Each task owns its [`ProcessStateMachine`] and an unbounded inbox; the only
/// way processes affect one another is by message. A task forwards its
/// outgoing messages itself, so two messages from A to B arrive in send order.
///
/// Must be created inside a tokio runtime.
pub struct TaskCluster {
    router: Router,
    tasks: Vec<JoinHandle<ProcessStateMachine>>,
}

impl TaskCluster {
    /// Spawn one task per quorum.
    pub fn spawn(quorums: &QuorumSystem) -> Self {
        let shared = Arc::new(Shared {
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
            holders: AtomicUsize::new(0),
            error: Mutex::new(None),
        });

        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..quorums.len()).map(|_| mpsc::unbounded_channel()).unzip();
        let router = Router {
            inboxes: Arc::new(senders),
            shared,
        };

        let tasks = quorums
            .iter()
            .zip(receivers)
            .map(|((id, quorum), inbox)| {
                let process = ProcessStateMachine::new(id, quorum.clone());
                let span = info_span!("process", id = %id);
                tokio::spawn(run_process(process, inbox, router.clone()).instrument(span))
            })
            .collect();

        debug!(processes = quorums.len(), "Spawned task cluster");
        Self { router, tasks }
    }

    /// Number of processes.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Ask a process to request the critical section.
    pub fn request(&self, id: ProcessId) -> Result<(), ClusterError> {
        self.router.deliver(id, Event::RequestCs)
    }

    /// Ask a process to leave the critical section.
    pub fn release(&self, id: ProcessId) -> Result<(), ClusterError> {
        self.router.deliver(id, Event::ReleaseCs)
    }

    /// Current state of a process, as seen by its own task.
    pub async fn state(&self, id: ProcessId) -> Result<ProcessState, ClusterError> {
        let inbox = self
            .router
            .inboxes
            .get(id.index())
            .ok_or(ClusterError::UnknownProcess(id))?;

        let (tx, rx) = oneshot::channel();
        inbox
            .send(Command::State(tx))
            .map_err(|_| ClusterError::Stopped(id))?;
        rx.await.map_err(|_| ClusterError::Stopped(id))
    }

    /// Processes currently in a given state.
    pub async fn processes_in(&self, state: ProcessState) -> Result<Vec<ProcessId>, ClusterError> {
        let mut matching = Vec::new();
        for index in 0..self.len() {
            let id = ProcessId(index as u32);
            if self.state(id).await? == state {
                matching.push(id);
            }
        }
        Ok(matching)
    }

    /// Wait until no event is in flight.
    ///
    /// Fails with the first error any task recorded, or with
    /// [`ClusterError::Timeout`] if the cluster is still busy after `timeout`.
    pub async fn wait_quiescent(&self, timeout: Duration) -> Result<(), ClusterError> {
        let shared = &self.router.shared;
        let idle = async {
            loop {
                let notified = shared.idle.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if shared.in_flight.load(Ordering::SeqCst) == 0 {
                    break;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, idle)
            .await
            .map_err(|_| ClusterError::Timeout(timeout))?;

        match shared.error.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Stop every task and return the final state machines in id order.
    pub async fn shutdown(self) -> Vec<ProcessStateMachine> {
        for inbox in self.router.inboxes.iter() {
            let _ = inbox.send(Command::Shutdown);
        }

        let mut processes = Vec::with_capacity(self.tasks.len());
        for task in self.tasks {
            match task.await {
                Ok(process) => processes.push(process),
                Err(err) => error!(error = %err, "Process task panicked"),
            }
        }
        debug!(processes = processes.len(), "Task cluster stopped");
        processes
    }
}

async fn run_process(
    mut process: ProcessStateMachine,
    mut inbox: mpsc::UnboundedReceiver<Command>,
    router: Router,
) -> ProcessStateMachine {
    let shared = Arc::clone(&router.shared);

    while let Some(command) = inbox.recv().await {
        match command {
            Command::Event(event) => {
                match process.handle(event) {
                    Ok(actions) => dispatch(&router, &shared, actions),
                    Err(violation) => shared.record(violation.into()),
                }
                shared.settle();
            }
            Command::State(reply) => {
                let _ = reply.send(process.state());
            }
            Command::Shutdown => break,
        }
    }
    process
}

/// Apply a handler's actions: bookkeeping first, so a holder is counted out
/// before its RELEASE can let anyone else in.
fn dispatch(router: &Router, shared: &Shared, actions: Vec<Action>) {
    let mut outgoing = Vec::new();
    for action in actions {
        match action {
            Action::Send(msg) => outgoing.push(msg),
            Action::EnteredCriticalSection { .. } => {
                let holders = shared.holders.fetch_add(1, Ordering::SeqCst) + 1;
                if holders > 1 {
                    shared.record(ClusterError::MutualExclusionViolated { holders });
                }
            }
            Action::ExitedCriticalSection { .. } => {
                shared.holders.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    for msg in outgoing {
        if let Err(err) = router.send(msg) {
            shared.record(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maekawa_types::{QuorumBuilder, Timestamp};
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn test_fresh_cluster_is_quiescent() {
        let cluster = TaskCluster::spawn(&QuorumBuilder::new(4).build().unwrap());
        assert_eq!(cluster.len(), 4);
        cluster
            .wait_quiescent(Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(
            cluster.processes_in(ProcessState::Released).await.unwrap().len(),
            4
        );
        assert!(logs_contain("Spawned task cluster"));
        cluster.shutdown().await;
    }

    #[tokio::test]
    async fn test_unroutable_message_rejected() {
        let cluster = TaskCluster::spawn(&QuorumBuilder::new(2).build().unwrap());
        let msg = Message::grant(ProcessId(0), ProcessId(5), Timestamp(1));
        assert_eq!(cluster.router.send(msg), Err(ClusterError::Unroutable(msg)));
        assert_eq!(cluster.router.shared.in_flight.load(Ordering::SeqCst), 0);
        cluster.shutdown().await;
    }
}
