//! Task cluster scenarios.

use maekawa_core::{ProcessState, ProtocolViolation, StateMachine};
use maekawa_production::{ClusterError, TaskCluster};
use maekawa_test_helpers::{all_others_quorums, ring_quorums};
use maekawa_types::{ProcessId, QuorumBuilder, QuorumLayout};
use std::time::Duration;

const QUIET: Duration = Duration::from_secs(5);

/// Request from every id in `contenders`, then release holders one round at a
/// time. Returns the order in which processes held the critical section.
async fn contend(cluster: &TaskCluster, contenders: &[u32]) -> Vec<ProcessId> {
    for &id in contenders {
        cluster.request(ProcessId(id)).unwrap();
    }

    let mut order = Vec::new();
    loop {
        cluster.wait_quiescent(QUIET).await.unwrap();
        let holders = cluster.processes_in(ProcessState::Held).await.unwrap();
        if holders.is_empty() {
            break;
        }
        assert_eq!(holders.len(), 1);
        order.extend(holders.iter().copied());
        for id in holders {
            cluster.release(id).unwrap();
        }
    }
    order
}

#[tokio::test]
async fn single_requester_on_ring() {
    let cluster = TaskCluster::spawn(&ring_quorums(5, 2));

    cluster.request(ProcessId(2)).unwrap();
    cluster.wait_quiescent(QUIET).await.unwrap();
    assert_eq!(cluster.state(ProcessId(2)).await, Ok(ProcessState::Held));
    assert_eq!(cluster.state(ProcessId(0)).await, Ok(ProcessState::Released));

    cluster.release(ProcessId(2)).unwrap();
    cluster.wait_quiescent(QUIET).await.unwrap();
    assert_eq!(cluster.state(ProcessId(2)).await, Ok(ProcessState::Released));

    let processes = cluster.shutdown().await;
    assert_eq!(processes.len(), 5);
    assert!(processes.iter().all(|p| p.voting_for().is_none()));
}

#[tokio::test]
async fn two_contenders_take_turns() {
    let cluster = TaskCluster::spawn(&all_others_quorums(3));
    let mut order = contend(&cluster, &[0, 1]).await;
    order.sort();
    assert_eq!(order, vec![ProcessId(0), ProcessId(1)]);
    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn everyone_contends_on_grid() {
    for n in [4, 9, 16] {
        let quorums = QuorumBuilder::new(n).build().unwrap();
        let cluster = TaskCluster::spawn(&quorums);

        let everyone: Vec<u32> = (0..n as u32).collect();
        let mut order = contend(&cluster, &everyone).await;
        order.sort();
        assert_eq!(order, everyone.iter().copied().map(ProcessId).collect::<Vec<_>>());

        let processes = cluster.shutdown().await;
        for process in &processes {
            assert_eq!(process.state(), ProcessState::Released);
            assert!(process.votes_granted().is_empty());
            assert!(process.voting_for().is_none());
            assert!(process.deferred_requests().is_empty());
        }
    }
}

#[tokio::test]
async fn release_without_holding_is_reported() {
    let cluster = TaskCluster::spawn(&QuorumBuilder::new(3).build().unwrap());

    cluster.release(ProcessId(1)).unwrap();
    let err = cluster.wait_quiescent(QUIET).await.unwrap_err();
    assert_eq!(
        err,
        ClusterError::Protocol(ProtocolViolation::NotHeld {
            id: ProcessId(1),
            state: ProcessState::Released,
        })
    );
    cluster.shutdown().await;
}

#[tokio::test]
async fn unknown_process_rejected() {
    let cluster = TaskCluster::spawn(&QuorumBuilder::new(3).build().unwrap());
    assert_eq!(
        cluster.request(ProcessId(7)),
        Err(ClusterError::UnknownProcess(ProcessId(7)))
    );
    assert_eq!(
        cluster.state(ProcessId(3)).await,
        Err(ClusterError::UnknownProcess(ProcessId(3)))
    );
    cluster.shutdown().await;
}

#[tokio::test]
async fn disjoint_quorums_caught_by_holder_count() {
    let quorums = QuorumBuilder::new(3)
        .layout(QuorumLayout::Ring { span: 1 })
        .build()
        .unwrap();
    let cluster = TaskCluster::spawn(&quorums);

    cluster.request(ProcessId(0)).unwrap();
    cluster.request(ProcessId(2)).unwrap();
    assert_eq!(
        cluster.wait_quiescent(QUIET).await,
        Err(ClusterError::MutualExclusionViolated { holders: 2 })
    );
    cluster.shutdown().await;
}

#[tokio::test]
async fn clocks_advance_across_rounds() {
    let cluster = TaskCluster::spawn(&QuorumBuilder::new(9).build().unwrap());
    for _ in 0..3 {
        contend(&cluster, &[0, 4, 8]).await;
    }

    let processes = cluster.shutdown().await;
    assert!(processes.iter().all(|p| p.clock().0 >= 3));
}
