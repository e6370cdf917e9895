//! Connection registry tests with live connection handlers.

mod common;

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;

use common::{no_timeouts, pair_with, Peer, TransportEvent};
use dashstream::connection::{ConnectionHandler, ConnectionRegistry};
use dashstream::protocol::wire::close_code;
use dashstream::MockDataGenerator;

const SWEEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Start `n` connections; the ones flagged in `failing` fail their close handshake.
fn start_many(
    registry: &Arc<ConnectionRegistry>,
    shutdown: &CancellationToken,
    failing: &[bool],
) -> Vec<Peer> {
    failing
        .iter()
        .map(|&fail_close| {
            let (transport, peer) = pair_with(fail_close);
            let handler = ConnectionHandler::accept(
                transport,
                Arc::clone(registry),
                Arc::new(MockDataGenerator::new()),
                no_timeouts(),
                shutdown,
            );
            tokio::spawn(handler.run());
            peer
        })
        .collect()
}

#[tokio::test]
async fn test_close_all_with_random_failures_empties_registry() {
    let registry = Arc::new(ConnectionRegistry::new());
    let shutdown = CancellationToken::new();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let failing: Vec<bool> = (0..50).map(|_| rng.gen_bool(0.3)).collect();
    let expected_failures = failing.iter().filter(|&&f| f).count();

    let mut peers = start_many(&registry, &shutdown, &failing);
    assert_eq!(registry.count(), 50);

    let report = registry.close_all(SWEEP_TIMEOUT).await;

    assert_eq!(report.attempted(), 50);
    assert_eq!(report.failed.len(), expected_failures);
    assert_eq!(report.closed, 50 - expected_failures);
    assert_eq!(registry.count(), 0);

    // Every transport saw a 1001 close attempt and was released
    for peer in &mut peers {
        let events = peer.until_released().await;
        assert_eq!(events.last(), Some(&TransportEvent::Released));
        let closed = events.iter().find_map(|e| match e {
            TransportEvent::Closed(frame) => frame.clone(),
            _ => None,
        });
        assert_eq!(closed.map(|f| f.code), Some(close_code::AWAY));
    }
}

#[tokio::test]
async fn test_close_all_reports_failure_reasons() {
    let registry = Arc::new(ConnectionRegistry::new());
    let shutdown = CancellationToken::new();
    let _peers = start_many(&registry, &shutdown, &[true, false]);

    let report = registry.close_all(SWEEP_TIMEOUT).await;
    assert_eq!(report.closed, 1);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].1.contains("close handshake failed"));
}

#[tokio::test]
async fn test_close_all_leaves_unrelated_shutdown_token_alone() {
    let registry = Arc::new(ConnectionRegistry::new());
    let shutdown = CancellationToken::new();
    let _peers = start_many(&registry, &shutdown, &[false, false, false]);

    registry.close_all(SWEEP_TIMEOUT).await;
    // Only the per-connection child tokens are cancelled
    assert!(!shutdown.is_cancelled());
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_connections_closing_during_sweep() {
    let registry = Arc::new(ConnectionRegistry::new());
    let shutdown = CancellationToken::new();
    let peers = start_many(&registry, &shutdown, &[false; 10]);

    // Half the clients leave on their own while the sweep runs
    for peer in peers.iter().step_by(2) {
        peer.close(None);
    }
    let report = registry.close_all(SWEEP_TIMEOUT).await;

    assert!(report.failed.is_empty(), "failures: {:?}", report.failed);
    assert_eq!(registry.count(), 0);
}

#[tokio::test]
async fn test_deregister_twice_is_harmless() {
    let registry = Arc::new(ConnectionRegistry::new());
    let shutdown = CancellationToken::new();
    let mut peers = start_many(&registry, &shutdown, &[false]);
    let id = registry.ids().pop().unwrap();

    assert!(registry.deregister(&id));
    assert!(!registry.deregister(&id));

    // The handler's own cleanup later finds nothing to remove
    peers[0].close(None);
    peers[0].until_released().await;
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_registry_shared_across_tasks() {
    let registry = Arc::new(ConnectionRegistry::new());
    let shutdown = CancellationToken::new();

    let mut joins = Vec::new();
    for _ in 0..8 {
        let registry = Arc::clone(&registry);
        let shutdown = shutdown.clone();
        joins.push(tokio::spawn(async move {
            start_many(&registry, &shutdown, &[false; 16])
        }));
    }
    let mut peers = Vec::new();
    for join in joins {
        peers.extend(join.await.unwrap());
    }

    assert_eq!(registry.count(), 128);
    let mut ids = registry.ids();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 128);

    shutdown.cancel();
    registry.close_all(SWEEP_TIMEOUT).await;
    assert!(registry.is_empty());
}
