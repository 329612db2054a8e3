//! Pool tests.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::spawn;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tsdbpool_config::Validation;

use super::*;
use crate::backend::{self, Connector, Endpoint, TcpConnector};


pub use backend_mock::{MockBackend, Reply, BANNER};

const COLLISION: &str = "put: HBase error: 1000 RPCs waiting on \"tsdb,,1398325180794.54ad8182f2f2a0a1cc6d39ba26ca7f64.\" to come back online";

pub fn pool_with(addresses: Vec<Address>, config: Config) -> Pool {
    Pool::new(
        &PoolConfig { addresses, config },
        Arc::new(TcpConnector::default()),
    )
}

pub fn pool(backend: &MockBackend) -> Pool {
    pool_with(vec![backend.address()], Config::default())
}

/// Refuses every connection.
#[derive(Debug, Default)]
struct FailingConnector {
    attempts: AtomicUsize,
}

#[async_trait]
impl Connector for FailingConnector {
    async fn open(&self, _addr: &Address) -> Result<Endpoint, backend::Error> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(backend::Error::Io(ErrorKind::ConnectionRefused.into()))
    }
}

/// Never finishes connecting.
#[derive(Debug, Default)]
struct HangingConnector;

#[async_trait]
impl Connector for HangingConnector {
    async fn open(&self, _addr: &Address) -> Result<Endpoint, backend::Error> {
        std::future::pending().await
    }
}

/// Takes a while to fail.
#[derive(Debug, Default)]
struct SlowConnector;

#[async_trait]
impl Connector for SlowConnector {
    async fn open(&self, _addr: &Address) -> Result<Endpoint, backend::Error> {
        sleep(Duration::from_secs(3)).await;
        Err(backend::Error::Io(ErrorKind::TimedOut.into()))
    }
}

fn cancel_after(duration: Duration) -> CancellationToken {
    let cancel = CancellationToken::new();
    spawn({
        let cancel = cancel.clone();
        async move {
            sleep(duration).await;
            cancel.cancel();
        }
    });
    cancel
}

#[tokio::test]
async fn test_pool_checkout() {
    crate::logger();
    let backend = MockBackend::start().await;
    let pool = pool(&backend);

    assert_eq!(pool.lock().total(), 1);
    assert_eq!(pool.lock().dead(), 1);
    assert_eq!(backend.connections(), 0);

    let lease = pool.acquire(&CancellationToken::new()).await.unwrap();
    let id = lease.id();

    assert_eq!(backend.connections(), 1);
    assert_eq!(backend.probes(), 1);
    assert_eq!(pool.lock().lent(), 1);
    pool.lock().check();

    pool.release(lease);
    assert_eq!(pool.lock().available(), 1);

    // Tested just now, no need to probe again.
    let lease = pool.acquire(&CancellationToken::new()).await.unwrap();
    assert_eq!(lease.id(), id);
    assert_eq!(backend.probes(), 1);
    assert_eq!(backend.connections(), 1);

    pool.release(lease);
    pool.lock().check();
}

#[tokio::test]
async fn test_put() {
    crate::logger();
    let backend = MockBackend::start().await;
    let pool = pool(&backend);

    let mut lease = pool.get().await.unwrap();
    lease
        .put(&backend::Metric::new("sys.cpu.user", 1356998400, 42.5).with_tag("host", "web01"))
        .await
        .unwrap();
    lease.flush().await.unwrap();
    pool.release(lease);

    backend.wait_for_received(1).await;
    assert_eq!(
        backend.received(),
        vec!["put sys.cpu.user 1356998400 42.5 host=web01".to_string()]
    );
}

#[tokio::test]
async fn test_reuse_is_lifo() {
    crate::logger();
    let backend = MockBackend::start().await;
    let pool = pool_with(
        vec![backend.address(), backend.address()],
        Config::default(),
    );

    let x = pool.get().await.unwrap();
    let y = pool.get().await.unwrap();
    let (x_id, y_id) = (x.id(), y.id());
    assert_ne!(x_id, y_id);

    pool.release(x);
    pool.release(y);
    assert_eq!(pool.lock().available_order(), vec![1, 0]);

    let first = pool.get().await.unwrap();
    let second = pool.get().await.unwrap();
    assert_eq!(first.id(), y_id);
    assert_eq!(second.id(), x_id);
    assert_eq!(backend.connections(), 2);
}

#[tokio::test]
async fn test_revival_is_fifo() {
    crate::logger();
    let a = MockBackend::start().await;
    let b = MockBackend::start().await;
    let pool = pool_with(vec![a.address(), b.address()], Config::default());

    let first = pool.get().await.unwrap();
    let second = pool.get().await.unwrap();

    assert_eq!(first.addr(), &a.address());
    assert_eq!(second.addr(), &b.address());
    assert_eq!(a.connections(), 1);
    assert_eq!(b.connections(), 1);
}

#[tokio::test]
async fn test_expired_connection_is_replaced() {
    crate::logger();
    let backend = MockBackend::start().await;
    let pool = pool_with(
        vec![backend.address()],
        Config {
            max_keep_alive_time: Duration::from_millis(50),
            min_test_interval: Duration::from_millis(50),
            ..Default::default()
        },
    );

    let lease = pool.get().await.unwrap();
    let id = lease.id();
    pool.release(lease);

    sleep(Duration::from_millis(60)).await;

    let lease = pool.get().await.unwrap();
    assert_ne!(lease.id(), id);
    assert_eq!(backend.connections(), 2);
    // Expired connection isn't probed, the new one is.
    assert_eq!(backend.probes(), 2);
    assert_eq!(pool.lock().lent(), 1);
    assert_eq!(pool.lock().dead(), 0);
    pool.lock().check();
}

#[tokio::test]
async fn test_probe_interval() {
    crate::logger();
    let backend = MockBackend::start().await;
    let pool = pool_with(
        vec![backend.address()],
        Config {
            min_test_interval: Duration::from_millis(20),
            ..Default::default()
        },
    );

    let lease = pool.get().await.unwrap();
    let id = lease.id();
    pool.release(lease);

    let lease = pool.get().await.unwrap();
    assert_eq!(backend.probes(), 1);
    pool.release(lease);

    sleep(Duration::from_millis(30)).await;

    let lease = pool.get().await.unwrap();
    assert_eq!(lease.id(), id);
    assert_eq!(backend.probes(), 2);
    pool.release(lease);

    // Probe moved the test timestamp forward.
    let lease = pool.get().await.unwrap();
    assert_eq!(backend.probes(), 2);
    pool.release(lease);
}

#[tokio::test]
async fn test_backend_errors() {
    crate::logger();
    let backend = MockBackend::start().await;
    let pool = pool_with(
        vec![backend.address()],
        Config {
            min_test_interval: Duration::ZERO,
            ..Default::default()
        },
    );

    let lease = pool.get().await.unwrap();
    pool.release(lease);
    assert!(!pool.has_collision());
    assert_eq!(pool.clear_error_count(), 0);

    backend.set_reply(Reply::Errors(vec![COLLISION.into()]));

    // Reused connection fails its probe, so does the revived one.
    let result = pool.acquire(&cancel_after(Duration::from_millis(100))).await;
    assert_eq!(result.unwrap_err(), Error::Cancelled);

    assert_eq!(backend.probes(), 3);
    assert_eq!(backend.connections(), 2);
    assert_eq!(pool.state().errors, 2);
    assert!(pool.has_collision());
    assert!(!pool.has_collision());
    assert_eq!(pool.clear_error_count(), 2);
    assert_eq!(pool.clear_error_count(), 0);

    assert_eq!(pool.lock().dead(), 1);
    assert_eq!(pool.lock().lent(), 0);
    pool.lock().check();

    // Backend recovered.
    backend.set_reply(Reply::Banner);
    let lease = pool.get().await.unwrap();
    assert_eq!(backend.connections(), 3);
    pool.release(lease);
}

#[tokio::test]
async fn test_garbage_probe_reply() {
    crate::logger();
    let backend = MockBackend::start().await;
    backend.set_reply(Reply::Errors(vec!["HTTP/1.1 400 Bad Request".into()]));
    let pool = pool(&backend);

    let result = pool.acquire(&cancel_after(Duration::from_millis(50))).await;
    assert_eq!(result.unwrap_err(), Error::Cancelled);
    assert_eq!(pool.clear_error_count(), 1);
    assert!(!pool.has_collision());
    assert_eq!(pool.lock().dead(), 1);
}

#[tokio::test]
async fn test_cancel_while_connecting() {
    crate::logger();
    let pool = Pool::new(
        &PoolConfig {
            addresses: vec![Address::new("127.0.0.1", 1)],
            config: Config::default(),
        },
        Arc::new(SlowConnector),
    );

    let started = Instant::now();
    let result = pool.acquire(&cancel_after(Duration::from_millis(50))).await;

    assert_eq!(result.unwrap_err(), Error::Cancelled);
    assert!(started.elapsed() < Duration::from_millis(550));

    let state = pool.state();
    assert_eq!(state.total, 1);
    assert_eq!(state.dead, 1);
    assert_eq!(state.lent, 0);
    pool.lock().check();
}

#[tokio::test]
async fn test_cancel_while_testing() {
    crate::logger();
    let backend = MockBackend::start().await;
    backend.set_reply(Reply::Silent);
    let pool = pool(&backend);

    let started = Instant::now();
    let result = pool.acquire(&cancel_after(Duration::from_millis(50))).await;

    assert_eq!(result.unwrap_err(), Error::Cancelled);
    assert!(started.elapsed() < Duration::from_millis(550));
    assert_eq!(backend.connections(), 1);
    assert_eq!(pool.lock().dead(), 1);
    assert_eq!(pool.lock().lent(), 0);
    pool.lock().check();
}

#[tokio::test]
async fn test_banner_split_across_segments() {
    crate::logger();
    let backend = MockBackend::start().await;
    backend.set_reply(Reply::SplitBanner(Duration::from_millis(20)));
    let pool = pool_with(
        vec![backend.address()],
        Config {
            min_test_interval: Duration::ZERO,
            ..Default::default()
        },
    );

    let lease = pool.get().await.unwrap();
    let id = lease.id();
    pool.release(lease);

    // `Built on` from the last reply hasn't arrived yet.
    let lease = pool.get().await.unwrap();
    assert_eq!(lease.id(), id);
    pool.release(lease);

    // Now it's waiting in the socket.
    sleep(Duration::from_millis(50)).await;
    let lease = pool.get().await.unwrap();
    assert_eq!(lease.id(), id);
    pool.release(lease);

    assert_eq!(backend.connections(), 1);
    assert_eq!(backend.probes(), 3);
    assert_eq!(pool.clear_error_count(), 0);
}

#[tokio::test]
async fn test_connect_failure_and_cancel() {
    crate::logger();
    let connector = Arc::new(FailingConnector::default());
    let pool = Pool::new(
        &PoolConfig {
            addresses: vec![Address::new("127.0.0.1", 1)],
            config: Config::default(),
        },
        connector.clone(),
    );

    let started = Instant::now();
    let result = pool.acquire(&cancel_after(Duration::from_millis(100))).await;

    assert_eq!(result.unwrap_err(), Error::Cancelled);
    assert!(started.elapsed() < Duration::from_millis(600));
    assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);

    let state = pool.state();
    assert_eq!(state.total, 1);
    assert_eq!(state.dead, 1);
    assert_eq!(state.lent, 0);
    pool.lock().check();
}

#[tokio::test]
async fn test_cancelled_before_acquire() {
    crate::logger();
    let backend = MockBackend::start().await;
    let pool = pool(&backend);

    let cancel = CancellationToken::new();
    cancel.cancel();

    assert_eq!(pool.acquire(&cancel).await.unwrap_err(), Error::Cancelled);
    assert_eq!(backend.connections(), 0);
    assert_eq!(pool.lock().dead(), 1);
}

#[tokio::test]
async fn test_fault() {
    crate::logger();
    let backend = MockBackend::start().await;
    let pool = pool_with(
        vec![backend.address(), backend.address()],
        Config::default(),
    );

    let x = pool.get().await.unwrap();
    let position = x.position();
    pool.fault(x);

    assert_eq!(pool.lock().dead_order(), vec![1, position]);
    assert_eq!(pool.lock().lent(), 0);
    pool.lock().check();

    // Other slot is revived first.
    let y = pool.get().await.unwrap();
    assert_eq!(y.position(), 1);
    assert_eq!(backend.connections(), 2);
}

#[tokio::test]
async fn test_release_closed_connection() {
    crate::logger();
    let backend = MockBackend::start().await;
    let pool = pool(&backend);

    let mut lease = pool.get().await.unwrap();
    lease.close();
    pool.release(lease);

    assert_eq!(pool.lock().dead(), 1);
    assert_eq!(pool.lock().available(), 0);
    pool.lock().check();
}

#[tokio::test]
async fn test_foreign_lease() {
    crate::logger();
    let backend = MockBackend::start().await;
    let ours = pool(&backend);
    let theirs = pool(&backend);

    let lease = theirs.get().await.unwrap();
    ours.release(lease);

    // Untouched.
    assert_eq!(ours.lock().dead(), 1);
    assert_eq!(ours.lock().lent(), 0);

    // Dropped lease went back to where it came from.
    assert_eq!(theirs.lock().dead(), 1);
    assert_eq!(theirs.lock().lent(), 0);
    theirs.lock().check();
}

#[tokio::test]
async fn test_dropped_lease_is_faulted() {
    crate::logger();
    let backend = MockBackend::start().await;
    let pool = pool(&backend);

    let lease = pool.get().await.unwrap();
    drop(lease);

    assert_eq!(pool.lock().dead(), 1);
    assert_eq!(pool.lock().lent(), 0);
    pool.lock().check();
}

#[tokio::test]
async fn test_add_address_wakes_waiter() {
    crate::logger();
    let backend = MockBackend::start().await;
    let pool = pool_with(vec![], Config::default());

    let started = Instant::now();
    let waiter = spawn({
        let pool = pool.clone();
        async move { pool.acquire(&CancellationToken::new()).await }
    });

    sleep(Duration::from_millis(50)).await;
    assert_eq!(pool.add_address(backend.address()), 0);

    let lease = waiter.await.unwrap().unwrap();
    assert!(started.elapsed() < Duration::from_millis(400));
    assert_eq!(lease.addr(), &backend.address());
    assert_eq!(pool.lock().total(), 1);
}

#[tokio::test]
async fn test_release_wakes_waiter() {
    crate::logger();
    let backend = MockBackend::start().await;
    let pool = pool(&backend);

    let lease = pool.get().await.unwrap();
    let id = lease.id();

    let waiter = spawn({
        let pool = pool.clone();
        async move { pool.acquire(&CancellationToken::new()).await }
    });

    sleep(Duration::from_millis(50)).await;
    let started = Instant::now();
    pool.release(lease);

    let lease = waiter.await.unwrap().unwrap();
    assert!(started.elapsed() < Duration::from_millis(400));
    assert_eq!(lease.id(), id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_access() {
    crate::logger();
    let backend = MockBackend::start().await;
    let pool = pool_with(vec![backend.address(); 3], Config::default());
    let lent = Arc::new(Mutex::new(HashSet::new()));

    let tasks = (0..12).map(|_| {
        let pool = pool.clone();
        let lent = lent.clone();
        spawn(async move {
            for _ in 0..5 {
                let lease = pool.acquire(&CancellationToken::new()).await.unwrap();
                assert!(lent.lock().insert(lease.position()));
                sleep(Duration::from_millis(2)).await;
                assert!(lent.lock().remove(&lease.position()));
                pool.release(lease);
            }
        })
    });

    for result in join_all(tasks).await {
        result.unwrap();
    }

    assert_eq!(pool.lock().total(), 3);
    assert_eq!(pool.lock().lent(), 0);
    assert_eq!(backend.connections(), pool.lock().available());
    pool.lock().check();
}

#[tokio::test]
async fn test_checkout_timeout() {
    crate::logger();
    let pool = Pool::new(
        &PoolConfig {
            addresses: vec![Address::new("127.0.0.1", 1)],
            config: Config {
                max_wait_time: Duration::from_millis(100),
                ..Default::default()
            },
        },
        Arc::new(FailingConnector::default()),
    );

    assert_eq!(pool.get().await.unwrap_err(), Error::CheckoutTimeout);
    assert_eq!(pool.lock().dead(), 1);
    assert_eq!(pool.lock().lent(), 0);
}

#[tokio::test]
async fn test_timeout_while_connecting() {
    crate::logger();
    let pool = Pool::new(
        &PoolConfig {
            addresses: vec![Address::new("127.0.0.1", 1)],
            config: Config {
                max_wait_time: Duration::from_millis(50),
                ..Default::default()
            },
        },
        Arc::new(HangingConnector),
    );

    assert_eq!(pool.get().await.unwrap_err(), Error::CheckoutTimeout);

    // Slot being revived went back to the dead queue.
    assert_eq!(pool.lock().dead(), 1);
    assert_eq!(pool.lock().lent(), 0);
    pool.lock().check();
}

#[tokio::test]
async fn test_passive_validation() {
    crate::logger();
    let backend = MockBackend::start().await;
    let pool = pool_with(
        vec![backend.address()],
        Config {
            min_test_interval: Duration::ZERO,
            validation: Validation::Passive,
            ..Default::default()
        },
    );

    let lease = pool.get().await.unwrap();
    let id = lease.id();
    pool.release(lease);

    let lease = pool.get().await.unwrap();
    assert_eq!(lease.id(), id);
    // Revival probed, reuse didn't.
    assert_eq!(backend.probes(), 1);
    pool.release(lease);

    backend.disconnect_all();
    sleep(Duration::from_millis(50)).await;

    let lease = pool.get().await.unwrap();
    assert_ne!(lease.id(), id);
    assert_eq!(backend.connections(), 2);
    assert_eq!(backend.probes(), 2);
    assert_eq!(pool.clear_error_count(), 1);
}

#[tokio::test]
async fn test_state() {
    crate::logger();
    let backend = MockBackend::start().await;
    let pool = pool_with(
        vec![backend.address(), backend.address(), backend.address()],
        Config::default(),
    );

    let x = pool.get().await.unwrap();
    let y = pool.get().await.unwrap();
    pool.release(x);

    let state = pool.state();
    assert_eq!(state.total, 3);
    assert_eq!(state.available, 1);
    assert_eq!(state.lent, 1);
    assert_eq!(state.dead, 1);
    assert_eq!(state.slots[0].state, SlotState::Available);
    assert!(state.slots[0].age_ms.is_some());
    assert_eq!(state.slots[1].state, SlotState::Lent);
    assert_eq!(state.slots[2].state, SlotState::Dead);
    assert_eq!(state.slots[2].address, backend.address().to_string());

    let json = serde_json::to_value(&state).unwrap();
    assert_eq!(json["slots"][1]["state"], "lent");

    pool.release(y);
}
