//! Connection pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{lock_api::MutexGuard, Mutex, RawMutex};
use tokio::select;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::inner::Popped;
use super::{
    Address, Backoff, Comms, Config, Diagnostics, Error, Healthcheck, Inner, Lease, PoolConfig,
    SlotState, State,
};
use crate::backend::{Connector, DisconnectReason, Endpoint, TcpConnector};

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);
fn next_pool_id() -> u64 {
    ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Connection pool.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<InnerSync>,
}

pub(crate) struct InnerSync {
    pub(super) comms: Comms,
    pub(super) inner: Mutex<Inner>,
    pub(super) id: u64,
    pub(super) config: Config,
    pub(super) connector: Arc<dyn Connector>,
    pub(super) diagnostics: Diagnostics,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.inner.id)
            .field("total", &self.lock().total())
            .finish()
    }
}

impl Pool {
    /// Create new connection pool. No connections are opened
    /// until someone asks for one.
    pub fn new(config: &PoolConfig, connector: Arc<dyn Connector>) -> Self {
        let id = next_pool_id();
        Self {
            inner: Arc::new(InnerSync {
                comms: Comms::new(),
                inner: Mutex::new(Inner::new(
                    &config.addresses,
                    config.config,
                    Instant::now(),
                )),
                id,
                config: config.config,
                connector,
                diagnostics: Diagnostics::new(),
            }),
        }
    }

    /// Create a pool connecting over TCP, as configured.
    pub fn from_config(config: &tsdbpool_config::Config) -> Self {
        Self::new(
            &PoolConfig::new(config),
            Arc::new(TcpConnector::from_config(config)),
        )
    }

    /// Get a healthy connection, waiting as long as it takes.
    ///
    /// Only fails if `cancel` is cancelled.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<Lease, Error> {
        let mut backoff = Backoff::new();

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            // Listen before looking, so a release that happens
            // while we're busy isn't missed.
            let notified = self.comms().ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            // Anything lent out while connecting or testing is faulted
            // back into the dead queue when its future is dropped.
            let lease = select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                lease = self.try_reuse_or_revive() => lease,
            };

            if let Some(lease) = lease {
                return Ok(lease);
            }

            let delay = backoff.next_delay();
            debug!(
                "no connections, waiting up to {}ms [pool: {}, attempt: {}]",
                delay.as_millis(),
                self.id(),
                backoff.attempt(),
            );

            select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = &mut notified => (),
                _ = sleep(delay) => (),
            }
        }
    }

    /// Get a connection, waiting at most `max_wait_time`.
    pub async fn get(&self) -> Result<Lease, Error> {
        let cancel = CancellationToken::new();
        timeout(self.config().max_wait_time(), self.acquire(&cancel))
            .await
            .map_err(|_| Error::CheckoutTimeout)?
    }

    async fn try_reuse_or_revive(&self) -> Option<Lease> {
        if let Some(lease) = self.try_reuse().await {
            return Some(lease);
        }

        self.try_revive().await
    }

    /// Reuse an idle connection, newest first.
    async fn try_reuse(&self) -> Option<Lease> {
        loop {
            let checkout = match self.lock().take_available(Instant::now())? {
                Popped::Ready(checkout) => checkout,
                Popped::Expired(mut endpoint) => {
                    debug!("connection expired [{}]", endpoint.addr());
                    endpoint.disconnect_reason(DisconnectReason::Old);
                    endpoint.close();
                    continue;
                }
            };

            let mut lease = Lease::new(
                self.clone(),
                checkout.position,
                checkout.generation,
                checkout.endpoint,
            );

            if !checkout.needs_test {
                return Some(lease);
            }

            if Healthcheck::conditional(&mut lease, self)
                .healthcheck()
                .await
                .is_ok()
            {
                let result =
                    self.lock()
                        .tested(lease.position(), lease.generation(), Instant::now());
                if let Err(err) = result {
                    warn!("{} [pool: {}]", err, self.id());
                }
                return Some(lease);
            }

            self.discard_lease(lease, DisconnectReason::Unhealthy);
        }
    }

    /// Connect the slot that has been dead the longest.
    async fn try_revive(&self) -> Option<Lease> {
        let revival = self.lock().take_dead()?;
        let mut lease = Lease::claim(self.clone(), revival.position, revival.generation);

        match self.inner.connector.open(&revival.address).await {
            Ok(endpoint) => lease.attach(endpoint),
            Err(err) => {
                warn!("couldn't connect: {} [{}]", err, revival.address);
                self.discard_lease(lease, DisconnectReason::Other);
                return None;
            }
        }

        if Healthcheck::mandatory(&mut lease, self)
            .healthcheck()
            .await
            .is_err()
        {
            self.discard_lease(lease, DisconnectReason::Unhealthy);
            return None;
        }

        let result = self
            .lock()
            .revived(revival.position, revival.generation, Instant::now());
        if let Err(err) = result {
            warn!("{} [pool: {}]", err, self.id());
        }

        debug!("slot {} revived [{}]", revival.position, revival.address);

        Some(lease)
    }

    /// Return a connection to the pool.
    pub fn release(&self, mut lease: Lease) {
        if !self.owns(&lease) {
            warn!(
                "release ignored: {} [pool: {}, lease pool: {}]",
                Error::ForeignLease,
                self.id(),
                lease.pool.id()
            );
            return;
        }

        let (position, generation, endpoint) = lease.detach();

        let result = match endpoint {
            Some(endpoint) => self.lock().check_in(position, generation, endpoint),
            None => self.lock().kill(position, generation).map(|_| SlotState::Dead),
        };

        match result {
            Ok(state) => {
                debug!("slot {} released, now {} [pool: {}]", position, state, self.id());
                self.comms().ready.notify_waiters();
            }
            Err(err) => warn!("release ignored: {} [pool: {}]", err, self.id()),
        }
    }

    /// Close a connection that misbehaved and send its slot
    /// to the back of the dead queue.
    pub fn fault(&self, mut lease: Lease) {
        if !self.owns(&lease) {
            warn!(
                "fault ignored: {} [pool: {}, lease pool: {}]",
                Error::ForeignLease,
                self.id(),
                lease.pool.id()
            );
            return;
        }

        let (position, generation, endpoint) = lease.detach();
        self.discard(position, generation, endpoint, DisconnectReason::Fault);
        self.comms().ready.notify_waiters();
    }

    /// Add a slot for the address. It's connected the next time
    /// someone needs a connection.
    pub fn add_address(&self, address: Address) -> usize {
        let position = self.lock().add(address.clone(), Instant::now());
        info!("added slot {} [{}, pool: {}]", position, address, self.id());
        self.comms().ready.notify_waiters();
        position
    }

    fn discard_lease(&self, mut lease: Lease, reason: DisconnectReason) {
        let (position, generation, endpoint) = lease.detach();
        self.discard(position, generation, endpoint, reason);
    }

    /// Close the connection and kill its slot.
    pub(super) fn discard(
        &self,
        position: usize,
        generation: u64,
        endpoint: Option<Endpoint>,
        reason: DisconnectReason,
    ) {
        if let Some(mut endpoint) = endpoint {
            endpoint.disconnect_reason(reason);
            endpoint.close();
        }

        if let Err(err) = self.lock().kill(position, generation) {
            warn!("fault ignored: {} [pool: {}]", err, self.id());
        }
    }

    fn owns(&self, lease: &Lease) -> bool {
        Arc::ptr_eq(&self.inner, &lease.pool.inner)
    }

    /// Pool state.
    pub fn state(&self) -> State {
        State::get(self)
    }

    /// Backend errors seen since the last call. Resets the count.
    pub fn clear_error_count(&self) -> usize {
        self.inner.diagnostics.clear_error_count()
    }

    /// The backend reported a collision since the last call.
    pub fn has_collision(&self) -> bool {
        self.inner.diagnostics.has_collision()
    }

    /// Pool unique identifier.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Pool configuration.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Lock the pool internals.
    #[inline]
    pub(crate) fn lock(&self) -> MutexGuard<'_, RawMutex, Inner> {
        self.inner.inner.lock()
    }

    #[inline]
    pub(super) fn comms(&self) -> &Comms {
        &self.inner.comms
    }

    #[inline]
    pub(super) fn diagnostics(&self) -> &Diagnostics {
        &self.inner.diagnostics
    }
}
