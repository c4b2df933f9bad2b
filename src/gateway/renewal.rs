/// Single-flight coordination for credential renewal.
///
/// One coordinator per gateway. The first request to observe a `401` while the
/// coordinator is idle becomes the leader and runs the refresh call; every
/// other `401` observed before the leader settles is parked as a waiter and
/// receives the leader's outcome.
///
/// State machine: `Idle -> Renewing -> Idle`. The check-and-set in [`begin`]
/// and the reset in [`drain`] each happen under one lock, and the reset only
/// happens together with settling every waiter.
///
/// [`begin`]: RenewalCoordinator::begin
/// [`drain`]: RenewalCoordinator::drain
use prometheus::Gauge;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::debug;

use super::error::RenewalError;

/// New access token, or the reason renewal failed
pub type RenewalOutcome = Result<String, RenewalError>;

#[derive(Default)]
struct State {
    renewing: bool,
    waiters: Vec<oneshot::Sender<RenewalOutcome>>,
}

pub struct RenewalCoordinator {
    state: Mutex<State>,
    // Shared across coordinators; only ever adjusted by this one's own waiters
    waiters_gauge: Gauge,
}

/// Result of asking to renew
pub enum Ticket<'a> {
    /// Caller must run the refresh and settle the flight
    Leader(Flight<'a>),
    /// A renewal is already running; wait for its outcome
    Waiter(Waiter),
}

/// Ownership of the in-flight renewal. Dropping an unsettled flight drains
/// the queue with [`RenewalError::Abandoned`].
pub struct Flight<'a> {
    coordinator: &'a RenewalCoordinator,
    settled: bool,
}

pub struct Waiter {
    rx: oneshot::Receiver<RenewalOutcome>,
}

impl Default for RenewalCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RenewalCoordinator {
    pub fn new() -> Self {
        Self::with_gauge(crate::metrics::METRICS.renewal_waiters.clone())
    }

    /// Report queued requests to `gauge` instead of the global registry
    pub fn with_gauge(gauge: Gauge) -> Self {
        Self {
            state: Mutex::new(State::default()),
            waiters_gauge: gauge,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_renewing(&self) -> bool {
        self.lock().renewing
    }

    /// Number of requests parked behind the current renewal
    pub fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Become the leader if idle, otherwise join the in-flight renewal
    pub fn begin(&self) -> Ticket<'_> {
        let mut state = self.lock();
        if state.renewing {
            Ticket::Waiter(self.push_waiter(&mut state))
        } else {
            state.renewing = true;
            debug!("Credential renewal started");
            Ticket::Leader(Flight {
                coordinator: self,
                settled: false,
            })
        }
    }

    /// Park behind the in-flight renewal. Returns `None` when idle.
    pub fn enqueue(&self) -> Option<Waiter> {
        let mut state = self.lock();
        if state.renewing {
            Some(self.push_waiter(&mut state))
        } else {
            None
        }
    }

    fn push_waiter(&self, state: &mut State) -> Waiter {
        let (tx, rx) = oneshot::channel();
        state.waiters.push(tx);
        self.waiters_gauge.inc();
        debug!(waiting = state.waiters.len(), "Request queued behind renewal");
        Waiter { rx }
    }

    /// Settle every waiter with `outcome` and return to idle.
    ///
    /// Returns the number of waiters settled. Waiters whose caller went away
    /// are counted but otherwise ignored.
    pub fn drain(&self, outcome: RenewalOutcome) -> usize {
        let mut state = self.lock();
        let waiters = std::mem::take(&mut state.waiters);
        let count = waiters.len();
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
        state.renewing = false;
        self.waiters_gauge.sub(count as f64);
        debug!(settled = count, ok = outcome.is_ok(), "Credential renewal settled");
        count
    }
}

impl Flight<'_> {
    pub fn settle(mut self, outcome: RenewalOutcome) -> usize {
        self.settled = true;
        self.coordinator.drain(outcome)
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator.drain(Err(RenewalError::Abandoned));
        }
    }
}

impl Waiter {
    pub async fn wait(self) -> RenewalOutcome {
        self.rx.await.unwrap_or(Err(RenewalError::Abandoned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_leader(ticket: Ticket<'_>) -> Flight<'_> {
        match ticket {
            Ticket::Leader(flight) => flight,
            Ticket::Waiter(_) => panic!("expected to lead the renewal"),
        }
    }

    fn expect_waiter(ticket: Ticket<'_>) -> Waiter {
        match ticket {
            Ticket::Waiter(waiter) => waiter,
            Ticket::Leader(_) => panic!("expected to wait on the renewal"),
        }
    }

    #[tokio::test]
    async fn test_only_first_caller_leads() {
        let coordinator = RenewalCoordinator::new();
        assert!(!coordinator.is_renewing());

        let flight = expect_leader(coordinator.begin());
        assert!(coordinator.is_renewing());

        let b = expect_waiter(coordinator.begin());
        let c = expect_waiter(coordinator.begin());
        assert_eq!(coordinator.waiting(), 2);

        assert_eq!(flight.settle(Ok("T2".to_string())), 2);
        assert!(!coordinator.is_renewing());
        assert_eq!(coordinator.waiting(), 0);

        assert_eq!(b.wait().await, Ok("T2".to_string()));
        assert_eq!(c.wait().await, Ok("T2".to_string()));
    }

    #[tokio::test]
    async fn test_failure_reaches_every_waiter() {
        let coordinator = RenewalCoordinator::new();
        let flight = expect_leader(coordinator.begin());
        let waiters: Vec<_> = (0..3).map(|_| coordinator.enqueue().unwrap()).collect();

        flight.settle(Err(RenewalError::MissingRefreshToken));

        for waiter in waiters {
            assert_eq!(waiter.wait().await, Err(RenewalError::MissingRefreshToken));
        }
        assert!(!coordinator.is_renewing());
    }

    #[test]
    fn test_enqueue_when_idle_is_refused() {
        let coordinator = RenewalCoordinator::new();
        assert!(coordinator.enqueue().is_none());
        assert_eq!(coordinator.waiting(), 0);
    }

    #[tokio::test]
    async fn test_dropped_flight_abandons_waiters() {
        let coordinator = RenewalCoordinator::new();
        let flight = expect_leader(coordinator.begin());
        let waiter = coordinator.enqueue().unwrap();

        drop(flight);

        assert!(!coordinator.is_renewing());
        assert_eq!(waiter.wait().await, Err(RenewalError::Abandoned));
    }

    #[tokio::test]
    async fn test_next_renewal_starts_fresh() {
        let coordinator = RenewalCoordinator::new();
        expect_leader(coordinator.begin()).settle(Ok("T2".to_string()));

        let flight = expect_leader(coordinator.begin());
        let waiter = expect_waiter(coordinator.begin());
        flight.settle(Ok("T3".to_string()));
        assert_eq!(waiter.wait().await, Ok("T3".to_string()));
    }

    #[test]
    fn test_gauge_counts_only_own_waiters() {
        let gauge = Gauge::new("test_renewal_waiters", "queued").unwrap();
        let first = RenewalCoordinator::with_gauge(gauge.clone());
        let second = RenewalCoordinator::with_gauge(gauge.clone());

        let first_flight = expect_leader(first.begin());
        let _a = first.enqueue().unwrap();
        let second_flight = expect_leader(second.begin());
        let _b = second.enqueue().unwrap();
        let _c = second.enqueue().unwrap();
        assert_eq!(gauge.get(), 3.0);

        second_flight.settle(Ok("T2".to_string()));
        assert_eq!(gauge.get(), 1.0);

        drop(first_flight);
        assert_eq!(gauge.get(), 0.0);
    }

    #[test]
    fn test_gone_waiter_is_still_drained() {
        let coordinator = RenewalCoordinator::new();
        let flight = expect_leader(coordinator.begin());
        drop(coordinator.enqueue());

        assert_eq!(flight.settle(Ok("T2".to_string())), 1);
        assert_eq!(coordinator.waiting(), 0);
    }
}
