//! Counting admission gate with FIFO fairness.
//!
//! Backed by [`tokio::sync::Semaphore`], which queues waiters in arrival
//! order and hands a released permit to the oldest one. Permits are RAII:
//! dropping a [`GatePermit`] releases it, so a unit that fails, panics or
//! is cancelled never leaks its slot.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// The gate was closed (during shutdown) and admits nobody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Concurrency gate is closed")]
pub struct GateClosed;

/// Admission gate allowing at most `capacity` holders at once.
///
/// Cloning is cheap and clones share the same permits.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One admitted slot. Released on drop.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    /// Create a gate. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait until a slot is free, then take it.
    ///
    /// Waiters are admitted strictly in the order they started waiting.
    pub async fn acquire(&self) -> Result<GatePermit, GateClosed> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| GateClosed)?;
        Ok(GatePermit { _permit: permit })
    }

    /// Take a slot if one is free right now.
    pub fn try_acquire(&self) -> Result<Option<GatePermit>, GateClosed> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Ok(Some(GatePermit { _permit: permit })),
            Err(TryAcquireError::NoPermits) => Ok(None),
            Err(TryAcquireError::Closed) => Err(GateClosed),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Number of slots currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }

    /// Reject current and future waiters. Held permits stay valid.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use tokio::sync::{mpsc, oneshot};

    use super::*;

    /// Let every runnable task on the current-thread runtime make progress.
    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<usize>) -> Vec<usize> {
        let mut out = Vec::new();
        while let Ok(i) = rx.try_recv() {
            out.push(i);
        }
        out
    }

    // -- construction ---------------------------------------------------------

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let gate = ConcurrencyGate::new(0);
        assert_eq!(gate.capacity(), 1);
        assert_eq!(gate.available(), 1);
    }

    // -- admission ------------------------------------------------------------

    #[tokio::test]
    async fn admits_waiters_in_arrival_order() {
        let gate = ConcurrencyGate::new(2);
        let (admitted_tx, mut admitted_rx) = mpsc::unbounded_channel();
        let mut releases: Vec<Option<oneshot::Sender<()>>> = Vec::new();

        for i in 0..5 {
            let (release_tx, release_rx) = oneshot::channel::<()>();
            releases.push(Some(release_tx));
            let gate = gate.clone();
            let admitted_tx = admitted_tx.clone();
            tokio::spawn(async move {
                let _permit = gate.acquire().await.unwrap();
                admitted_tx.send(i).unwrap();
                let _ = release_rx.await;
            });
            settle().await;
        }

        assert_eq!(drain(&mut admitted_rx), vec![0, 1]);
        assert_eq!(gate.in_flight(), 2);

        // Release out of admission order; waiters still enter oldest first.
        for (release, expected) in [(1, 2), (0, 3), (2, 4)] {
            releases[release].take().unwrap().send(()).unwrap();
            settle().await;
            assert_eq!(drain(&mut admitted_rx), vec![expected]);
            assert_eq!(gate.in_flight(), 2);
        }

        for release in releases.iter_mut().filter_map(Option::take) {
            release.send(()).unwrap();
        }
        settle().await;
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn aborted_holder_returns_its_permit() {
        let gate = ConcurrencyGate::new(1);
        let holder = {
            let gate = gate.clone();
            tokio::spawn(async move {
                let _permit = gate.acquire().await.unwrap();
                std::future::pending::<()>().await;
            })
        };
        settle().await;
        assert_eq!(gate.available(), 0);

        holder.abort();
        let _ = holder.await;
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn try_acquire_reports_saturation() {
        let gate = ConcurrencyGate::new(1);
        let held = gate.try_acquire().unwrap();
        assert!(held.is_some());
        assert!(gate.try_acquire().unwrap().is_none());
        drop(held);
        assert!(gate.try_acquire().unwrap().is_some());
    }

    // -- close ----------------------------------------------------------------

    #[tokio::test]
    async fn closed_gate_rejects_waiters() {
        let gate = ConcurrencyGate::new(1);
        let _held = gate.acquire().await.unwrap();
        gate.close();
        assert!(gate.is_closed());
        assert_matches!(gate.acquire().await, Err(GateClosed));
        assert_matches!(gate.try_acquire(), Err(GateClosed));
    }
}
