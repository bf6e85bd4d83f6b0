//! Bounded parallel execution for pipeline stages.
//!
//! Every fan-out in the pipeline (searches, scrapes, generations) goes
//! through [`run_all`]: a fixed-capacity gate bounds how many units run
//! at once, each unit optionally races a per-unit deadline, and results
//! come back in input order with failures isolated per unit.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::error::UnitError;

/// Fixed-capacity concurrency gate.
///
/// A thin wrapper over a semaphore whose permit count never changes
/// after construction. Units acquire before running and release by
/// dropping the permit.
#[derive(Debug, Clone)]
pub struct Gate {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl Gate {
    /// Capacity is clamped to at least one permit; a zero-permit gate
    /// would block every unit forever.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Gate {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Wait for a free slot. The semaphore is never closed, so
    /// acquisition can only fail if the gate itself is dropped, which
    /// cannot happen while a caller holds a reference to it.
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => unreachable!("gate semaphore is never closed"),
        }
    }
}

/// Run `unit` over every item with at most `limit` units in flight.
///
/// Results preserve input order regardless of completion order. When
/// `per_unit_timeout` is set, the deadline covers the unit's own work
/// but not time spent waiting at the gate. A unit that fails or times
/// out yields an `Err` in its slot and does not disturb its siblings.
pub async fn run_all<I, T, E, F, Fut>(
    items: Vec<I>,
    limit: usize,
    per_unit_timeout: Option<Duration>,
    unit: F,
) -> Vec<Result<T, UnitError>>
where
    E: Display,
    F: Fn(usize, I) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let gate = Gate::new(limit);
    debug!(limit = gate.capacity(), ?per_unit_timeout, "fan-out started");
    let unit = &unit;
    let gate = &gate;

    let futures = items.into_iter().enumerate().map(|(index, item)| async move {
        let _permit = gate.acquire().await;
        let work = unit(index, item);
        let outcome = match per_unit_timeout {
            Some(deadline) => match tokio::time::timeout(deadline, work).await {
                Ok(result) => result.map_err(|e| UnitError::Failed(e.to_string())),
                Err(_) => {
                    warn!(index, ?deadline, "unit timed out");
                    Err(UnitError::TimedOut(deadline))
                }
            },
            None => work.await.map_err(|e| UnitError::Failed(e.to_string())),
        };
        if let Err(ref error) = outcome {
            if !error.is_timeout() {
                warn!(index, %error, "unit failed");
            }
        }
        outcome
    });

    join_all(futures).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn results_preserve_input_order() {
        // Later items finish first; slots must still match inputs.
        let delays = vec![50u64, 40, 30, 20, 10];
        let results = run_all(delays, 5, None, |index, ms| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok::<usize, String>(index)
        })
        .await;

        let order: Vec<usize> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_never_exceeds_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let items: Vec<u32> = (0..10).collect();
        let results = run_all(items, 3, None, |_, _| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<(), String>(())
            }
        })
        .await;

        assert_eq!(results.len(), 10);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_isolates_slow_unit() {
        let items = vec![10u64, 500, 10];
        let results = run_all(
            items,
            3,
            Some(Duration::from_millis(100)),
            |_, ms| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok::<u64, String>(ms)
            },
        )
        .await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(ref e) if e.is_timeout()));
        assert!(results[2].is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn unit_error_does_not_abort_batch() {
        let items = vec!["ok", "boom", "ok"];
        let results = run_all(items, 2, None, |_, label| async move {
            if label == "boom" {
                Err("scrape refused".to_string())
            } else {
                Ok(label)
            }
        })
        .await;

        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(UnitError::Failed(ref m)) if m == "scrape refused"));
        assert!(results[2].is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_input_yields_empty_output() {
        let results = run_all(Vec::<u32>::new(), 4, None, |_, n| async move {
            Ok::<u32, String>(n)
        })
        .await;
        assert!(results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_limit_still_makes_progress() {
        // A misconfigured limit of 0 must not deadlock the batch.
        let items: Vec<u32> = (0..4).collect();
        let results = run_all(items, 0, None, |_, n| async move {
            Ok::<u32, String>(n * 2)
        })
        .await;

        let doubled: Vec<u32> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(doubled, vec![0, 2, 4, 6]);
    }

    #[test]
    fn gate_clamps_zero_capacity_to_one() {
        let gate = Gate::new(0);
        assert_eq!(gate.capacity(), 1);
        assert_eq!(gate.permits.available_permits(), 1);
    }

    #[tokio::test]
    async fn gate_reports_capacity() {
        let gate = Gate::new(5);
        assert_eq!(gate.capacity(), 5);
        let a = gate.acquire().await;
        let b = gate.acquire().await;
        assert_eq!(gate.permits.available_permits(), 3);
        drop(a);
        drop(b);
        assert_eq!(gate.permits.available_permits(), 5);
    }
}
