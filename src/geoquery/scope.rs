//! Bounded-duration execution scope for a single query.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

/// Snapshot of scope bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScopeStats {
    pub opened: u64,
    pub released: u64,
}

impl ScopeStats {
    pub fn in_flight(&self) -> u64 {
        self.opened - self.released
    }
}

#[derive(Debug, Default)]
pub(crate) struct ScopeLedger {
    opened: AtomicU64,
    released: AtomicU64,
}

impl ScopeLedger {
    pub(crate) fn stats(&self) -> ScopeStats {
        // Read `released` first so a concurrent release never shows more releases than opens
        let released = self.released.load(Ordering::Acquire);
        let opened = self.opened.load(Ordering::Acquire);
        ScopeStats { opened, released }
    }
}

/// Time budget for one query. Released when dropped, exactly once.
#[derive(Debug)]
pub struct ExecutionScope {
    ledger: Arc<ScopeLedger>,
    operator: &'static str,
    budget: Duration,
    started: Instant,
}

impl ExecutionScope {
    pub(crate) fn open(ledger: Arc<ScopeLedger>, operator: &'static str, budget: Duration) -> Self {
        ledger.opened.fetch_add(1, Ordering::AcqRel);
        trace!("Opened {} scope with {:?} budget", operator, budget);
        Self {
            ledger,
            operator,
            budget,
            started: Instant::now(),
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn deadline(&self) -> Instant {
        self.started + self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for ExecutionScope {
    fn drop(&mut self) {
        self.ledger.released.fetch_add(1, Ordering::AcqRel);
        trace!(
            "Released {} scope after {:?}",
            self.operator,
            self.started.elapsed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_on_drop() {
        let ledger = Arc::new(ScopeLedger::default());
        {
            let scope = ExecutionScope::open(Arc::clone(&ledger), "within", Duration::from_secs(10));
            assert_eq!(scope.budget(), Duration::from_secs(10));
            assert_eq!(ledger.stats().in_flight(), 1);
        }
        assert_eq!(
            ledger.stats(),
            ScopeStats {
                opened: 1,
                released: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_follows_budget() {
        let ledger = Arc::new(ScopeLedger::default());
        let scope = ExecutionScope::open(ledger, "near", Duration::from_millis(300));
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(scope.elapsed(), Duration::from_millis(100));
        assert_eq!(scope.deadline() - Instant::now(), Duration::from_millis(200));
    }
}
