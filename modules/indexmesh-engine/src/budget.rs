//! Global request-budget accounting (§5): an atomic counter shared across
//! concurrently-processed accounts within one run. Grounded directly on
//! the teacher's `BudgetTracker` — same decrement-then-check shape,
//! generalized from cents to request counts.

use std::sync::atomic::{AtomicU32, Ordering};

pub struct RequestBudget {
    total: u32,
    used: AtomicU32,
}

impl RequestBudget {
    pub fn new(total: u32) -> Self {
        Self {
            total,
            used: AtomicU32::new(0),
        }
    }

    /// Attempts to authorize `requests` more calls. Decrements unconditionally
    /// once authorized; never rolls back a decrement mid-flight (§5) even
    /// if the caller later aborts.
    pub fn try_authorize(&self, requests: u32) -> bool {
        let mut current = self.used.load(Ordering::Relaxed);
        loop {
            if current + requests > self.total {
                return false;
            }
            match self.used.compare_exchange_weak(
                current,
                current + requests,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    pub fn remaining(&self) -> u32 {
        self.total.saturating_sub(self.used.load(Ordering::Relaxed))
    }

    pub fn used(&self) -> u32 {
        self.used.load(Ordering::Relaxed)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorizes_up_to_total() {
        let budget = RequestBudget::new(10);
        assert!(budget.try_authorize(4));
        assert!(budget.try_authorize(6));
        assert!(!budget.try_authorize(1));
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn rejects_over_budget_request_without_partial_spend() {
        let budget = RequestBudget::new(5);
        assert!(!budget.try_authorize(6));
        assert_eq!(budget.used(), 0);
    }

    #[test]
    fn concurrent_authorize_never_exceeds_total() {
        let budget = std::sync::Arc::new(RequestBudget::new(100));
        let mut handles = Vec::new();
        for _ in 0..200 {
            let b = budget.clone();
            handles.push(std::thread::spawn(move || b.try_authorize(1)));
        }
        let granted = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();
        assert_eq!(granted, 100);
    }
}
