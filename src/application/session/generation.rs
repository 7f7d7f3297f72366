use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Generation counter bumped whenever a party view is opened or left
#[derive(Debug, Clone, Default)]
pub struct ViewGeneration {
    current: Arc<AtomicU64>,
}

impl ViewGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new subscription lifetime, invalidating older leases
    pub fn renew(&self) -> SubscriptionLease {
        let generation = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        SubscriptionLease {
            generation,
            current: self.current.clone(),
        }
    }

    /// Invalidate every outstanding lease
    pub fn revoke(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
    }
}

/// Token held by work belonging to one subscription lifetime
#[derive(Debug, Clone)]
pub struct SubscriptionLease {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl SubscriptionLease {
    /// Lease that never expires, for standalone use
    pub fn detached() -> Self {
        Self {
            generation: 0,
            current: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renew_invalidates_previous_lease() {
        let generation = ViewGeneration::new();
        let first = generation.renew();
        assert!(first.is_current());

        let second = generation.renew();
        assert!(!first.is_current());
        assert!(second.is_current());

        generation.revoke();
        assert!(!second.is_current());
    }
}
