//! Tracking of background loads so that only the latest one lands

/// Numbers background requests of one kind. A result is accepted only if it
/// belongs to the most recent request that has not been cancelled.
#[derive(Debug, Default)]
pub struct LoadGate {
    latest: u64,
    pending: bool,
}

impl LoadGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request, superseding any in flight
    pub fn issue(&mut self) -> u64 {
        self.latest += 1;
        self.pending = true;
        self.latest
    }

    /// True when `request` is the latest issued one. Accepting ends the
    /// pending state; stale results leave it untouched.
    pub fn accept(&mut self, request: u64) -> bool {
        if request != self.latest || !self.pending {
            log::debug!("dropping result of request {} (latest {})", request, self.latest);
            return false;
        }
        self.pending = false;
        true
    }

    /// Abandon the request in flight; its result will be dropped
    pub fn cancel(&mut self) {
        if self.pending {
            self.latest += 1;
            self.pending = false;
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_request_lands() {
        let mut gate = LoadGate::new();
        let id = gate.issue();
        assert!(gate.is_pending());
        assert!(gate.accept(id));
        assert!(!gate.is_pending());
        // Delivered once only
        assert!(!gate.accept(id));
    }

    #[test]
    fn test_superseded_request_is_dropped() {
        let mut gate = LoadGate::new();
        let first = gate.issue();
        let second = gate.issue();
        assert!(!gate.accept(first));
        assert!(gate.is_pending());
        assert!(gate.accept(second));
    }

    #[test]
    fn test_cancelled_request_clears_pending() {
        let mut gate = LoadGate::new();
        let id = gate.issue();
        gate.cancel();
        assert!(!gate.is_pending());
        assert!(!gate.accept(id));
        assert!(!gate.is_pending());

        let next = gate.issue();
        assert_ne!(next, id);
        assert!(gate.accept(next));
    }

    #[test]
    fn test_cancel_when_idle_is_noop() {
        let mut gate = LoadGate::new();
        let id = gate.issue();
        assert!(gate.accept(id));
        gate.cancel();
        assert!(!gate.is_pending());
        assert_eq!(gate.issue(), id + 1);
    }
}
