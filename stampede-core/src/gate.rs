use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Decides whether a VU may start another iteration.
#[derive(Debug)]
pub struct IterationGate {
    counter: AtomicU64,
    iterations: Option<u64>,
    duration: Duration,
    deadline: OnceLock<Instant>,
}

impl IterationGate {
    pub fn new(iterations: Option<u64>, duration: Duration) -> Self {
        Self {
            counter: AtomicU64::new(0),
            iterations,
            duration,
            deadline: OnceLock::new(),
        }
    }

    pub fn start_at(&self, started: Instant) {
        let _ = self.deadline.set(started + self.duration);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline.get().copied()
    }

    pub fn next(&self) -> bool {
        let now = Instant::now();

        // Lazily start from the first observed iteration if the runner didn't.
        if self.deadline.get().is_none() {
            self.start_at(now);
        }

        if let Some(deadline) = self.deadline.get()
            && now >= *deadline
        {
            return false;
        }

        if let Some(total) = self.iterations {
            let idx = self.counter.fetch_add(1, Ordering::Relaxed);
            if idx >= total {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_cap_is_shared() {
        let gate = IterationGate::new(Some(3), Duration::from_secs(60));
        gate.start_at(Instant::now());
        let admitted = (0..10).filter(|_| gate.next()).count();
        assert_eq!(admitted, 3);
    }

    #[test]
    fn closes_after_deadline() {
        let gate = IterationGate::new(None, Duration::from_millis(1));
        gate.start_at(Instant::now() - Duration::from_millis(5));
        assert!(!gate.next());
    }

    #[test]
    fn first_start_wins() {
        let gate = IterationGate::new(None, Duration::from_secs(60));
        let first = Instant::now();
        gate.start_at(first);
        gate.start_at(first + Duration::from_secs(5));
        assert_eq!(gate.deadline(), Some(first + Duration::from_secs(60)));
        assert!(gate.next());
    }
}
