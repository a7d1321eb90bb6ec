use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use x509_cert::serial_number::SerialNumber;

/// Source of `genTime`. `None` means the time is not available.
pub trait Clock: Send + Sync {
    fn gen_time(&self) -> Option<DateTime<Utc>>;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn gen_time(&self) -> Option<DateTime<Utc>> {
        Some(Utc::now())
    }
}

/// Always answers the same instant, or never answers.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub Option<DateTime<Utc>>);

impl Clock for FixedClock {
    fn gen_time(&self) -> Option<DateTime<Utc>> {
        self.0
    }
}

/// Hands out token serial numbers. Must not repeat a value for the life of the TSA.
pub trait SerialSource: Send + Sync {
    fn next_serial(&self) -> SerialNumber;
}

/// Monotonic counter, safe to share between threads.
#[derive(Debug)]
pub struct CounterSerialSource {
    next: AtomicU64,
}

impl CounterSerialSource {
    pub fn new(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for CounterSerialSource {
    fn default() -> Self {
        Self::new(1)
    }
}

impl SerialSource for CounterSerialSource {
    fn next_serial(&self) -> SerialNumber {
        SerialNumber::from(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn counter_is_unique_across_threads() {
        let source = CounterSerialSource::new(100);

        let serials: Vec<Vec<u8>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        (0..50)
                            .map(|_| source.next_serial().as_bytes().to_vec())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap())
                .collect()
        });

        assert_eq!(serials.len(), 200);
        assert_eq!(serials.iter().collect::<HashSet<_>>().len(), 200);
        assert_eq!(source.next_serial(), SerialNumber::from(300u64));
    }

    #[test]
    fn fixed_clock() {
        assert!(FixedClock(None).gen_time().is_none());

        let now = Utc::now();
        assert_eq!(FixedClock(Some(now)).gen_time(), Some(now));
        assert!(SystemClock.gen_time().is_some());
    }
}
