use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Row counter that redraws a single stderr line every `interval` rows.
pub struct ProgressCounter {
    label: &'static str,
    interval: u64,
    count: AtomicU64,
    started: Instant,
}

impl ProgressCounter {
    pub fn new(label: &'static str, interval: u64) -> Self {
        let counter = Self {
            label,
            interval: interval.max(1),
            count: AtomicU64::new(0),
            started: Instant::now(),
        };
        counter.print(0);
        counter
    }

    pub fn inc(&self, delta: u64) {
        let prev = self.count.fetch_add(delta, Ordering::SeqCst);
        let current = prev + delta;
        // Print if we crossed an interval boundary
        if prev / self.interval < current / self.interval {
            self.print(current);
        }
    }

    pub fn current(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn finish(&self) {
        let current = self.current();
        let secs = self.started.elapsed().as_secs_f64();
        eprint!("\r{}: {}", self.label, group_digits(current));
        if secs > 0.0 {
            eprint!(" ({} rows/s)", group_digits((current as f64 / secs) as u64));
        }
        eprintln!();
    }

    fn print(&self, current: u64) {
        eprint!("\r{}: {}", self.label, group_digits(current));
        let _ = std::io::stderr().flush();
    }
}

/// `1234567` -> `1,234,567`.
pub fn group_digits(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_thousands() {
        assert_eq!(group_digits(0), "0");
        assert_eq!(group_digits(999), "999");
        assert_eq!(group_digits(1000), "1,000");
        assert_eq!(group_digits(1234567), "1,234,567");
    }

    #[test]
    fn counter_accumulates() {
        let progress = ProgressCounter::new("Rows", 10);
        progress.inc(7);
        progress.inc(7);
        assert_eq!(progress.current(), 14);
        progress.finish();
    }
}
