use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Issues display numbers of the form `PREFIX-<epoch millis>`.
///
/// Two numbers requested within the same millisecond get consecutive
/// suffixes, so numbers from one generator never collide.
#[derive(Debug, Default)]
pub struct NumberGenerator {
    last_suffix: AtomicI64,
}

impl NumberGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, prefix: &str) -> String {
        self.next_at(prefix, Utc::now())
    }

    pub fn next_at(&self, prefix: &str, now: DateTime<Utc>) -> String {
        let millis = now.timestamp_millis();
        let mut current = self.last_suffix.load(Ordering::Relaxed);
        loop {
            let candidate = millis.max(current + 1);
            match self.last_suffix.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return format_number(prefix, candidate),
                Err(observed) => current = observed,
            }
        }
    }
}

pub fn format_number(prefix: &str, suffix: i64) -> String {
    format!("{}-{}", prefix, suffix)
}
