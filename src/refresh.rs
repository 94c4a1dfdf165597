use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Decides whether a scrape must run or the catalog is fresh enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub cooldown: Duration,
}

impl RefreshPolicy {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    pub fn should_scrape(
        &self,
        last: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        force: bool,
    ) -> bool {
        match last {
            _ if force => true,
            None => true,
            Some(last) => now - last >= self.cooldown,
        }
    }
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self::new(Duration::minutes(120))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_scrape() {
        let policy = RefreshPolicy::default();
        let now = Utc::now();

        assert!(policy.should_scrape(None, now, false));
        assert!(!policy.should_scrape(Some(now - Duration::minutes(30)), now, false));
        assert!(policy.should_scrape(Some(now - Duration::minutes(30)), now, true));
        assert!(policy.should_scrape(Some(now - Duration::minutes(120)), now, false));
    }

    #[test]
    fn test_fixed_clock_advances() {
        let start = Utc::now();
        let clock = FixedClock::new(start);
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now() - start, Duration::minutes(5));
    }
}
