use std::time::Duration;
use tokio::time::Instant;

/// Wall-clock budget of one crawl.
///
/// Work may only start while more than the safety margin remains, so there
/// is always time left to emit results.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    started: Instant,
    limit: Duration,
    safety_margin: Duration,
}

impl Budget {
    pub fn start(limit: Duration, safety_margin: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
            safety_margin,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.elapsed())
    }

    /// Whether another page or round may start
    pub fn has_time(&self) -> bool {
        self.allows(self.safety_margin)
    }

    /// Time a blocking call may take and still end before the safety margin
    pub fn working_time(&self) -> Duration {
        self.remaining().saturating_sub(self.safety_margin)
    }

    /// Whether more than `margin` remains
    pub fn allows(&self, margin: Duration) -> bool {
        self.remaining() > margin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_budget() {
        let budget = Budget::start(Duration::from_secs(240), Duration::from_secs(30));
        assert!(budget.has_time());
        assert!(budget.allows(Duration::from_secs(60)));
        assert!(!budget.allows(Duration::from_secs(240)));
        assert!(budget.remaining() <= Duration::from_secs(240));
        assert!(budget.working_time() <= Duration::from_secs(210));
        assert!(budget.working_time() > Duration::from_secs(200));
    }

    #[test]
    fn test_margin_covering_the_limit_leaves_no_time() {
        let budget = Budget::start(Duration::from_secs(30), Duration::from_secs(30));
        assert!(!budget.has_time());

        let budget = Budget::start(Duration::ZERO, Duration::ZERO);
        assert!(!budget.has_time());
        assert_eq!(budget.remaining(), Duration::ZERO);
        assert_eq!(budget.working_time(), Duration::ZERO);
    }
}
