use chrono::{DateTime, FixedOffset, NaiveDate, SubsecRound, Utc};

/// Source of "now" and of the calendar day an instant belongs to.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn offset(&self) -> FixedOffset;

    fn day(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset()).date_naive()
    }
}

/// Wall clock, truncated to whole seconds, with days cut in a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(0)
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

#[cfg(test)]
pub use manual::ManualClock;
