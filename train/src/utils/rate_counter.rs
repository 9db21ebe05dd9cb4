use crate::common::*;

/// Counts events and reports the rate per elapsed interval.
#[derive(Debug)]
pub struct RateCounter {
    interval: Duration,
    start: Instant,
    count: f64,
}

impl RateCounter {
    pub fn with_second_interval() -> Self {
        Self::with_interval(Duration::from_secs(1))
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            start: Instant::now(),
            count: 0.0,
        }
    }

    pub fn add(&mut self, count: f64) {
        self.count += count;
    }

    /// The rate since the last report, if the interval elapsed.
    pub fn rate(&mut self) -> Option<f64> {
        let elapsed = self.start.elapsed();
        if elapsed >= self.interval {
            let rate = self.count / elapsed.as_secs_f64();
            self.start = Instant::now();
            self.count = 0.0;
            Some(rate)
        } else {
            None
        }
    }
}
