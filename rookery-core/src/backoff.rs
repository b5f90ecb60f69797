//! Exponential retry backoff.

use std::time::Duration;

/// Exponential backoff: each `wait` sleeps `min(max, min_delay * 2^n)` and
/// bumps `n`, up to a shift of 31. `reset` starts the progression over.
pub struct Exp {
    min: Duration,
    max: Duration,
    count: u32,
}

impl Exp {
    pub const DEFAULT_MIN: Duration = Duration::from_millis(1);
    pub const DEFAULT_MAX: Duration = Duration::from_secs(1);

    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max, count: 0 }
    }

    pub fn with_min(min: Duration) -> Self {
        Self::new(min, Self::DEFAULT_MAX)
    }

    /// Sleep for the current backoff delay.
    pub async fn wait(&mut self) {
        let mut delay = self.min_delay().saturating_mul(1 << self.count);
        if delay > self.max_delay() {
            delay = self.max_delay();
        }
        tokio::time::sleep(delay).await;
        if self.count < 31 {
            self.count += 1;
        }
    }

    /// Reset the exponential count.
    pub fn reset(&mut self) {
        self.count = 0;
    }

    fn min_delay(&self) -> Duration {
        if self.min.is_zero() {
            Self::DEFAULT_MIN
        } else {
            self.min
        }
    }

    fn max_delay(&self) -> Duration {
        if self.max.is_zero() {
            Self::DEFAULT_MAX
        } else {
            self.max
        }
    }
}

impl Default for Exp {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN, Self::DEFAULT_MAX)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn doubles_until_capped() {
        let mut exp = Exp::new(Duration::from_millis(10), Duration::from_millis(40));

        let start = tokio::time::Instant::now();
        exp.wait().await; // 10ms
        exp.wait().await; // 20ms
        exp.wait().await; // 40ms
        exp.wait().await; // capped at 40ms
        assert_eq!(start.elapsed(), Duration::from_millis(110));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_restarts_progression() {
        let mut exp = Exp::new(Duration::from_millis(10), Duration::from_secs(1));
        exp.wait().await;
        exp.wait().await;
        exp.reset();

        let start = tokio::time::Instant::now();
        exp.wait().await;
        assert_eq!(start.elapsed(), Duration::from_millis(10));
    }
}
