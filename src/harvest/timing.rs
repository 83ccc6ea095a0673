use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::time::Duration;
use tracing::info;

/// Default scale of the random excess added to every wait, in seconds
pub const DEFAULT_JITTER_SCALE: f64 = 2.0;

/// Jittered waits between browser actions.
///
/// The portal updates its UI asynchronously after a click, so every action
/// is followed by a pause of at least the requested minimum plus a
/// half-normal excess.
#[derive(Debug, Clone)]
pub struct Pacer {
    jitter: Option<Normal<f64>>,
}

impl Pacer {
    /// A non-positive or non-finite scale disables the excess
    pub fn new(scale: f64) -> Self {
        let jitter = if scale.is_finite() && scale > 0.0 {
            Normal::new(0.0, scale).ok()
        } else {
            None
        };
        Self { jitter }
    }

    pub fn draw_with<R: Rng + ?Sized>(&self, minimum_secs: f64, rng: &mut R) -> Duration {
        let excess = self
            .jitter
            .as_ref()
            .map(|normal| normal.sample(rng).abs())
            .unwrap_or(0.0);
        Duration::from_secs_f64(minimum_secs.max(0.0) + excess)
    }

    pub fn draw(&self, minimum_secs: f64) -> Duration {
        self.draw_with(minimum_secs, &mut rand::rng())
    }

    pub async fn wait(&self, reason: &str, minimum_secs: f64) {
        let delay = self.draw(minimum_secs);
        info!(reason, "Waiting for {:.1} secs", delay.as_secs_f64());
        tokio::time::sleep(delay).await;
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(DEFAULT_JITTER_SCALE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn draws_never_fall_below_minimum() {
        let pacer = Pacer::default();
        let mut rng = StdRng::seed_from_u64(7);
        let mut saw_excess = false;

        for _ in 0..1_000 {
            let delay = pacer.draw_with(3.0, &mut rng);
            assert!(delay >= Duration::from_secs(3));
            saw_excess |= delay > Duration::from_secs(3);
        }
        assert!(saw_excess);
    }

    #[test]
    fn zero_scale_waits_the_minimum() {
        let pacer = Pacer::new(0.0);
        assert_eq!(pacer.draw(2.5), Duration::from_secs_f64(2.5));
        assert_eq!(Pacer::new(-1.0).draw(1.0), Duration::from_secs(1));
        assert_eq!(Pacer::new(f64::NAN).draw(0.0), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_sleeps_for_at_least_the_minimum() {
        let started = tokio::time::Instant::now();
        Pacer::default().wait("test", 5.0).await;
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
