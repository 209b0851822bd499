use crate::{Error, Result};
use core::time::Duration;
use rand::Rng;

/// Randomized pause between two backend operations of one worker.
///
/// Each call to [`Throttle::next_delay`] draws a whole number of units
/// uniformly from `[1, max_units]`, independently of previous draws, so
/// workers drift apart instead of firing in bursts. Production code uses one
/// second per unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Throttle {
    max_units: u32,
    unit: Duration,
}

impl Throttle {
    /// A throttle of `[1, hb_interval]` seconds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `hb_interval` is zero.
    pub fn from_secs(hb_interval: u32) -> Result<Self> {
        Self::with_unit(hb_interval, Duration::from_secs(1))
    }

    /// A throttle of `[1, max_units]` multiples of `unit`.
    pub fn with_unit(max_units: u32, unit: Duration) -> Result<Self> {
        if max_units == 0 {
            return Err(Error::config("throttle interval must be at least 1"));
        }
        Ok(Self { max_units, unit })
    }

    pub const fn max_units(&self) -> u32 {
        self.max_units
    }

    /// Draws the number of units to wait, in `[1, max_units]`.
    pub fn sample_units<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        rng.random_range(1..=self.max_units)
    }

    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        self.unit.saturating_mul(self.sample_units(rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn zero_interval_is_rejected() {
        assert!(matches!(Throttle::from_secs(0), Err(Error::Config { .. })));
    }

    #[test]
    fn samples_stay_within_inclusive_bounds() {
        let throttle = Throttle::from_secs(5).unwrap();
        let mut rng = StdRng::seed_from_u64(17);
        let mut seen = [false; 6];

        for _ in 0..10_000 {
            let units = throttle.sample_units(&mut rng);
            assert!((1..=5).contains(&units), "sampled {units}");
            seen[units as usize] = true;
        }

        // Both ends of the range are reachable, zero never is.
        assert!(!seen[0]);
        assert!(seen[1..].iter().all(|s| *s));
    }

    #[test]
    fn interval_of_one_always_waits_one_unit() {
        let throttle = Throttle::with_unit(1, Duration::from_millis(3)).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..100 {
            assert_eq!(throttle.next_delay(&mut rng), Duration::from_millis(3));
        }
    }

    #[test]
    fn delay_scales_with_unit() {
        let throttle = Throttle::with_unit(10, Duration::from_millis(2)).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..1000 {
            let delay = throttle.next_delay(&mut rng);
            assert!(delay >= Duration::from_millis(2));
            assert!(delay <= Duration::from_millis(20));
        }
    }
}
