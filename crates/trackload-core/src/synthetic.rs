//! Fake field values for sessions and action records.
//!
//! [`SyntheticData`] owns its own seeded RNG so a worker can carry it across
//! `.await` points (unlike `rand::rngs::ThreadRng`, which is `!Send`), and so
//! tests can reproduce a run from a fixed seed.

use chrono::{DateTime, NaiveDateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::net::Ipv4Addr;
use uuid::Uuid;

const ASCII_LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

const PLATFORMS: &[&str] = &[
    "Windows NT 10.0; Win64; x64",
    "Windows NT 6.1; WOW64",
    "Macintosh; Intel Mac OS X 10_15_7",
    "Macintosh; Intel Mac OS X 10_11_6",
    "X11; Linux x86_64",
    "X11; Ubuntu; Linux i686",
];

const LOCALES: &[&str] = &["en-US", "en-GB", "de-DE", "fr-FR", "es-ES", "ja-JP"];

/// Source of synthetic values for one worker.
pub struct SyntheticData {
    rng: StdRng,
}

impl SyntheticData {
    /// Seeds the generator from the operating system.
    pub fn from_os_rng() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic generator for tests and reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Direct access to the underlying RNG (e.g. for throttle sampling).
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Random string of exactly `len` ASCII letters.
    pub fn letters(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| char::from(ASCII_LETTERS[self.rng.random_range(0..ASCII_LETTERS.len())]))
            .collect()
    }

    /// Random integer in `0..=9999`.
    pub fn small_int(&mut self) -> i32 {
        self.rng.random_range(0..=9999)
    }

    /// Random public-looking IPv4 address (first octet never 0).
    pub fn ipv4(&mut self) -> Ipv4Addr {
        Ipv4Addr::new(
            self.rng.random_range(1..=223),
            self.rng.random(),
            self.rng.random(),
            self.rng.random_range(1..=254),
        )
    }

    /// Random version 4 UUID, drawn from this generator's RNG.
    pub fn uuid4(&mut self) -> Uuid {
        uuid::Builder::from_random_bytes(self.rng.random()).into_uuid()
    }

    /// Random timestamp between the Unix epoch and now, truncated to seconds.
    pub fn date_time(&mut self) -> NaiveDateTime {
        let now = Utc::now().timestamp();
        let secs = self.rng.random_range(0..=now);
        DateTime::from_timestamp(secs, 0)
            .unwrap_or(DateTime::UNIX_EPOCH)
            .naive_utc()
    }

    /// Random browser user agent string.
    pub fn user_agent(&mut self) -> String {
        let platform = self.pick(PLATFORMS);
        match self.rng.random_range(0..4) {
            0 => {
                let major = self.rng.random_range(40..=130);
                let build = self.rng.random_range(1000..=6500);
                format!(
                    "Mozilla/5.0 ({platform}) AppleWebKit/537.36 (KHTML, like Gecko) \
                     Chrome/{major}.0.{build}.0 Safari/537.36"
                )
            }
            1 => {
                let major = self.rng.random_range(30..=130);
                format!("Mozilla/5.0 ({platform}; rv:{major}.0) Gecko/20100101 Firefox/{major}.0")
            }
            2 => {
                let major = self.rng.random_range(9..=17);
                let minor = self.rng.random_range(0..=6);
                format!(
                    "Mozilla/5.0 ({platform}) AppleWebKit/605.1.15 (KHTML, like Gecko) \
                     Version/{major}.{minor} Safari/605.1.15"
                )
            }
            _ => {
                let presto = self.rng.random_range(2..=9);
                let locale = self.pick(LOCALES);
                format!("Opera/9.{presto}0 ({platform}; {locale}) Presto/2.9.{presto}0 Version/12.00")
            }
        }
    }

    /// Uniform choice from a non-empty constant slice.
    pub(crate) fn pick<T: Copy>(&mut self, items: &[T]) -> T {
        items[self.rng.random_range(0..items.len())]
    }
}
