use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::config::Config;

/// Opaque handle for a scheduled timer, returned by [`Clock::set_timer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

impl TimerId {
    /// Construct a timer id. Exposed so a [`Clock`] implementation outside
    /// this crate (e.g. a test fake) can mint its own ids.
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

/// Time source and timer scheduler used by the session state machine.
///
/// The core never sleeps or blocks; every wait is externalised through
/// this trait. Production code uses [`SystemClock`]; tests inject a fake
/// that advances a virtual clock and seeds the RNG so glare back-offs
/// are reproducible.
pub trait Clock {
    fn now(&self) -> Instant;
    fn set_timer(&mut self, after: Duration) -> TimerId;
    fn cancel(&mut self, timer: TimerId);

    /// Draw a glare back-off per RFC 3261 §14.1, rounded to 10ms.
    fn glare_delay(&mut self, is_owner: bool) -> Duration;
}

/// Real-time [`Clock`] backed by `std::time::Instant` and `rand`.
///
/// This crate never runs its own reactor: `set_timer` records the
/// deadline and hands back an id, and an embedder polls [`SystemClock::deadline`]
/// (or simply diffs against [`Clock::now`]) to know when to call
/// `Session::on_timer_fired`.
pub struct SystemClock {
    next_timer: u64,
    config: Config,
    deadlines: HashMap<TimerId, Instant>,
}

impl SystemClock {
    pub fn new(config: Config) -> Self {
        Self {
            next_timer: 0,
            config,
            deadlines: HashMap::new(),
        }
    }

    /// Absolute deadline for a still-pending timer, or `None` if it was
    /// never scheduled, already cancelled, or already fired.
    pub fn deadline(&self, timer: TimerId) -> Option<Instant> {
        self.deadlines.get(&timer).copied()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn set_timer(&mut self, after: Duration) -> TimerId {
        self.next_timer += 1;
        let id = TimerId(self.next_timer);
        self.deadlines.insert(id, Instant::now() + after);
        id
    }

    fn cancel(&mut self, timer: TimerId) {
        self.deadlines.remove(&timer);
    }

    fn glare_delay(&mut self, is_owner: bool) -> Duration {
        let (lo, hi) = if is_owner {
            self.config.glare_interval_owner
        } else {
            self.config.glare_interval_nonowner
        };
        round_to_10ms(draw_uniform(lo, hi))
    }
}

fn draw_uniform(lo: Duration, hi: Duration) -> Duration {
    if lo >= hi {
        return lo;
    }
    let millis = rand::rng().random_range(lo.as_millis() as u64..hi.as_millis() as u64);
    Duration::from_millis(millis)
}

fn round_to_10ms(d: Duration) -> Duration {
    let millis = d.as_millis() as u64;
    Duration::from_millis((millis / 10) * 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glare_delay_owner_range_is_rounded_and_bounded() {
        let mut clock = SystemClock::new(Config::default());
        for _ in 0..200 {
            let d = clock.glare_delay(true);
            assert!(d.as_millis() >= 2100 && d.as_millis() < 4000);
            assert_eq!(d.as_millis() % 10, 0);
        }
    }

    #[test]
    fn glare_delay_nonowner_range_is_rounded_and_bounded() {
        let mut clock = SystemClock::new(Config::default());
        for _ in 0..200 {
            let d = clock.glare_delay(false);
            assert!(d.as_millis() < 2000);
            assert_eq!(d.as_millis() % 10, 0);
        }
    }
}
