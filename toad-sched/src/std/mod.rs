use embedded_time::rate::Fraction;

use crate::time::Tick;

/// Converting between `std::net` & `no_std_net` addresses,
/// and the [`Listener`] receive thread
pub mod net;

mod channel;
mod timer;

pub use channel::{channel, Inbox, Poster};
pub use net::Listener;
pub use timer::ThreadTimer;

/// Implement [`crate::time::Clock`] using [`std::time`] primitives
///
/// Ticks are milliseconds since the clock was created. Copies share
/// the same epoch, so a copy can be handed to a [`ThreadTimer`].
#[derive(Debug, Clone, Copy)]
pub struct Clock(::std::time::Instant);

impl Default for Clock {
  fn default() -> Self {
    Self::new()
  }
}

impl Clock {
  /// Create a new clock
  pub fn new() -> Self {
    Self(::std::time::Instant::now())
  }
}

impl crate::time::Clock for Clock {
  fn now(&self) -> Tick {
    // truncation is how ticks wrap
    Tick(self.0.elapsed().as_millis() as u32)
  }
}

impl embedded_time::Clock for Clock {
  type T = u64;

  // microseconds
  const SCALING_FACTOR: Fraction = Fraction::new(1, 1_000_000);

  fn try_now(&self) -> Result<embedded_time::Instant<Self>, embedded_time::clock::Error> {
    Ok(embedded_time::Instant::new(self.0.elapsed().as_micros() as u64))
  }
}

#[cfg(test)]
mod tests {
  use ::std::thread;
  use ::std::time::Duration;

  use super::*;
  use crate::time::{Clock as _, Embedded};

  #[test]
  fn ticks_are_millis() {
    let clock = Clock::new();
    let before = clock.now();
    thread::sleep(Duration::from_millis(20));
    let elapsed = clock.now().since(before);

    assert!(elapsed >= 20, "{}", elapsed);
    assert!(elapsed < 2_000, "{}", elapsed);
  }

  #[test]
  fn copies_share_epoch() {
    let clock = Clock::new();
    thread::sleep(Duration::from_millis(5));
    let copy = clock;

    assert!(copy.now().since(clock.now()) >= 0);
    assert!(copy.now().since(Tick(0)) >= 5);
  }

  #[test]
  fn embedded_adapter_agrees() {
    let clock = Clock::new();
    let adapted = Embedded::new(clock);
    thread::sleep(Duration::from_millis(10));

    let (a, b) = (adapted.now(), clock.now());
    assert!(b.since(a).abs() < 50, "{:?} {:?}", a, b);
  }
}
