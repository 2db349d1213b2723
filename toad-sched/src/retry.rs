use core::ops::{RangeInclusive, Sub};

use embedded_time::duration::Milliseconds;
use rand::Rng;

use crate::time::Millis;

/// A number of attempts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Attempts(pub u16);

impl Attempts {
  /// Are there no attempts left?
  pub const fn exhausted(&self) -> bool {
    self.0 == 0
  }
}

impl Sub for Attempts {
  type Output = Attempts;

  fn sub(self, rhs: Attempts) -> Attempts {
    Attempts(self.0.saturating_sub(rhs.0))
  }
}

/// Exponential back-off used to schedule retransmissions of
/// confirmable messages.
///
/// The first timeout is picked at random from `init_min..=init_max`
/// (CoAP's `ACK_TIMEOUT` & `ACK_RANDOM_FACTOR`), and every retransmission
/// multiplies the timeout by `backoff_factor` until it reaches `cap`.
///
/// ```
/// use embedded_time::duration::Milliseconds;
/// use toad_sched::retry::Strategy;
///
/// let strategy = Strategy { init_min: Milliseconds(2_000),
///                           init_max: Milliseconds(2_000),
///                           backoff_factor: 2,
///                           cap: Milliseconds(10_000) };
///
/// assert_eq!(strategy.backoff(Milliseconds(2_000)), Milliseconds(4_000u32));
/// assert_eq!(strategy.backoff(Milliseconds(8_000)), Milliseconds(10_000u32));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Strategy {
  /// Minimum (inclusive) timeout before the first retransmission
  pub init_min: Millis,
  /// Maximum (inclusive) timeout before the first retransmission
  pub init_max: Millis,
  /// What to multiply the timeout by after each retransmission
  pub backoff_factor: u16,
  /// Timeouts never grow beyond this
  pub cap: Millis,
}

impl Strategy {
  /// Are min & max initial timeouts different? if not, we should skip the random number generation.
  pub fn has_jitter(&self) -> bool {
    let rng = self.range();
    rng.start() < rng.end()
  }

  /// Get the min & max initial timeouts as an inclusive range
  pub fn range(&self) -> RangeInclusive<u32> {
    let Strategy { init_min: Milliseconds(min),
                   init_max: Milliseconds(max),
                   .. } = *self;

    min..=max.max(min)
  }

  /// Pick the timeout to wait before the first retransmission
  pub fn initial(&self, rand: &mut impl Rng) -> Millis {
    let ms = if self.has_jitter() {
      rand.gen_range(self.range())
    } else {
      *self.range().start()
    };

    self.clamp(ms)
  }

  /// Given the timeout that just elapsed, yields the timeout to
  /// wait before the next retransmission.
  pub fn backoff(&self, Milliseconds(prev): Millis) -> Millis {
    self.clamp(prev.saturating_mul(self.backoff_factor.max(1) as u32))
  }

  /// Get the longest amount of time a message can stay outstanding
  /// when every attempt fails, assuming no jitter and timers that fire on time.
  ///
  /// This includes the final timeout that follows the last retransmission.
  pub fn max_time(&self, max_retransmit: Attempts) -> Millis {
    let Milliseconds(init) = self.clamp(*self.range().end());

    let (total, _) = (0..max_retransmit.0).fold((init, init), |(total, timeout), _| {
                                             let Milliseconds(next) =
                                               self.backoff(Milliseconds(timeout));
                                             (total.saturating_add(next), next)
                                           });

    Milliseconds(total)
  }

  // a zero timeout would make a message due again in the same
  // `RetransmitCheck` it was just retransmitted in.
  fn clamp(&self, ms: u32) -> Millis {
    Milliseconds(ms.min(self.cap.0).max(1))
  }
}
