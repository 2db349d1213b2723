use core::cell::Cell;
use core::cmp::Ordering;

use embedded_time::duration::Milliseconds;

/// A duration, in milliseconds
pub type Millis = Milliseconds<u32>;

/// A point in time, in milliseconds since some arbitrary epoch.
///
/// Ticks wrap modulo `2^32` (~49.7 days), so two ticks can only be
/// meaningfully compared when they are less than `2^31` milliseconds apart.
///
/// So `Tick` is **not** [`Ord`]; use [`Tick::since`],
/// [`Tick::is_before`] or [`Tick::cmp_wrapping`] instead.
///
/// ```
/// use toad_sched::time::Tick;
///
/// let before_wrap = Tick(u32::MAX - 10);
/// let after_wrap = before_wrap.after_millis(20);
///
/// assert_eq!(after_wrap, Tick(9));
/// assert_eq!(after_wrap.since(before_wrap), 20);
/// assert!(before_wrap.is_before(after_wrap));
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tick(pub u32);

impl Tick {
  /// The tick `ms` milliseconds after this one
  pub const fn after_millis(self, ms: u32) -> Tick {
    Tick(self.0.wrapping_add(ms))
  }

  /// The tick `dur` after this one
  pub const fn after(self, dur: Millis) -> Tick {
    self.after_millis(dur.0)
  }

  /// Signed distance from `earlier` to `self`.
  ///
  /// Positive when `self` is later than `earlier`.
  pub const fn since(self, earlier: Tick) -> i32 {
    self.0.wrapping_sub(earlier.0) as i32
  }

  /// Is `self` strictly earlier than `other`?
  pub const fn is_before(self, other: Tick) -> bool {
    self.since(other) < 0
  }

  /// Has `self` been reached at time `now`? (`self <= now`)
  pub const fn has_elapsed(self, now: Tick) -> bool {
    now.since(self) >= 0
  }

  /// Wraparound-aware comparison
  pub fn cmp_wrapping(&self, other: &Tick) -> Ordering {
    self.since(*other).cmp(&0)
  }
}

/// A monotonic source of [`Tick`]s.
///
/// Must not block, and must be safe to call from any context that
/// posts events.
pub trait Clock {
  /// The current time
  fn now(&self) -> Tick;
}

impl<C: Clock> Clock for &C {
  fn now(&self) -> Tick {
    (*self).now()
  }
}

/// Use any [`embedded_time::Clock`] with 64-bit ticks as a [`Clock`].
///
/// `embedded_time` clocks are fallible; when reading the clock fails
/// a warning is logged and the last successfully observed tick is returned,
/// which keeps time monotonic for the scheduler.
#[derive(Debug)]
pub struct Embedded<C> {
  clock: C,
  last: Cell<Tick>,
}

impl<C> Embedded<C> where C: embedded_time::Clock<T = u64>
{
  /// Wrap an [`embedded_time::Clock`]
  pub fn new(clock: C) -> Self {
    Self { clock,
           last: Cell::new(Tick::default()) }
  }

  /// Get the wrapped clock back
  pub fn into_inner(self) -> C {
    self.clock
  }
}

impl<C> Clock for Embedded<C> where C: embedded_time::Clock<T = u64>
{
  fn now(&self) -> Tick {
    let ms = self.clock
                 .try_now()
                 .ok()
                 .and_then(|now| Milliseconds::<u64>::try_from(now.duration_since_epoch()).ok());

    match ms {
      | Some(Milliseconds(ms)) => {
        // truncating to 32 bits is the wraparound
        let now = Tick(ms as u32);
        self.last.set(now);
        now
      },
      | None => {
        log::warn!("clock failed to provide timing, reusing {:?}", self.last.get());
        self.last.get()
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use embedded_time::rate::Fraction;
  use embedded_time::Instant;

  use super::*;

  #[derive(Debug)]
  struct MicrosMock(Cell<Option<u64>>);

  impl embedded_time::Clock for MicrosMock {
    type T = u64;

    const SCALING_FACTOR: Fraction = Fraction::new(1, 1_000_000);

    fn try_now(&self) -> Result<Instant<Self>, embedded_time::clock::Error> {
      self.0
          .get()
          .map(Instant::new)
          .ok_or(embedded_time::clock::Error::NotRunning)
    }
  }

  #[test]
  fn since_is_signed() {
    assert_eq!(Tick(1000).since(Tick(400)), 600);
    assert_eq!(Tick(400).since(Tick(1000)), -600);
    assert_eq!(Tick(7).since(Tick(7)), 0);
  }

  #[test]
  fn comparisons_survive_wraparound() {
    let a = Tick(u32::MAX - 1);
    let b = a.after_millis(3);

    assert_eq!(b, Tick(1));
    assert!(a.is_before(b));
    assert!(!b.is_before(a));
    assert!(a.has_elapsed(b));
    assert!(!b.has_elapsed(a));
    assert_eq!(a.cmp_wrapping(&b), Ordering::Less);
    assert_eq!(b.cmp_wrapping(&a), Ordering::Greater);
  }

  #[test]
  fn has_elapsed_includes_equal() {
    assert!(Tick(10).has_elapsed(Tick(10)));
    assert!(!Tick(11).has_elapsed(Tick(10)));
  }

  #[test]
  fn embedded_clock_converts_to_millis() {
    let clock = Embedded::new(MicrosMock(Cell::new(Some(2_500_000))));
    assert_eq!(clock.now(), Tick(2_500));
  }

  #[test]
  fn embedded_clock_wraps_at_32_bits() {
    let micros = (u32::MAX as u64 + 6) * 1000;
    let clock = Embedded::new(MicrosMock(Cell::new(Some(micros))));
    assert_eq!(clock.now(), Tick(5));
  }

  #[test]
  fn embedded_clock_reuses_last_tick_on_error() {
    let clock = Embedded::new(MicrosMock(Cell::new(Some(1_000_000))));
    assert_eq!(clock.now(), Tick(1_000));

    clock.clock.0.set(None);
    assert_eq!(clock.now(), Tick(1_000));
  }
}
