use crate::event::{Deadline, Wakeup};
use crate::time::Tick;

/// A single-shot timer that delivers a [`Wakeup`] once a [`Deadline`] is reached.
///
/// At most one deadline is armed at a time; arming replaces whatever
/// was armed before.
///
/// There are two flavors of timer:
///
/// ## Interrupt-style
/// The timer arranges (via a hardware timer interrupt, a background
/// thread, etc.) for the wakeup to be posted to the scheduler's mailbox
/// once the deadline is reached. See `toad_sched::std::ThreadTimer`.
///
/// ## Polled
/// The timer has no way to post anything by itself, so the scheduler
/// asks it with [`Timer::fire`] whenever the mailbox is empty.
/// These set [`Timer::POLLED`] so that [`Scheduler::run`](crate::sched::Scheduler::run)
/// knows not to block waiting for an event. See [`PollTimer`].
pub trait Timer {
  /// Does this timer need [`Timer::fire`] to be invoked in order to produce wakeups?
  const POLLED: bool = false;

  /// Arrange for `deadline.wakeup` to be delivered at `deadline.at`,
  /// replacing any deadline that is currently armed.
  ///
  /// If `deadline.at` has already passed, the wakeup should be
  /// delivered as soon as possible.
  fn arm_at(&mut self, deadline: Deadline);

  /// Cancel the armed deadline, if any
  fn disarm(&mut self);

  /// The currently armed deadline
  fn armed(&self) -> Option<Deadline>;

  /// Yield the armed wakeup if its deadline has been reached at `now`,
  /// disarming the timer.
  ///
  /// Interrupt-style timers deliver wakeups on their own, and
  /// should leave this as the default (always `None`).
  fn fire(&mut self, now: Tick) -> Option<Wakeup> {
    let _ = now;
    None
  }
}

/// A [`Timer`] for superloops and tests that has no means of its own to
/// post events; it simply remembers the armed deadline and reports it
/// as elapsed when polled.
///
/// ```
/// use toad_sched::event::{Deadline, Wakeup};
/// use toad_sched::time::Tick;
/// use toad_sched::timer::{PollTimer, Timer};
///
/// let mut timer = PollTimer::default();
/// timer.arm_at(Deadline::housekeeping(Tick(100)));
///
/// assert_eq!(timer.fire(Tick(99)), None);
/// assert_eq!(timer.fire(Tick(100)), Some(Wakeup::Housekeeping));
/// assert_eq!(timer.fire(Tick(101)), None);
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollTimer {
  armed: Option<Deadline>,
}

impl Timer for PollTimer {
  const POLLED: bool = true;

  fn arm_at(&mut self, deadline: Deadline) {
    self.armed = Some(deadline);
  }

  fn disarm(&mut self) {
    self.armed = None;
  }

  fn armed(&self) -> Option<Deadline> {
    self.armed
  }

  fn fire(&mut self, now: Tick) -> Option<Wakeup> {
    match self.armed {
      | Some(d) if d.has_elapsed(now) => {
        self.armed = None;
        Some(d.wakeup)
      },
      | _ => None,
    }
  }
}

impl<T: Timer> Timer for &mut T {
  const POLLED: bool = T::POLLED;

  fn arm_at(&mut self, deadline: Deadline) {
    (*self).arm_at(deadline)
  }

  fn disarm(&mut self) {
    (*self).disarm()
  }

  fn armed(&self) -> Option<Deadline> {
    (**self).armed()
  }

  fn fire(&mut self, now: Tick) -> Option<Wakeup> {
    (*self).fire(now)
  }
}
