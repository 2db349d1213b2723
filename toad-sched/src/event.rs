use crate::net::Addrd;
use crate::platform::PlatformTypes;
use crate::time::Tick;

/// Something the [`Scheduler`](crate::sched::Scheduler) should react to.
///
/// Events are delivered in the order they were posted.
pub enum Event<P: PlatformTypes> {
  /// A datagram was received from a remote endpoint
  Recvd(Addrd<P::Dgram>),
  /// Some outstanding confirmable messages may be due for retransmission
  RetransmitCheck,
  /// Time to perform periodic maintenance
  Housekeeping,
  /// Exit the event loop, dropping all outstanding messages
  Stop,
}

impl<P: PlatformTypes> Event<P> {
  /// Was this event produced by a [`Timer`](crate::timer::Timer)?
  pub fn is_wakeup(&self) -> bool {
    matches!(self, Event::RetransmitCheck | Event::Housekeeping)
  }
}

impl<P: PlatformTypes> Clone for Event<P> {
  fn clone(&self) -> Self {
    match self {
      | Event::Recvd(dgram) => Event::Recvd(dgram.clone()),
      | Event::RetransmitCheck => Event::RetransmitCheck,
      | Event::Housekeeping => Event::Housekeeping,
      | Event::Stop => Event::Stop,
    }
  }
}

impl<P: PlatformTypes> core::fmt::Debug for Event<P> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      | Event::Recvd(dgram) => f.debug_tuple("Recvd").field(dgram).finish(),
      | Event::RetransmitCheck => f.write_str("RetransmitCheck"),
      | Event::Housekeeping => f.write_str("Housekeeping"),
      | Event::Stop => f.write_str("Stop"),
    }
  }
}

impl<P: PlatformTypes> PartialEq for Event<P> {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      | (Event::Recvd(a), Event::Recvd(b)) => a == b,
      | (Event::RetransmitCheck, Event::RetransmitCheck)
      | (Event::Housekeeping, Event::Housekeeping)
      | (Event::Stop, Event::Stop) => true,
      | _ => false,
    }
  }
}

/// Only here so that `Event`s can be stored in heapless collections,
/// which fill their unused slots with `Default::default()`.
///
/// A spurious `RetransmitCheck` is harmless.
impl<P: PlatformTypes> Default for Event<P> {
  fn default() -> Self {
    Event::RetransmitCheck
  }
}

/// The events a [`Timer`](crate::timer::Timer) may produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wakeup {
  /// See [`Event::RetransmitCheck`]
  RetransmitCheck,
  /// See [`Event::Housekeeping`]
  Housekeeping,
}

impl<P: PlatformTypes> From<Wakeup> for Event<P> {
  fn from(w: Wakeup) -> Self {
    match w {
      | Wakeup::RetransmitCheck => Event::RetransmitCheck,
      | Wakeup::Housekeeping => Event::Housekeeping,
    }
  }
}

/// A [`Wakeup`] that should happen at a specific [`Tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Deadline {
  /// When
  pub at: Tick,
  /// What
  pub wakeup: Wakeup,
}

impl Deadline {
  /// Construct a deadline for [`Wakeup::RetransmitCheck`]
  pub const fn retransmit_check(at: Tick) -> Self {
    Self { at,
           wakeup: Wakeup::RetransmitCheck }
  }

  /// Construct a deadline for [`Wakeup::Housekeeping`]
  pub const fn housekeeping(at: Tick) -> Self {
    Self { at,
           wakeup: Wakeup::Housekeeping }
  }

  /// Has this deadline been reached at time `now`?
  pub const fn has_elapsed(&self, now: Tick) -> bool {
    self.at.has_elapsed(now)
  }
}
