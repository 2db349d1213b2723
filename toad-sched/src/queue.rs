use core::convert::Infallible;

use no_std_net::SocketAddr;
use toad_array::Array;
use toad_len::Len;
use toad_stem::Stem;

use crate::config::Config;
use crate::event::Event;
use crate::net::Addrd;
use crate::platform::PlatformTypes;

/// The mailbox is full; the rejected item is handed back.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct QueueFull<T>(pub T);

impl<T> QueueFull<T> {
  /// Take back the item that could not be posted
  pub fn into_inner(self) -> T {
    self.0
  }
}

impl<T> core::fmt::Debug for QueueFull<T> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.write_str("QueueFull")
  }
}

impl<T> core::fmt::Display for QueueFull<T> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.write_str("event queue is full")
  }
}

/// The producer side of a mailbox.
///
/// Posting **never** blocks; producers may run in contexts
/// that must not stall (e.g. a network receive interrupt).
///
/// Implementations must tolerate concurrent `post`s from
/// many producers.
pub trait Post<P: PlatformTypes> {
  /// Try to add an event to the back of the queue
  fn post(&self, event: Event<P>) -> Result<(), QueueFull<Event<P>>>;

  /// A datagram was received from `from`.
  ///
  /// When the queue is full, the datagram is dropped. This is
  /// acceptable since the transport is unreliable anyway.
  fn post_received(&self, dgram: P::Dgram, from: SocketAddr) -> Result<(), QueueFull<Event<P>>> {
    self.post(Event::Recvd(Addrd(dgram, from)))
  }
}

impl<P: PlatformTypes, T: Post<P>> Post<P> for &T {
  fn post(&self, event: Event<P>) -> Result<(), QueueFull<Event<P>>> {
    (*self).post(event)
  }
}

/// The consumer side of a mailbox
pub trait Receive<P: PlatformTypes> {
  /// Take the event at the front of the queue,
  /// yielding `WouldBlock` if there are none.
  fn try_recv(&self) -> nb::Result<Event<P>, Infallible>;

  /// Take the event at the front of the queue,
  /// blocking until there is one.
  ///
  /// The default implementation spins on [`Receive::try_recv`].
  fn recv(&self) -> Event<P> {
    match nb::block!(self.try_recv()) {
      | Ok(event) => event,
      | Err(never) => match never {},
    }
  }
}

/// A bounded FIFO mailbox backed by [`PlatformTypes::Events`]
///
/// The mailbox never holds more than the capacity it was created with,
/// nor more than [`PlatformTypes::Events`] can hold.
///
/// The mailbox can be shared between producers and the scheduler by reference
/// (or in an `Arc` with feature `std`), since posting & receiving only need `&self`.
///
/// ```
/// use toad_sched::event::Event;
/// use toad_sched::platform::Std;
/// use toad_sched::queue::{Mailbox, Post, Receive};
///
/// let mailbox = Mailbox::<Std>::with_capacity(1);
///
/// mailbox.post(Event::Housekeeping).unwrap();
/// assert!(mailbox.post(Event::RetransmitCheck).is_err());
///
/// assert_eq!(mailbox.try_recv().unwrap(), Event::Housekeeping);
/// ```
pub struct Mailbox<P: PlatformTypes> {
  events: Stem<P::Events>,
  capacity: usize,
}

impl<P: PlatformTypes> Default for Mailbox<P> {
  fn default() -> Self {
    Self::from_config(&Config::default())
  }
}

impl<P: PlatformTypes> core::fmt::Debug for Mailbox<P> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Mailbox")
     .field("len", &self.len())
     .field("capacity", &self.capacity())
     .finish()
  }
}

impl<P: PlatformTypes> Mailbox<P> {
  /// Create a mailbox holding at most [`Config::queue_capacity`] events
  pub fn from_config(config: &Config) -> Self {
    Self::with_capacity(config.queue_capacity)
  }

  /// Create a mailbox that holds at most `capacity` events
  pub fn with_capacity(capacity: usize) -> Self {
    Self { events: Stem::new(P::Events::default()),
           capacity }
  }

  /// Maximum number of events the mailbox can hold
  pub fn capacity(&self) -> usize {
    match <P::Events as Len>::CAPACITY {
      | Some(fixed) => fixed.min(self.capacity),
      | None => self.capacity,
    }
  }

  /// Number of events waiting
  pub fn len(&self) -> usize {
    self.events.map_ref(|q| q.len())
  }

  /// Are there no events waiting?
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl<P: PlatformTypes> Post<P> for Mailbox<P> {
  fn post(&self, event: Event<P>) -> Result<(), QueueFull<Event<P>>> {
    let capacity = self.capacity;
    let mut event = Some(event);

    let rejected = self.events.map_mut(|q| {
                                 let full = q.is_full() || q.len() >= capacity;
                                 match event.take() {
                                   | Some(e) if !full => {
                                     q.push(e);
                                     None
                                   },
                                   | other => other,
                                 }
                               });

    match rejected {
      | Some(e) => Err(QueueFull(e)),
      | None => Ok(()),
    }
  }
}

impl<P: PlatformTypes> Receive<P> for Mailbox<P> {
  fn try_recv(&self) -> nb::Result<Event<P>, Infallible> {
    self.events
        .map_mut(|q| q.remove(0))
        .ok_or(nb::Error::WouldBlock)
  }
}
