use core::fmt::Debug;

#[cfg(feature = "alloc")]
use std_alloc::vec::Vec;
use toad_array::Array;

use crate::engine::Effect;
use crate::event::Event;
use crate::net::Transport;
use crate::retransmit::Outstanding;
use crate::time::Clock;

/// toad-sched configuration trait
///
/// Bundles the types a [`Scheduler`](crate::sched::Scheduler) is built from,
/// so that the same scheduler can run on top of `Vec` or on top of
/// fixed-capacity `tinyvec::ArrayVec`s.
pub trait PlatformTypes: Sized + 'static + Debug {
  /// What type should we use to store datagrams?
  type Dgram: AsRef<[u8]> + Clone + Debug + Default + PartialEq;

  /// What should we use to keep track of time?
  type Clock: Clock;

  /// What should we use to send datagrams?
  type Transport: Transport;

  /// How will we store a sequence of effects to perform?
  type Effects: Array<Item = Effect<Self>>;

  /// How will we store confirmable messages awaiting acknowledgement?
  ///
  /// For fixed-capacity collections, this is the maximum number
  /// of confirmable messages that can be outstanding at once.
  type Retransmits: Array<Item = Outstanding<Self>>;

  /// How will we store events waiting in a [`Mailbox`](crate::queue::Mailbox)?
  type Events: Array<Item = Event<Self>>;
}

/// Configures `toad-sched` to use `Vec` for collections
/// and datagrams.
#[cfg(feature = "alloc")]
#[cfg_attr(docsrs, doc(cfg(feature = "alloc")))]
#[derive(Copy)]
pub struct Alloc<Clk, Tx>(core::marker::PhantomData<(Clk, Tx)>)
  where Clk: Clock + 'static,
        Tx: Transport + 'static;

#[cfg(feature = "alloc")]
impl<Clk: Clock + 'static, Tx: Transport + 'static> Debug for Alloc<Clk, Tx> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write!(f, "Alloc::<_, _>(_)")
  }
}

#[cfg(feature = "alloc")]
impl<Clk: Clock + 'static, Tx: Transport + 'static> Clone for Alloc<Clk, Tx> {
  fn clone(&self) -> Self {
    Self(Default::default())
  }
}

#[cfg(feature = "alloc")]
impl<Clk: Clock + 'static, Tx: Transport + 'static> PlatformTypes for Alloc<Clk, Tx> {
  type Dgram = Vec<u8>;
  type Clock = Clk;
  type Transport = Tx;
  type Effects = Vec<Effect<Self>>;
  type Retransmits = Vec<Outstanding<Self>>;
  type Events = Vec<Event<Self>>;
}

/// Configures `toad-sched` to use `tinyvec::ArrayVec` for everything,
/// for platforms without a memory allocator.
///
/// | what                  | capacity   |
/// | --------------------- | ---------- |
/// | datagram              | 1152 bytes |
/// | effects per event     | 8          |
/// | outstanding CONs      | 16         |
/// | events in the mailbox | 8          |
#[derive(Copy)]
pub struct Heapless<Clk, Tx>(core::marker::PhantomData<(Clk, Tx)>)
  where Clk: Clock + 'static,
        Tx: Transport + 'static;

impl<Clk: Clock + 'static, Tx: Transport + 'static> Debug for Heapless<Clk, Tx> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write!(f, "Heapless::<_, _>(_)")
  }
}

impl<Clk: Clock + 'static, Tx: Transport + 'static> Clone for Heapless<Clk, Tx> {
  fn clone(&self) -> Self {
    Self(Default::default())
  }
}

impl<Clk: Clock + 'static, Tx: Transport + 'static> PlatformTypes for Heapless<Clk, Tx> {
  type Dgram = tinyvec::ArrayVec<[u8; 1152]>;
  type Clock = Clk;
  type Transport = Tx;
  type Effects = tinyvec::ArrayVec<[Effect<Self>; 8]>;
  type Retransmits = tinyvec::ArrayVec<[Outstanding<Self>; 16]>;
  type Events = tinyvec::ArrayVec<[Event<Self>; 8]>;
}

/// Configures `toad-sched` to use `Vec` for collections,
/// `UdpSocket` for networking, and [`crate::std::Clock`] for timing
#[cfg(feature = "std")]
#[cfg_attr(docsrs, doc(cfg(feature = "std")))]
pub type Std = Alloc<crate::std::Clock, std::net::UdpSocket>;
