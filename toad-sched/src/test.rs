use ::core::cell::{Cell, RefCell};
use std_alloc::rc::Rc;
use no_std_net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use toad_array::Array;
use toad_msg::Id;

use crate::engine::{Effect, Engine, Outbound};
use crate::net::{Addrd, Transport};
use crate::time::{Clock, Tick};

/// PlatformTypes implementor using mocks for clock and transport
pub type Platform = crate::platform::Alloc<ClockMock, TransportMock>;

/// Log everything to stdout; repeated calls are ignored
pub fn init_logger() {
  simple_logger::init_with_level(log::Level::Trace).ok();
}

pub fn dummy_addr() -> SocketAddr {
  SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(192, 168, 0, 1), 8080))
}

pub fn dummy_addr_2() -> SocketAddr {
  SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(192, 168, 0, 2), 8080))
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can keep a handle
/// to a clock that has been moved into a scheduler.
#[derive(Debug, Clone, Default)]
pub struct ClockMock(Rc<Cell<u32>>);

impl ClockMock {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set(&self, to: u32) {
    self.0.set(to);
  }

  pub fn get(&self) -> Tick {
    Tick(self.0.get())
  }
}

impl Clock for ClockMock {
  fn now(&self) -> Tick {
    self.get()
  }
}

/// A transport that records every datagram sent through it.
///
/// Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct TransportMock {
  pub sent: Rc<RefCell<Vec<Addrd<Vec<u8>>>>>,
  /// When set, sends yield `WouldBlock` and are not recorded
  pub blocked: Rc<Cell<bool>>,
}

impl TransportMock {
  pub fn new() -> Self {
    Self::default()
  }

  /// Take every datagram sent so far
  pub fn take(&self) -> Vec<Addrd<Vec<u8>>> {
    self.sent.borrow_mut().drain(..).collect()
  }

  pub fn count(&self) -> usize {
    self.sent.borrow().len()
  }
}

impl Transport for TransportMock {
  type Error = ();

  fn send(&self, msg: Addrd<&[u8]>) -> nb::Result<(), Self::Error> {
    if self.blocked.get() {
      return Err(nb::Error::WouldBlock);
    }

    self.sent.borrow_mut().push(msg.map(Vec::from));
    Ok(())
  }
}

/// A toy protocol for exercising the scheduler.
///
/// | inbound bytes      | effect                                          |
/// | ------------------ | ----------------------------------------------- |
/// | `[0, hi, lo]`      | ack message `hi lo`                             |
/// | `[1, hi, lo, ..]`  | reply with the same bytes, CON with id `hi lo`  |
/// | `[2, ..]`          | reply with the same bytes, NON                  |
/// | `[3, ..]`          | reply NON, then report the datagram as invalid  |
/// | anything else      | invalid                                         |
pub mod wire {
  use toad_msg::Id;

  pub fn ack(Id(id): Id) -> Vec<u8> {
    let [hi, lo] = id.to_be_bytes();
    vec![0, hi, lo]
  }

  pub fn con(Id(id): Id) -> Vec<u8> {
    let [hi, lo] = id.to_be_bytes();
    vec![1, hi, lo]
  }

  pub fn non(n: u8) -> Vec<u8> {
    vec![2, n]
  }

  pub fn id(bytes: &[u8]) -> Id {
    Id(u16::from_be_bytes([bytes[1], bytes[2]]))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Malformed;

#[derive(Debug, Default)]
pub struct EngineMock {
  pub inbound: Vec<Addrd<Vec<u8>>>,
  pub failed: Vec<(Tick, Id)>,
  pub periodic: Vec<Tick>,
  /// Emitted (in order) by the next calls to `on_periodic`, one per call
  pub on_periodic_emit: Vec<Effect<Platform>>,
  /// Emitted by every call to `on_delivery_failed`
  pub on_failed_emit: Option<Effect<Platform>>,
  clock: Option<ClockMock>,
}

impl EngineMock {
  pub fn new(clock: &ClockMock) -> Self {
    Self { clock: Some(clock.clone()),
           ..Default::default() }
  }

  fn now(&self) -> Tick {
    self.clock.as_ref().map(|c| c.now()).unwrap_or_default()
  }
}

impl Engine<Platform> for EngineMock {
  type Error = Malformed;

  fn handle_inbound(&mut self,
                    _: Tick,
                    dgram: Addrd<Vec<u8>>,
                    effects: &mut Vec<Effect<Platform>>)
                    -> Result<(), Malformed> {
    self.inbound.push(dgram.clone());

    let Addrd(bytes, from) = dgram;
    match bytes.first().copied() {
      | Some(0) if bytes.len() == 3 => {
        effects.push(Effect::Acked(wire::id(&bytes)));
        Ok(())
      },
      | Some(1) if bytes.len() >= 3 => {
        effects.push(Effect::Send(Outbound::con(wire::id(&bytes), Addrd(bytes, from))));
        Ok(())
      },
      | Some(2) => {
        effects.push(Effect::Send(Outbound::non(Addrd(bytes, from))));
        Ok(())
      },
      | Some(3) => {
        effects.push(Effect::Send(Outbound::non(Addrd(bytes, from))));
        Err(Malformed)
      },
      | _ => Err(Malformed),
    }
  }

  fn on_delivery_failed(&mut self, id: Id, effects: &mut Vec<Effect<Platform>>) {
    let now = self.now();
    self.failed.push((now, id));
    if let Some(e) = self.on_failed_emit.clone() {
      effects.push(e);
    }
  }

  fn on_periodic(&mut self, now: Tick, effects: &mut Vec<Effect<Platform>>) {
    self.periodic.push(now);
    if let Some(e) = Array::remove(&mut self.on_periodic_emit, 0) {
      effects.push(e);
    }
  }
}
