use toad_msg::Id;

use crate::net::{Addrd, UNSPECIFIED};
use crate::platform::PlatformTypes;
use crate::time::Tick;

/// A datagram the [`Engine`] would like sent
pub struct Outbound<P: PlatformTypes> {
  /// Present if and only if the message is confirmable
  /// and should be retransmitted until acknowledged.
  pub id: Option<Id>,
  /// The wire-ready bytes & where to send them
  pub msg: Addrd<P::Dgram>,
}

impl<P: PlatformTypes> Outbound<P> {
  /// A confirmable message, retransmitted until `id` is acknowledged
  pub fn con(id: Id, msg: Addrd<P::Dgram>) -> Self {
    Self { id: Some(id), msg }
  }

  /// A message that is sent once and forgotten
  pub fn non(msg: Addrd<P::Dgram>) -> Self {
    Self { id: None, msg }
  }
}

impl<P: PlatformTypes> Clone for Outbound<P> {
  fn clone(&self) -> Self {
    Self { id: self.id,
           msg: self.msg.clone() }
  }
}

impl<P: PlatformTypes> core::fmt::Debug for Outbound<P> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Outbound")
     .field("id", &self.id)
     .field("msg", &self.msg)
     .finish()
  }
}

impl<P: PlatformTypes> PartialEq for Outbound<P> {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id && self.msg == other.msg
  }
}

/// Used by the [`Engine`] to tell the scheduler what it should
/// do in reaction to an event.
pub enum Effect<P: PlatformTypes> {
  /// Send a message
  Send(Outbound<P>),
  /// The outstanding confirmable message with this id was acknowledged
  /// and must not be retransmitted anymore.
  ///
  /// Acknowledging an id that is not outstanding is not an error.
  Acked(Id),
}

impl<P: PlatformTypes> Clone for Effect<P> {
  fn clone(&self) -> Self {
    match self {
      | Effect::Send(m) => Effect::Send(m.clone()),
      | Effect::Acked(id) => Effect::Acked(*id),
    }
  }
}

impl<P: PlatformTypes> core::fmt::Debug for Effect<P> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      | Self::Send(m) => f.debug_tuple("Send").field(m).finish(),
      | Self::Acked(id) => f.debug_tuple("Acked").field(id).finish(),
    }
  }
}

impl<P: PlatformTypes> PartialEq for Effect<P> {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      | (Self::Send(a), Self::Send(b)) => a == b,
      | (Self::Acked(a), Self::Acked(b)) => a == b,
      | _ => false,
    }
  }
}

/// Only here so that `Effect`s can be stored in heapless collections.
///
/// An empty NON message to `0.0.0.0:0`; never produced by the scheduler itself.
impl<P: PlatformTypes> Default for Effect<P> {
  fn default() -> Self {
    Effect::Send(Outbound::non(Addrd(P::Dgram::default(), UNSPECIFIED)))
  }
}

/// The protocol logic driven by the scheduler.
///
/// Parsing & serializing PDUs, routing requests to resources,
/// and matching acknowledgements to the confirmable messages
/// they acknowledge are all the engine's responsibility.
///
/// # Contract
/// - every method must return promptly; the scheduler is blocked while they run
/// - ids of confirmable [`Outbound`] messages must not collide with the ids of
///   messages that are still outstanding
pub trait Engine<P: PlatformTypes> {
  /// Error yielded when an inbound datagram could not be handled
  type Error: core::fmt::Debug;

  /// A datagram arrived.
  ///
  /// Errors (e.g. the datagram is not a valid PDU) are logged and
  /// the datagram is discarded, but any effects pushed before the error
  /// are still performed.
  fn handle_inbound(&mut self,
                    now: Tick,
                    dgram: Addrd<P::Dgram>,
                    effects: &mut P::Effects)
                    -> Result<(), Self::Error>;

  /// The confirmable message `id` was never acknowledged and
  /// will not be retransmitted again.
  ///
  /// Invoked exactly once per abandoned message.
  fn on_delivery_failed(&mut self, id: Id, effects: &mut P::Effects);

  /// Periodic maintenance, see [`Config.housekeeping_period`](crate::config::Config::housekeeping_period)
  fn on_periodic(&mut self, now: Tick, effects: &mut P::Effects);
}
