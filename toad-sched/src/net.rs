use no_std_net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// Data that came from (or is going to) a network endpoint
#[derive(PartialEq, PartialOrd, Eq, Ord, Hash, Debug, Clone, Copy)]
pub struct Addrd<T>(pub T, pub SocketAddr);

impl<T> Addrd<T> {
  /// Map the data contained in this Addressed
  pub fn map<R>(self, f: impl FnOnce(T) -> R) -> Addrd<R> {
    Addrd(f(self.0), self.1)
  }

  /// Borrow the contents of the addressed item
  pub fn data(&self) -> &T {
    &self.0
  }

  /// Copy the socket address for the data
  pub fn addr(&self) -> SocketAddr {
    self.1
  }
}

impl<T: AsRef<[u8]>> Addrd<T> {
  /// Borrow the addressed bytes
  pub fn as_bytes(&self) -> Addrd<&[u8]> {
    Addrd(self.0.as_ref(), self.1)
  }
}

/// `0.0.0.0:0`, used to pad unused slots in heapless collections
pub(crate) const UNSPECIFIED: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));

/// The datagram channel outbound messages are written to.
///
/// This is a small subset of a UDP socket; the scheduler
/// never reads from a transport. Inbound datagrams reach it through
/// [`Post::post_received`](crate::queue::Post::post_received) instead.
pub trait Transport {
  /// The error yielded by transport operations
  type Error: core::fmt::Debug;

  /// Send a datagram to a remote address.
  ///
  /// Sending is fire-and-forget from the scheduler's perspective;
  /// a send that fails (or would block) is logged and left for
  /// the retransmission mechanism to make up for.
  fn send(&self, msg: Addrd<&[u8]>) -> nb::Result<(), Self::Error>;
}

impl<T: Transport> Transport for &T {
  type Error = T::Error;

  fn send(&self, msg: Addrd<&[u8]>) -> nb::Result<(), Self::Error> {
    (*self).send(msg)
  }
}
