use ::std::io;
use ::std::net::UdpSocket;
use ::std::sync::atomic::{AtomicBool, Ordering};
use ::std::sync::mpsc::TrySendError;
use ::std::sync::Arc;
use ::std::thread::{self, JoinHandle};
use ::std::time::Duration;

use no_std_net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use super::Poster;
use crate::net::{Addrd, Transport};
use crate::event::Event;
use crate::platform::PlatformTypes;

/// Largest datagram the [`Listener`] will receive without truncating
pub const MAX_DGRAM: usize = 1152;

/// How often the [`Listener`] checks whether it should stop
const POLL_STOP: Duration = Duration::from_millis(100);

/// Convert a `std` socket address to a `no_std_net` one
pub fn from_std(addr: ::std::net::SocketAddr) -> SocketAddr {
  match addr {
    | ::std::net::SocketAddr::V4(v4) => {
      let [a, b, c, d] = v4.ip().octets();
      SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(a, b, c, d), v4.port()))
    },
    | ::std::net::SocketAddr::V6(v6) => {
      let [a, b, c, d, e, f, g, h] = v6.ip().segments();
      SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::new(a, b, c, d, e, f, g, h),
                                       v6.port(),
                                       v6.flowinfo(),
                                       v6.scope_id()))
    },
  }
}

/// Convert a `no_std_net` socket address to a `std` one
pub fn to_std(addr: SocketAddr) -> ::std::net::SocketAddr {
  match addr {
    | SocketAddr::V4(v4) => {
      let [a, b, c, d] = v4.ip().octets();
      ::std::net::SocketAddr::V4(::std::net::SocketAddrV4::new(::std::net::Ipv4Addr::new(a, b, c, d),
                                                               v4.port()))
    },
    | SocketAddr::V6(v6) => {
      let [a, b, c, d, e, f, g, h] = v6.ip().segments();
      ::std::net::SocketAddr::V6(::std::net::SocketAddrV6::new(::std::net::Ipv6Addr::new(a, b, c, d, e, f, g, h),
                                                               v6.port(),
                                                               v6.flowinfo(),
                                                               v6.scope_id()))
    },
  }
}

pub(crate) fn io_to_nb(err: io::Error) -> nb::Error<io::Error> {
  match err.kind() {
    | io::ErrorKind::WouldBlock => nb::Error::WouldBlock,
    | _ => nb::Error::Other(err),
  }
}

/// Sends with `send_to`.
///
/// The socket is left in whatever blocking mode it was in, since
/// a [`Listener`] may be reading from a clone of it.
impl Transport for UdpSocket {
  type Error = io::Error;

  fn send(&self, msg: Addrd<&[u8]>) -> nb::Result<(), Self::Error> {
    self.send_to(msg.data(), to_std(msg.addr()))
        .map(|_| ())
        .map_err(io_to_nb)
  }
}

/// A thread that receives every datagram arriving on a socket
/// and posts it to the scheduler's queue.
///
/// Datagrams that arrive while the queue is full are dropped.
/// The thread exits once the queue's [`Inbox`](crate::std::Inbox) is dropped.
///
/// Dropping the listener stops & joins its thread.
#[derive(Debug)]
pub struct Listener {
  stop: Arc<AtomicBool>,
  handle: Option<JoinHandle<()>>,
  addr: SocketAddr,
}

impl Listener {
  /// Start receiving on a clone of `sock`
  pub fn spawn<P>(sock: &UdpSocket, poster: Poster<P>) -> io::Result<Self>
    where P: PlatformTypes<Dgram = Vec<u8>>
  {
    let sock = sock.try_clone()?;
    sock.set_read_timeout(Some(POLL_STOP))?;
    let addr = from_std(sock.local_addr()?);

    let stop = Arc::new(AtomicBool::new(false));
    let thread_stop = Arc::clone(&stop);

    let handle = thread::Builder::new().name("toad-sched-listener".into())
                                       .spawn(move || Self::work(sock, poster, thread_stop))?;

    log::debug!("listening on {}", addr);
    Ok(Self { stop,
              handle: Some(handle),
              addr })
  }

  /// The address datagrams are received on
  pub fn local_addr(&self) -> SocketAddr {
    self.addr
  }

  fn work<P>(sock: UdpSocket, poster: Poster<P>, stop: Arc<AtomicBool>)
    where P: PlatformTypes<Dgram = Vec<u8>>
  {
    let mut buf = [0u8; MAX_DGRAM];

    while !stop.load(Ordering::Relaxed) {
      match sock.recv_from(&mut buf) {
        | Ok((n, from)) => {
          let from = from_std(from);
          match poster.try_post(Event::Recvd(Addrd(buf[..n].to_vec(), from))) {
            | Ok(()) => (),
            | Err(TrySendError::Full(_)) => {
              log::debug!("event queue full, dropped {}b from {}", n, from)
            },
            | Err(TrySendError::Disconnected(_)) => {
              log::debug!("event queue closed, listener exiting");
              return;
            },
          }
        },
        | Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => (),
        | Err(e) => log::warn!("recv failed: {:?}", e),
      }
    }
  }
}

impl Drop for Listener {
  fn drop(&mut self) {
    self.stop.store(true, Ordering::Relaxed);

    if let Some(handle) = self.handle.take() {
      if handle.join().is_err() {
        log::error!("listener thread panicked");
      }
    }
  }
}
