use ::core::convert::Infallible;
use ::std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError, TrySendError};

use crate::event::Event;
use crate::platform::PlatformTypes;
use crate::queue::{Post, QueueFull, Receive};

/// Create a bounded event queue over [`std::sync::mpsc::sync_channel`].
///
/// The [`Poster`] may be cloned and handed to any number of threads
/// (e.g. a [`Listener`](crate::std::Listener) and a
/// [`ThreadTimer`](crate::std::ThreadTimer)); the [`Inbox`] belongs to
/// the scheduler, which parks its thread in [`Receive::recv`] while idle.
///
/// A `capacity` of zero is treated as one.
pub fn channel<P: PlatformTypes>(capacity: usize) -> (Poster<P>, Inbox<P>) {
  let (tx, rx) = mpsc::sync_channel(capacity.max(1));
  let poster = Poster { tx };
  let inbox = Inbox { rx,
                      poster: poster.clone() };
  (poster, inbox)
}

/// The producer side of a [`channel`]
pub struct Poster<P: PlatformTypes> {
  tx: SyncSender<Event<P>>,
}

impl<P: PlatformTypes> Clone for Poster<P> {
  fn clone(&self) -> Self {
    Self { tx: self.tx.clone() }
  }
}

impl<P: PlatformTypes> core::fmt::Debug for Poster<P> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.write_str("Poster")
  }
}

impl<P: PlatformTypes> Poster<P> {
  /// Like [`Post::post`], but tells a full queue apart from
  /// one whose [`Inbox`] has been dropped.
  pub fn try_post(&self, event: Event<P>) -> Result<(), TrySendError<Event<P>>> {
    self.tx.try_send(event)
  }
}

impl<P: PlatformTypes> Post<P> for Poster<P> {
  fn post(&self, event: Event<P>) -> Result<(), QueueFull<Event<P>>> {
    self.try_post(event).map_err(|e| match e {
                              | TrySendError::Full(e) => QueueFull(e),
                              | TrySendError::Disconnected(e) => {
                                log::debug!("scheduler is gone, dropping {:?}", e);
                                QueueFull(e)
                              },
                            })
  }
}

/// The consumer side of a [`channel`]
///
/// Also implements [`Post`], so that the scheduler can post
/// wakeups from [polled timers](crate::timer::Timer::POLLED) to itself.
pub struct Inbox<P: PlatformTypes> {
  rx: Receiver<Event<P>>,
  poster: Poster<P>,
}

impl<P: PlatformTypes> Inbox<P> {
  /// Get a new handle for posting to this inbox
  pub fn poster(&self) -> Poster<P> {
    self.poster.clone()
  }
}

impl<P: PlatformTypes> core::fmt::Debug for Inbox<P> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.write_str("Inbox")
  }
}

impl<P: PlatformTypes> Post<P> for Inbox<P> {
  fn post(&self, event: Event<P>) -> Result<(), QueueFull<Event<P>>> {
    self.poster.post(event)
  }
}

impl<P: PlatformTypes> Receive<P> for Inbox<P> {
  fn try_recv(&self) -> nb::Result<Event<P>, Infallible> {
    self.rx.try_recv().map_err(|e| match e {
                        | TryRecvError::Empty | TryRecvError::Disconnected => nb::Error::WouldBlock,
                      })
  }

  fn recv(&self) -> Event<P> {
    // the inbox holds a sender itself, so the channel never disconnects
    self.rx.recv().unwrap_or(Event::Stop)
  }
}

#[cfg(test)]
mod tests {
  use ::std::thread;
  use ::std::time::Duration;

  use super::*;
  use crate::platform::Std;
  use crate::test;

  #[test]
  fn fifo() {
    let (poster, inbox) = channel::<Std>(4);
    poster.post(Event::Housekeeping).unwrap();
    poster.post_received(vec![1], test::dummy_addr()).unwrap();
    inbox.post(Event::RetransmitCheck).unwrap();

    assert_eq!(inbox.try_recv(), Ok(Event::Housekeeping));
    assert_eq!(inbox.recv(),
               Event::Recvd(crate::net::Addrd(vec![1], test::dummy_addr())));
    assert_eq!(inbox.try_recv(), Ok(Event::RetransmitCheck));
    assert_eq!(inbox.try_recv(), Err(nb::Error::WouldBlock));
  }

  #[test]
  fn full_rejects_without_blocking() {
    let (poster, inbox) = channel::<Std>(2);
    poster.post(Event::Housekeeping).unwrap();
    poster.post(Event::RetransmitCheck).unwrap();

    assert_eq!(poster.post(Event::Stop).map_err(QueueFull::into_inner),
               Err(Event::Stop));

    assert_eq!(inbox.try_recv(), Ok(Event::Housekeeping));
    assert_eq!(inbox.try_recv(), Ok(Event::RetransmitCheck));
  }

  #[test]
  fn zero_capacity_holds_one() {
    let (poster, inbox) = channel::<Std>(0);
    poster.post(Event::Housekeeping).unwrap();
    assert!(poster.post(Event::Housekeeping).is_err());
    assert_eq!(inbox.try_recv(), Ok(Event::Housekeeping));
  }

  #[test]
  fn recv_parks_until_posted() {
    let (poster, inbox) = channel::<Std>(1);

    let handle = thread::spawn(move || {
                   thread::sleep(Duration::from_millis(20));
                   poster.post(Event::Stop).unwrap();
                 });

    assert_eq!(inbox.recv(), Event::Stop);
    handle.join().unwrap();
  }

  #[test]
  fn many_producers() {
    let (poster, inbox) = channel::<Std>(64);

    let handles = (0..4u8).map(|n| {
                             let poster = poster.clone();
                             thread::spawn(move || {
                               (0..8u8).for_each(|i| {
                                         poster.post_received(vec![n, i], test::dummy_addr())
                                               .unwrap()
                                       })
                             })
                           })
                           .collect::<Vec<_>>();

    handles.into_iter().for_each(|h| h.join().unwrap());

    let got = ::core::iter::from_fn(|| inbox.try_recv().ok()).count();
    assert_eq!(got, 32);
  }

  #[test]
  fn dropped_inbox_disconnects() {
    let (poster, inbox) = channel::<Std>(4);
    drop(inbox);

    assert_eq!(poster.try_post(Event::Housekeeping),
               Err(TrySendError::Disconnected(Event::Housekeeping)));
    assert_eq!(poster.post(Event::Stop).map_err(QueueFull::into_inner),
               Err(Event::Stop));
  }
}
