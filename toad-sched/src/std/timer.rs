use ::std::io;
use ::std::sync::mpsc::TrySendError;
use ::std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use ::std::thread::{self, JoinHandle};
use ::std::time::Duration;

use super::{Clock, Poster};
use crate::event::Deadline;
use crate::platform::PlatformTypes;
use crate::time::Clock as _;
use crate::timer::Timer;

/// How long to wait before posting again when the queue was full
const RETRY_FULL: Duration = Duration::from_millis(1);

#[derive(Debug, Default)]
struct Shared {
  armed: Option<Deadline>,
  shutdown: bool,
}

type State = Arc<(Mutex<Shared>, Condvar)>;

fn lock(state: &State) -> MutexGuard<'_, Shared> {
  state.0.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A [`Timer`] backed by a thread that sleeps until the armed
/// deadline and then posts the wakeup to the scheduler's queue.
///
/// The clock handed to the timer must be a copy of the scheduler's
/// clock so that both agree on what a [`Tick`](crate::time::Tick) means.
///
/// The thread exits once the queue's [`Inbox`](crate::std::Inbox) is dropped.
///
/// Dropping the timer stops & joins its thread.
pub struct ThreadTimer<P: PlatformTypes> {
  state: State,
  handle: Option<JoinHandle<()>>,
  _p: ::core::marker::PhantomData<fn() -> P>,
}

impl<P: PlatformTypes> ::core::fmt::Debug for ThreadTimer<P> {
  fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
    f.debug_struct("ThreadTimer")
     .field("armed", &self.armed())
     .finish()
  }
}

impl<P> ThreadTimer<P>
  where P: PlatformTypes,
        P::Dgram: Send
{
  /// Start the timer thread
  pub fn spawn(clock: Clock, poster: Poster<P>) -> io::Result<Self> {
    let state = State::default();
    let thread_state = Arc::clone(&state);

    let handle = thread::Builder::new().name("toad-sched-timer".into())
                                       .spawn(move || Self::work(clock, poster, thread_state))?;

    Ok(Self { state,
              handle: Some(handle),
              _p: Default::default() })
  }

  fn work(clock: Clock, poster: Poster<P>, state: State) {
    let cvar = &state.1;
    let mut shared = lock(&state);

    loop {
      if shared.shutdown {
        return;
      }

      let deadline = match shared.armed {
        | Some(d) => d,
        | None => {
          shared = cvar.wait(shared).unwrap_or_else(PoisonError::into_inner);
          continue;
        },
      };

      let remaining = deadline.at.since(clock.now());
      let wait = if remaining > 0 {
        Duration::from_millis(remaining as u64)
      } else {
        match poster.try_post(deadline.wakeup.into()) {
          | Ok(()) => {
            shared.armed = None;
            continue;
          },
          | Err(TrySendError::Full(_)) => {
            log::error!("event queue full, retrying {:?}", deadline.wakeup);
            RETRY_FULL
          },
          | Err(TrySendError::Disconnected(_)) => {
            log::debug!("event queue closed, timer thread exiting");
            return;
          },
        }
      };

      shared = cvar.wait_timeout(shared, wait)
                   .map(|(guard, _)| guard)
                   .unwrap_or_else(|e| e.into_inner().0);
    }
  }
}

impl<P: PlatformTypes> Timer for ThreadTimer<P> {
  fn arm_at(&mut self, deadline: Deadline) {
    lock(&self.state).armed = Some(deadline);
    self.state.1.notify_one();
  }

  fn disarm(&mut self) {
    lock(&self.state).armed = None;
    self.state.1.notify_one();
  }

  fn armed(&self) -> Option<Deadline> {
    lock(&self.state).armed
  }
}

impl<P: PlatformTypes> Drop for ThreadTimer<P> {
  fn drop(&mut self) {
    lock(&self.state).shutdown = true;
    self.state.1.notify_one();

    if let Some(handle) = self.handle.take() {
      if handle.join().is_err() {
        log::error!("timer thread panicked");
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use ::std::time::Instant;

  use super::*;
  use crate::event::{Event, Wakeup};
  use crate::platform::Std;
  use crate::queue::{Post, Receive};
  use crate::std::{channel, Inbox};

  fn recv_within(inbox: &Inbox<Std>, ms: u64) -> Option<Event<Std>> {
    let until = Instant::now() + Duration::from_millis(ms);
    loop {
      if let Ok(e) = inbox.try_recv() {
        return Some(e);
      }

      if Instant::now() > until {
        return None;
      }

      thread::sleep(Duration::from_millis(1));
    }
  }

  #[test]
  fn posts_when_deadline_reached() {
    let clock = Clock::new();
    let (poster, inbox) = channel::<Std>(4);
    let mut timer = ThreadTimer::spawn(clock, poster).unwrap();

    let at = clock.now().after_millis(30);
    timer.arm_at(Deadline::housekeeping(at));

    assert_eq!(recv_within(&inbox, 2_000), Some(Event::Housekeeping));
    assert!(at.has_elapsed(clock.now()));
    assert_eq!(timer.armed(), None);

    // single-shot
    assert_eq!(recv_within(&inbox, 60), None);
  }

  #[test]
  fn past_deadline_posts_immediately() {
    let clock = Clock::new();
    let (poster, inbox) = channel::<Std>(4);
    let mut timer = ThreadTimer::spawn(clock, poster).unwrap();

    timer.arm_at(Deadline::retransmit_check(clock.now()));
    assert_eq!(recv_within(&inbox, 2_000), Some(Event::RetransmitCheck));
  }

  #[test]
  fn rearming_replaces() {
    let clock = Clock::new();
    let (poster, inbox) = channel::<Std>(4);
    let mut timer = ThreadTimer::spawn(clock, poster).unwrap();

    timer.arm_at(Deadline::housekeeping(clock.now().after_millis(10_000)));
    timer.arm_at(Deadline::retransmit_check(clock.now().after_millis(20)));
    assert_eq!(timer.armed().map(|d| d.wakeup),
               Some(Wakeup::RetransmitCheck));

    assert_eq!(recv_within(&inbox, 2_000), Some(Event::RetransmitCheck));
    assert_eq!(recv_within(&inbox, 60), None);
  }

  #[test]
  fn disarmed_never_posts() {
    let clock = Clock::new();
    let (poster, inbox) = channel::<Std>(4);
    let mut timer = ThreadTimer::spawn(clock, poster).unwrap();

    timer.arm_at(Deadline::housekeeping(clock.now().after_millis(30)));
    timer.disarm();

    assert_eq!(recv_within(&inbox, 100), None);
  }

  #[test]
  fn retries_when_queue_full() {
    let clock = Clock::new();
    let (poster, inbox) = channel::<Std>(1);
    poster.post(Event::Housekeeping).unwrap();

    let mut timer = ThreadTimer::spawn(clock, poster).unwrap();
    timer.arm_at(Deadline::retransmit_check(clock.now()));

    thread::sleep(Duration::from_millis(20));
    assert_eq!(inbox.try_recv(), Ok(Event::Housekeeping));
    assert_eq!(recv_within(&inbox, 2_000), Some(Event::RetransmitCheck));
  }

  #[test]
  fn exits_when_inbox_dropped() {
    let clock = Clock::new();
    let (poster, inbox) = channel::<Std>(1);
    let mut timer = ThreadTimer::spawn(clock, poster).unwrap();
    drop(inbox);

    timer.arm_at(Deadline::retransmit_check(clock.now()));

    let finished = || timer.handle.as_ref().map(|h| h.is_finished()).unwrap_or(true);
    let until = Instant::now() + Duration::from_secs(2);
    while !finished() && Instant::now() < until {
      thread::sleep(Duration::from_millis(1));
    }

    assert!(finished());
  }

  #[test]
  fn drop_joins_thread() {
    let clock = Clock::new();
    let (poster, _inbox) = channel::<Std>(1);
    let mut timer = ThreadTimer::spawn(clock, poster).unwrap();
    timer.arm_at(Deadline::housekeeping(clock.now().after_millis(60_000)));

    let start = Instant::now();
    drop(timer);
    assert!(start.elapsed() < Duration::from_secs(5));
  }
}
