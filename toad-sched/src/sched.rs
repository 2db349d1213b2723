use embedded_time::duration::Milliseconds;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use toad_array::Array;
use toad_msg::Id;

use crate::config::Config;
use crate::engine::{Effect, Engine, Outbound};
use crate::event::{Deadline, Event};
use crate::logging::dgram_summary;
use crate::net::{Addrd, Transport};
use crate::platform::PlatformTypes;
use crate::queue::{Post, Receive};
use crate::retransmit::{self, Outstanding, RetransmitSet};
use crate::retry::Attempts;
use crate::time::{Clock, Tick};
use crate::timer::Timer;

/// Should the event loop keep going?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
  /// Keep receiving events
  Continue,
  /// A [`Stop`](Event::Stop) event was handled
  Stop,
}

/// Errors that halt the event loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
  /// The engine asked for a confirmable message to be sent
  /// with the id of a message that is still outstanding.
  DuplicateId(Id),
}

impl core::fmt::Display for Error {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      | Error::DuplicateId(Id(id)) => {
        write!(f, "engine reused id {} while it was still outstanding", id)
      },
    }
  }
}

/// Send a datagram, logging (and otherwise ignoring) failure.
///
/// Lost sends are made up for by retransmission (for CON messages)
/// or not at all (for NON messages).
fn transmit<Tx: Transport>(transport: &Tx, msg: Addrd<&[u8]>) {
  match transport.send(msg) {
    | Ok(()) => log::trace!("sent {} -> {}", dgram_summary(msg.data()), msg.addr()),
    | Err(nb::Error::WouldBlock) => log::warn!("transport busy, dropped {} -> {}",
                                               dgram_summary(msg.data()),
                                               msg.addr()),
    | Err(nb::Error::Other(e)) => log::warn!("failed to send {} -> {}: {:?}",
                                             dgram_summary(msg.data()),
                                             msg.addr(),
                                             e),
  }
}

/// The event loop.
///
/// Owns the [`RetransmitSet`] and is its only writer; everything else
/// (datagram arrival, timer expiry, shutdown) reaches the scheduler by
/// posting [`Event`]s into its queue.
///
/// # Type parameters
/// - `P`: the [`PlatformTypes`] (collections, clock, transport)
/// - `E`: the [`Engine`] implementing the protocol
/// - `Q`: the event queue; the scheduler both receives from it and
///   (for [polled timers](Timer::POLLED)) posts wakeups into it
/// - `T`: the [`Timer`] the scheduler arms for its next wakeup
///
/// ```
/// use toad_sched::config::Config;
/// use toad_sched::engine::{Effect, Engine, Outbound};
/// use toad_sched::event::Event;
/// use toad_sched::net::Addrd;
/// use toad_sched::platform::Std;
/// use toad_sched::queue::{Mailbox, Post};
/// use toad_sched::time::Tick;
/// use toad_sched::timer::PollTimer;
/// use toad_sched::Scheduler;
///
/// /// Replies to every datagram with the same bytes
/// struct Echo;
///
/// impl Engine<Std> for Echo {
///   type Error = ();
///
///   fn handle_inbound(&mut self,
///                     _: Tick,
///                     dgram: Addrd<Vec<u8>>,
///                     effects: &mut Vec<Effect<Std>>)
///                     -> Result<(), ()> {
///     effects.push(Effect::Send(Outbound::non(dgram)));
///     Ok(())
///   }
///
///   fn on_delivery_failed(&mut self, _: toad_msg::Id, _: &mut Vec<Effect<Std>>) {}
///   fn on_periodic(&mut self, _: Tick, _: &mut Vec<Effect<Std>>) {}
/// }
///
/// let sock = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
/// let peer = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
/// let peer_addr = toad_sched::std::net::from_std(peer.local_addr().unwrap());
///
/// let config = Config::default();
/// let mut sched = Scheduler::<Std, _, _, _>::new(config,
///                                                toad_sched::std::Clock::new(),
///                                                sock,
///                                                Echo,
///                                                Mailbox::<Std>::from_config(&config),
///                                                PollTimer::default());
///
/// sched.queue().post_received(vec![1, 2, 3], peer_addr).unwrap();
/// sched.queue().post(Event::Stop).unwrap();
/// sched.run().unwrap();
///
/// let mut buf = [0u8; 8];
/// let (n, _) = peer.recv_from(&mut buf).unwrap();
/// assert_eq!(&buf[..n], &[1, 2, 3]);
/// ```
pub struct Scheduler<P, E, Q, T>
  where P: PlatformTypes,
        E: Engine<P>,
        Q: Receive<P> + Post<P>,
        T: Timer
{
  config: Config,
  clock: P::Clock,
  transport: P::Transport,
  engine: E,
  queue: Q,
  timer: T,
  retransmits: RetransmitSet<P>,
  next_housekeeping: Tick,
  deadline: Option<Deadline>,
  rand: ChaCha8Rng,
}

impl<P, E, Q, T> core::fmt::Debug for Scheduler<P, E, Q, T>
  where P: PlatformTypes,
        E: Engine<P>,
        Q: Receive<P> + Post<P>,
        T: Timer
{
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Scheduler")
     .field("config", &self.config)
     .field("retransmits", &self.retransmits)
     .field("next_housekeeping", &self.next_housekeeping)
     .field("deadline", &self.deadline)
     .finish_non_exhaustive()
  }
}

impl<P, E, Q, T> Scheduler<P, E, Q, T>
  where P: PlatformTypes,
        E: Engine<P>,
        Q: Receive<P> + Post<P>,
        T: Timer
{
  /// Create a scheduler, arming `timer` for the first housekeeping
  /// wakeup one period from now.
  pub fn new(config: Config,
             clock: P::Clock,
             transport: P::Transport,
             engine: E,
             queue: Q,
             timer: T)
             -> Self {
    let now = clock.now();
    let period = Self::period_of(&config);

    log::debug!("CON messages will be given up on after at most {}ms",
                config.max_transmit_wait().0);

    let mut sched = Self { rand: ChaCha8Rng::seed_from_u64(config.jitter_seed ^ u64::from(now.0)),
                           next_housekeeping: now.after(period),
                           deadline: None,
                           retransmits: RetransmitSet::new(),
                           config,
                           clock,
                           transport,
                           engine,
                           queue,
                           timer };
    sched.rearm();
    sched
  }

  /// Runtime config
  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Confirmable messages awaiting acknowledgement
  pub fn retransmits(&self) -> &RetransmitSet<P> {
    &self.retransmits
  }

  /// The wakeup the timer is currently armed for
  pub fn deadline(&self) -> Option<Deadline> {
    self.deadline
  }

  /// The tick of the next housekeeping wakeup
  pub fn next_housekeeping(&self) -> Tick {
    self.next_housekeeping
  }

  /// The engine
  pub fn engine(&self) -> &E {
    &self.engine
  }

  /// The engine, mutably
  pub fn engine_mut(&mut self) -> &mut E {
    &mut self.engine
  }

  /// The event queue; post to this to send events to the scheduler
  pub fn queue(&self) -> &Q {
    &self.queue
  }

  /// The timer
  pub fn timer(&self) -> &T {
    &self.timer
  }

  /// Receive & handle events until a [`Stop`](Event::Stop) event is handled.
  ///
  /// With an interrupt-style [`Timer`] this blocks in [`Receive::recv`]
  /// while there is nothing to do. With a [polled](Timer::POLLED) timer
  /// this spins, polling the timer whenever the queue is empty.
  pub fn run(&mut self) -> Result<(), Error> {
    loop {
      let event = match self.try_next() {
        | Some(event) => event,
        | None if T::POLLED => {
          core::hint::spin_loop();
          continue;
        },
        | None => self.queue.recv(),
      };

      if let Flow::Stop = self.handle(event)? {
        return Ok(());
      }
    }
  }

  /// Handle a single event without blocking.
  ///
  /// If the queue is empty the timer is [polled](Timer::fire), and a
  /// wakeup it yields is posted & handled. Yields `WouldBlock` when
  /// there was nothing to do.
  pub fn step(&mut self) -> nb::Result<Flow, Error> {
    match self.try_next() {
      | Some(event) => self.handle(event).map_err(nb::Error::Other),
      | None => Err(nb::Error::WouldBlock),
    }
  }

  /// Handle one event, then rearm the timer for whatever should happen next.
  pub fn handle(&mut self, event: Event<P>) -> Result<Flow, Error> {
    let now = self.clock.now();

    if event.is_wakeup() {
      // the armed deadline has fired
      self.deadline = None;
    }

    match event {
      | Event::Recvd(dgram) => self.recvd(now, dgram)?,
      | Event::RetransmitCheck => self.retransmit_due(now)?,
      | Event::Housekeeping => self.housekeep(now)?,
      | Event::Stop => {
        self.stop();
        return Ok(Flow::Stop);
      },
    }

    self.rearm();
    Ok(Flow::Continue)
  }

  fn try_next(&mut self) -> Option<Event<P>> {
    self.queue
        .try_recv()
        .ok()
        .or_else(|| {
          if self.poll_timer() {
            self.queue.try_recv().ok()
          } else {
            None
          }
        })
  }

  /// Ask a polled timer whether it has fired, posting the wakeup if it has.
  fn poll_timer(&mut self) -> bool {
    let wakeup = match self.timer.fire(self.clock.now()) {
      | Some(w) => w,
      | None => return false,
    };

    match self.queue.post(wakeup.into()) {
      | Ok(()) => true,
      | Err(_) => {
        log::error!("event queue full, {:?} will be retried", wakeup);
        self.deadline = None;
        self.rearm();
        false
      },
    }
  }

  fn recvd(&mut self, now: Tick, dgram: Addrd<P::Dgram>) -> Result<(), Error> {
    log::trace!("recvd {} <- {}",
                dgram_summary(dgram.data().as_ref()),
                dgram.addr());

    let mut effects = P::Effects::default();
    let from = dgram.addr();
    if let Err(e) = self.engine.handle_inbound(now, dgram, &mut effects) {
      log::warn!("discarding dgram from {}: {:?}", from, e);
    }

    self.perform(now, &mut effects)
  }

  fn retransmit_due(&mut self, now: Tick) -> Result<(), Error> {
    let mut effects = P::Effects::default();

    while let Some(mut msg) = self.retransmits.pop_due(now) {
      if msg.attempts_left.exhausted() {
        log::debug!("{:?} was never acknowledged, giving up", msg.id);
        self.engine.on_delivery_failed(msg.id, &mut effects);
        self.perform(now, &mut effects)?;
        continue;
      }

      transmit(&self.transport, msg.msg.as_bytes());

      let strategy = self.config.con.retry_strategy;
      msg.attempts_left = msg.attempts_left - Attempts(1);
      msg.timeout = strategy.backoff(msg.timeout);
      msg.due = now.after(msg.timeout);

      log::trace!("{:?} retransmitted, {} attempts left, next due at {:?}",
                  msg.id,
                  msg.attempts_left.0,
                  msg.due);

      self.reinsert(msg, &mut effects)?;
      self.perform(now, &mut effects)?;
    }

    Ok(())
  }

  fn reinsert(&mut self, msg: Outstanding<P>, effects: &mut P::Effects) -> Result<(), Error> {
    match self.retransmits.reinsert(msg) {
      | Ok(()) => Ok(()),
      | Err(retransmit::Error::DuplicateId(id)) => Err(Error::DuplicateId(id)),
      | Err(retransmit::Error::Full(id)) => {
        log::error!("no room to keep retransmitting {:?}", id);
        self.engine.on_delivery_failed(id, effects);
        Ok(())
      },
    }
  }

  fn housekeep(&mut self, now: Tick) -> Result<(), Error> {
    if !self.next_housekeeping.has_elapsed(now) {
      log::trace!("ignoring early housekeeping wakeup");
      return Ok(());
    }

    let mut effects = P::Effects::default();
    self.engine.on_periodic(now, &mut effects);

    let period = Self::period_of(&self.config);
    let next = self.next_housekeeping.after(period);
    self.next_housekeeping = if now.is_before(next) {
      next
    } else {
      log::debug!("housekeeping fell behind by {}ms",
                  now.since(self.next_housekeeping));
      now.after(period)
    };

    self.perform(now, &mut effects)
  }

  fn stop(&mut self) {
    self.timer.disarm();
    self.deadline = None;

    let dropped = self.retransmits.clear();
    log::debug!("stopping, dropped {} outstanding CON messages", dropped);
  }

  /// Perform effects in the order they were pushed.
  ///
  /// Effects pushed by the engine while this runs
  /// (e.g. from `on_delivery_failed`) are performed too.
  fn perform(&mut self, now: Tick, effects: &mut P::Effects) -> Result<(), Error> {
    while let Some(effect) = effects.remove(0) {
      match effect {
        | Effect::Acked(id) => match self.retransmits.cancel(id) {
          | Some(_) => log::trace!("{:?} acked", id),
          | None => log::trace!("ignoring ack for {:?}, not outstanding", id),
        },
        | Effect::Send(Outbound { id: None, msg }) => transmit(&self.transport, msg.as_bytes()),
        | Effect::Send(Outbound { id: Some(id), msg }) => self.send_con(now, id, msg, effects)?,
      }
    }

    Ok(())
  }

  fn send_con(&mut self,
              now: Tick,
              id: Id,
              msg: Addrd<P::Dgram>,
              effects: &mut P::Effects)
              -> Result<(), Error> {
    let timeout = self.config.con.retry_strategy.initial(&mut self.rand);
    let attempts = self.config.con.max_retransmit;

    match self.retransmits.admit(id, msg, now, timeout, attempts) {
      | Ok(due) => {
        log::trace!("{:?} outstanding, due at {:?}", id, due);
        if let Some(o) = self.retransmits.get(id) {
          transmit(&self.transport, o.msg.as_bytes());
        }
        Ok(())
      },
      | Err(retransmit::Error::DuplicateId(id)) => Err(Error::DuplicateId(id)),
      | Err(retransmit::Error::Full(id)) => {
        log::error!("{} CON messages already outstanding, can't send {:?}",
                    self.retransmits.len(),
                    id);
        self.engine.on_delivery_failed(id, effects);
        Ok(())
      },
    }
  }

  /// Arm the timer for whichever comes first: the earliest
  /// retransmission or the next housekeeping.
  ///
  /// On a tie, retransmissions go first.
  fn rearm(&mut self) {
    let next = match self.retransmits.earliest_due() {
      | Some(due) if !self.next_housekeeping.is_before(due) => Deadline::retransmit_check(due),
      | _ => Deadline::housekeeping(self.next_housekeeping),
    };

    if self.deadline != Some(next) {
      log::trace!("next wakeup: {:?}", next);
      self.timer.arm_at(next);
      self.deadline = Some(next);
    }
  }

  fn period_of(config: &Config) -> crate::time::Millis {
    Milliseconds(config.housekeeping_period.0.max(1))
  }
}
