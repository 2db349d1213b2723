use core::cmp::Ordering;

use embedded_time::duration::Milliseconds;
use toad_array::Array;
use toad_len::Len;
use toad_msg::Id;

use crate::net::{Addrd, UNSPECIFIED};
use crate::platform::PlatformTypes;
use crate::retry::Attempts;
use crate::time::{Millis, Tick};

/// A confirmable message awaiting acknowledgement
pub struct Outstanding<P: PlatformTypes> {
  /// Unique among all outstanding messages
  pub id: Id,
  /// The bytes that were sent (and will be sent again, verbatim)
  /// and the endpoint they were sent to
  pub msg: Addrd<P::Dgram>,
  /// When the message should next be retransmitted (or given up on)
  pub due: Tick,
  /// The timeout that was waited to arrive at `due`
  pub timeout: Millis,
  /// Retransmissions left before the message is given up on
  pub attempts_left: Attempts,
  // admission order, breaks ties between equal `due`s
  seq: u64,
}

impl<P: PlatformTypes> Outstanding<P> {
  /// Should this entry be handled before `other`?
  fn precedes(&self, other: &Self) -> bool {
    match self.due.cmp_wrapping(&other.due) {
      | Ordering::Less => true,
      | Ordering::Greater => false,
      | Ordering::Equal => self.seq < other.seq,
    }
  }
}

impl<P: PlatformTypes> Clone for Outstanding<P> {
  fn clone(&self) -> Self {
    Self { id: self.id,
           msg: self.msg.clone(),
           due: self.due,
           timeout: self.timeout,
           attempts_left: self.attempts_left,
           seq: self.seq }
  }
}

impl<P: PlatformTypes> core::fmt::Debug for Outstanding<P> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Outstanding")
     .field("id", &self.id)
     .field("msg", &self.msg)
     .field("due", &self.due)
     .field("timeout", &self.timeout)
     .field("attempts_left", &self.attempts_left)
     .finish()
  }
}

impl<P: PlatformTypes> PartialEq for Outstanding<P> {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
    && self.msg == other.msg
    && self.due == other.due
    && self.timeout == other.timeout
    && self.attempts_left == other.attempts_left
  }
}

/// Only here so that `Outstanding`s can be stored in heapless collections.
impl<P: PlatformTypes> Default for Outstanding<P> {
  fn default() -> Self {
    Self { id: Id(0),
           msg: Addrd(P::Dgram::default(), UNSPECIFIED),
           due: Tick::default(),
           timeout: Milliseconds(0),
           attempts_left: Attempts::default(),
           seq: 0 }
  }
}

/// Errors that can be encountered when adding to a [`RetransmitSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
  /// A message with this id is already outstanding.
  ///
  /// Message ids are provisioned by the [`Engine`](crate::engine::Engine),
  /// so this means the engine broke its contract.
  DuplicateId(Id),
  /// Storing this message would exceed the hard capacity of
  /// [`PlatformTypes::Retransmits`].
  ///
  /// Only applicable to heapless collections.
  Full(Id),
}

impl core::fmt::Display for Error {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      | Error::DuplicateId(Id(id)) => write!(f, "message {} is already outstanding", id),
      | Error::Full(Id(id)) => write!(f, "no room to track message {}", id),
    }
  }
}

/// Confirmable messages awaiting acknowledgement, ordered by the
/// time they are next due.
///
/// This is a binary min-heap keyed by `(due, admission order)`, stored
/// in a [`PlatformTypes::Retransmits`] so that it works with or without
/// a memory allocator:
///
/// | operation                          | cost     |
/// | ---------------------------------- | -------- |
/// | [`peek`](RetransmitSet::peek)      | O(1)     |
/// | [`pop_due`](RetransmitSet::pop_due)| O(log n) |
/// | [`admit`](RetransmitSet::admit)    | O(n)     |
/// | [`cancel`](RetransmitSet::cancel)  | O(n)     |
///
/// (`admit` and `cancel` are linear because of the search by id.)
///
/// # Invariants
/// - at most one entry per [`Id`]
/// - entries that share a due time are popped in the order they were admitted
/// - all due times are less than `2^31` ticks apart; see [`Tick`]
pub struct RetransmitSet<P: PlatformTypes> {
  heap: P::Retransmits,
  seq: u64,
}

impl<P: PlatformTypes> Default for RetransmitSet<P> {
  fn default() -> Self {
    Self { heap: Default::default(),
           seq: 0 }
  }
}

impl<P: PlatformTypes> core::fmt::Debug for RetransmitSet<P> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_list().entries(self.heap.iter()).finish()
  }
}

impl<P: PlatformTypes> RetransmitSet<P> {
  /// Create an empty set
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of outstanding messages
  pub fn len(&self) -> usize {
    self.heap.len()
  }

  /// Are there no outstanding messages?
  pub fn is_empty(&self) -> bool {
    self.heap.len() == 0
  }

  /// Is the backing collection at capacity?
  pub fn is_full(&self) -> bool {
    self.heap.is_full()
  }

  /// Is a message with this id outstanding?
  pub fn contains(&self, id: Id) -> bool {
    self.position(id).is_some()
  }

  /// Get the outstanding message with this id
  pub fn get(&self, id: Id) -> Option<&Outstanding<P>> {
    self.position(id).map(|ix| &self.heap[ix])
  }

  /// Iterate over the outstanding messages, in no particular order
  pub fn iter(&self) -> impl Iterator<Item = &Outstanding<P>> {
    self.heap.iter()
  }

  /// The message that will be due first
  pub fn peek(&self) -> Option<&Outstanding<P>> {
    self.heap.first()
  }

  /// When the next message will be due, if any are outstanding
  pub fn earliest_due(&self) -> Option<Tick> {
    self.peek().map(|o| o.due)
  }

  /// Start tracking a confirmable message sent at `now`, due
  /// after `timeout` with `attempts` retransmissions left.
  ///
  /// Yields the tick it is due at.
  pub fn admit(&mut self,
               id: Id,
               msg: Addrd<P::Dgram>,
               now: Tick,
               timeout: Millis,
               attempts: Attempts)
               -> Result<Tick, Error> {
    if self.contains(id) {
      return Err(Error::DuplicateId(id));
    }

    if self.heap.is_full() {
      return Err(Error::Full(id));
    }

    let seq = self.seq;
    self.seq = self.seq.wrapping_add(1);

    let due = now.after(timeout);
    self.push(Outstanding { id,
                            msg,
                            due,
                            timeout,
                            attempts_left: attempts,
                            seq });
    Ok(due)
  }

  /// Remove & yield the earliest message if it is due at `now`.
  ///
  /// Call repeatedly to drain every due message in order.
  pub fn pop_due(&mut self, now: Tick) -> Option<Outstanding<P>> {
    match self.earliest_due() {
      | Some(due) if due.has_elapsed(now) => self.remove_at(0),
      | _ => None,
    }
  }

  /// Put a message that was popped with [`RetransmitSet::pop_due`]
  /// back, after its `due` has been advanced.
  ///
  /// The message keeps its original admission order.
  pub fn reinsert(&mut self, msg: Outstanding<P>) -> Result<(), Error> {
    if self.contains(msg.id) {
      Err(Error::DuplicateId(msg.id))
    } else if self.heap.is_full() {
      Err(Error::Full(msg.id))
    } else {
      self.push(msg);
      Ok(())
    }
  }

  /// Stop tracking the message with this id, wherever it is in the set.
  ///
  /// Yields `None` if it was not outstanding.
  pub fn cancel(&mut self, id: Id) -> Option<Outstanding<P>> {
    self.position(id).and_then(|ix| self.remove_at(ix))
  }

  /// Drop every outstanding message, yielding how many there were
  pub fn clear(&mut self) -> usize {
    let n = self.heap.len();
    self.heap = Default::default();
    n
  }

  fn position(&self, id: Id) -> Option<usize> {
    self.heap.iter().position(|o| o.id == id)
  }

  fn push(&mut self, o: Outstanding<P>) {
    self.heap.push(o);
    self.sift_up(self.heap.len() - 1);
  }

  fn remove_at(&mut self, ix: usize) -> Option<Outstanding<P>> {
    let last = self.heap.len().checked_sub(1)?;
    self.heap.swap(ix, last);
    let removed = self.heap.remove(last);

    if ix < last {
      let ix = self.sift_up(ix);
      self.sift_down(ix);
    }

    debug_assert!(self.is_heap());
    removed
  }

  /// Move the entry at `ix` towards the root until its parent precedes it,
  /// yielding where it ended up.
  fn sift_up(&mut self, mut ix: usize) -> usize {
    while ix > 0 {
      let parent = (ix - 1) / 2;
      if self.heap[ix].precedes(&self.heap[parent]) {
        self.heap.swap(ix, parent);
        ix = parent;
      } else {
        break;
      }
    }

    ix
  }

  fn sift_down(&mut self, mut ix: usize) {
    let len = self.heap.len();

    loop {
      let (l, r) = (2 * ix + 1, 2 * ix + 2);
      let mut first = ix;

      if l < len && self.heap[l].precedes(&self.heap[first]) {
        first = l;
      }

      if r < len && self.heap[r].precedes(&self.heap[first]) {
        first = r;
      }

      if first == ix {
        break;
      }

      self.heap.swap(ix, first);
      ix = first;
    }
  }

  fn is_heap(&self) -> bool {
    (1..self.heap.len()).all(|ix| !self.heap[ix].precedes(&self.heap[(ix - 1) / 2]))
  }
}
