//! `toad-sched` is the message-dispatch & retransmission-scheduling loop
//! for CoAP runtimes that live on constrained devices.
//!
//! ## What it does
//! CoAP sits on top of an unreliable datagram transport (usually UDP),
//! so any message sent as **Confirmable** must be retransmitted with an
//! exponential back-off until the peer acknowledges it (or we give up).
//!
//! On top of that a CoAP server has periodic maintenance to do
//! (e.g. sweeping resources for changes to notify observers about).
//!
//! `toad-sched` owns both of these concerns and nothing else:
//! - a bounded [mailbox](crate::queue) that the network receive path and
//!   the [timer](crate::timer) post [`Event`](crate::event::Event)s into
//! - a [set of outstanding confirmable messages](crate::retransmit::RetransmitSet)
//!   ordered by the time they are next due
//! - the [`Scheduler`](crate::sched::Scheduler), a single-threaded event loop
//!   that drains the mailbox, drives retransmissions, and rearms one timer
//!   for whatever needs to happen next
//!
//! Decoding datagrams, producing responses and matching acknowledgements
//! is the job of an [`Engine`](crate::engine::Engine) that you provide.
//!
//! ## Time
//! Time is measured in [`Tick`](crate::time::Tick)s of 1 millisecond stored
//! in a `u32`. Ticks wrap after ~49 days, so they are only ever compared by
//! their signed distance (see [`Tick::since`](crate::time::Tick::since)).
//!
//! ## Platforms
//! Everything works without `std` or `alloc`; collections are abstracted
//! with [`toad_array::Array`] so that `tinyvec::ArrayVec` can be used in
//! place of `Vec`. See [`platform`].

// x-release-please-version
#![doc(html_root_url = "https://docs.rs/toad-sched/0.1.0")]
// x-release-please-end
#![cfg_attr(any(docsrs, feature = "docs"), feature(doc_cfg))]
// -
// style
#![allow(clippy::unused_unit)]
// -
// deny
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(missing_copy_implementations)]
#![cfg_attr(not(test), deny(unsafe_code))]
// -
// warnings
#![cfg_attr(not(test), warn(unreachable_pub))]
// -
// features
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc as std_alloc;

#[cfg(test)]
pub(crate) mod test;

pub(crate) mod logging;

/// time abstractions
pub mod time;

/// retransmission timeouts & back-off
pub mod retry;

/// configuring runtime behavior
pub mod config;

/// network abstractions
pub mod net;

/// events consumed by the scheduler
pub mod event;

/// the bounded mailbox between producers and the scheduler
pub mod queue;

/// confirmable messages awaiting acknowledgement
pub mod retransmit;

/// single-shot wake-ups
pub mod timer;

/// the protocol logic driven by the scheduler
pub mod engine;

/// platform configuration
pub mod platform;

/// # The event loop
///
/// A [`Scheduler`](sched::Scheduler) is constructed once with all of its
/// collaborators injected, and then driven either by
/// [`run`](sched::Scheduler::run) (blocks until a
/// [`Stop`](event::Event::Stop) event is received) or by repeatedly calling
/// [`step`](sched::Scheduler::step) from a superloop.
///
/// Every iteration handles exactly one event, and only once the event has
/// been fully handled is the next wake-up computed:
///
/// ```text
/// min(earliest retransmission due, next housekeeping boundary)
/// ```
pub mod sched;

/// `std`-only runtime pieces
#[cfg(feature = "std")]
#[cfg_attr(docsrs, doc(cfg(feature = "std")))]
pub mod std;

pub use sched::Scheduler;
