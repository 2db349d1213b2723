use embedded_time::duration::Milliseconds;

use crate::retry::{Attempts, Strategy};
use crate::time::Millis;

/// Configuration options related to retransmitting outbound CON messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Con {
  /// Retry strategy for CON messages that have not yet been ACKed.
  ///
  /// Defaults to the timings recommended by RFC7252
  /// (`ACK_TIMEOUT` of 2 seconds, `ACK_RANDOM_FACTOR` of 1.5),
  /// doubling after each retransmission up to 64 seconds:
  /// ```
  /// use embedded_time::duration::Milliseconds;
  /// use toad_sched::config::Con;
  /// use toad_sched::retry::Strategy;
  ///
  /// assert_eq!(Con::default().retry_strategy,
  ///            Strategy { init_min: Milliseconds(2_000),
  ///                       init_max: Milliseconds(3_000),
  ///                       backoff_factor: 2,
  ///                       cap: Milliseconds(64_000) });
  /// ```
  pub retry_strategy: Strategy,
  /// Number of times we are allowed to resend a CON message
  /// before giving up on it.
  ///
  /// Defaults to 4 retransmissions.
  /// ```
  /// use toad_sched::config::Con;
  /// use toad_sched::retry::Attempts;
  ///
  /// assert_eq!(Con::default().max_retransmit, Attempts(4));
  /// ```
  pub max_retransmit: Attempts,
}

impl Default for Con {
  fn default() -> Self {
    Con { retry_strategy: Strategy { init_min: Milliseconds(2_000),
                                     init_max: Milliseconds(3_000),
                                     backoff_factor: 2,
                                     cap: Milliseconds(64_000) },
          max_retransmit: Attempts(4) }
  }
}

/// Runtime config
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Config {
  /// See [`Con`]
  pub con: Con,

  /// How often the [`Engine`](crate::engine::Engine) gets to perform
  /// periodic maintenance (e.g. checking resources for changes)
  ///
  /// Defaults to 2 seconds.
  ///
  /// ```
  /// use embedded_time::duration::Milliseconds;
  /// use toad_sched::config::Config;
  ///
  /// assert_eq!(Config::default().housekeeping_period, Milliseconds(2_000u32));
  /// ```
  pub housekeeping_period: Millis,

  /// Maximum number of events that may be waiting in the mailbox.
  ///
  /// Bounds [`Mailbox::from_config`](crate::queue::Mailbox::from_config)
  /// and sizes [`crate::std::channel`]. A mailbox over a fixed-capacity
  /// collection holds no more than that collection does.
  ///
  /// Defaults to 8.
  ///
  /// ```
  /// use toad_sched::config::Config;
  ///
  /// assert_eq!(Config::default().queue_capacity, 8);
  /// ```
  pub queue_capacity: usize,

  /// Seed mixed with the clock to randomize initial retransmission timeouts.
  ///
  /// The default value is 0, but this should be set
  /// to something distinct per device (random integer, machine identifier)
  /// so that a fleet of devices booted at the same moment don't retransmit in lockstep.
  ///
  /// ```
  /// use toad_sched::config::Config;
  ///
  /// assert_eq!(Config::default().jitter_seed, 0);
  /// ```
  pub jitter_seed: u64,
}

impl Default for Config {
  fn default() -> Self {
    Config { con: Con::default(),
             housekeeping_period: Milliseconds(2_000),
             queue_capacity: 8,
             jitter_seed: 0 }
  }
}

impl Config {
  /// Longest a CON message can remain outstanding before the
  /// [`Engine`](crate::engine::Engine) is told it could not be delivered.
  ///
  /// With the default config this is RFC7252's `MAX_TRANSMIT_WAIT`:
  /// ```
  /// use embedded_time::duration::Milliseconds;
  /// use toad_sched::config::Config;
  ///
  /// assert_eq!(Config::default().max_transmit_wait(), Milliseconds(93_000u32));
  /// ```
  pub fn max_transmit_wait(&self) -> Millis {
    self.con.retry_strategy.max_time(self.con.max_retransmit)
  }
}
