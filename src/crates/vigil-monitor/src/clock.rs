//! Time source for observation and call timestamps.
//!
//! All timestamps are UTC. With an NTP reference the clock never queries
//! the network again: it stores a pair of timestamps measured at the same
//! instant at startup and extrapolates from the local clock's progress.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy)]
pub struct Clock {
    /// Local and server timestamps taken at the same instant, when
    /// NTP-adjusted time is in use.
    reference: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl Clock {
    /// Machine-local UTC time.
    pub fn local() -> Self {
        Clock { reference: None }
    }

    /// Offset-adjusted time from an NTP reference measured at startup.
    /// `local_reference` and `server_reference` are the local clock and the
    /// latency-adjusted server clock read at the same instant.
    pub fn ntp_adjusted(local_reference: DateTime<Utc>, server_reference: DateTime<Utc>) -> Self {
        Clock {
            reference: Some((local_reference, server_reference)),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        match self.reference {
            Some((local_reference, server_reference)) => {
                server_reference + (Utc::now() - local_reference)
            }
            None => Utc::now(),
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Clock::local()
    }
}
