//! Time sources used to stamp forwarded entries.

use chrono::Utc;

/// Source of the entry timestamp, in whole seconds since the Unix epoch.
pub trait Clock: Send {
    fn now(&self) -> u32;
}

/// Wall clock backed by the system time.
///
/// Times before the epoch read as 0 and times past 2106 saturate at
/// `u32::MAX`, the range of the forward protocol's 32-bit timestamp.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u32 {
        let secs = Utc::now().timestamp();
        u32::try_from(secs.max(0)).unwrap_or(u32::MAX)
    }
}

impl<F> Clock for F
where
    F: Fn() -> u32 + Send,
{
    fn now(&self) -> u32 {
        self()
    }
}
