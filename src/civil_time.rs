//! Wall-clock timekeeping anchored to the monotonic tick clock.

use derive_more::derive::{Display, Error};
use time::{OffsetDateTime, UtcOffset};

use crate::error::Result;

/// Units-safe wrapper for Unix timestamps (seconds since 1970-01-01 UTC).
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UnixSeconds(pub i64);

impl UnixSeconds {
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }

    /// Convert an NTP timestamp (seconds since 1900-01-01) to Unix seconds.
    /// Pre-1970 values are rejected.
    #[must_use]
    pub const fn from_ntp_seconds(ntp: u32) -> Option<Self> {
        const NTP_TO_UNIX_SECONDS: i64 = 2_208_988_800;
        let seconds = (ntp as i64).wrapping_sub(NTP_TO_UNIX_SECONDS);
        if seconds >= 0 { Some(Self(seconds)) } else { None }
    }
}

/// Why a time-sync attempt produced no usable time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncError {
    /// The server answered, but the derived calendar date is implausible.
    #[display("time sync returned an invalid date")]
    InvalidDate,
    /// The bounded sync window expired without a valid answer.
    #[display("time sync timed out")]
    Timeout,
}

/// Network time source. `sync` blocks for at most `timeout`.
#[expect(async_fn_in_trait, reason = "single-threaded executor")]
pub trait TimeSyncService {
    async fn sync(
        &mut self,
        timeout: embassy_time::Duration,
    ) -> Result<UnixSeconds, SyncError>;
}

/// Calendar time for the display, derived once per tick while connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CivilTime {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// False until a sync has produced a plausible date (year > 2016).
    pub year_valid: bool,
}

impl CivilTime {
    /// The zero time shown before the first successful sync.
    #[must_use]
    pub const fn unset() -> Self {
        Self {
            hour: 0,
            minute: 0,
            second: 0,
            year_valid: false,
        }
    }
}

/// Wall clock built from the last successful sync plus monotonic elapsed
/// time, displayed at a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    utc_offset_minutes: i32,
    sync_point: Option<SyncPoint>,
}

#[derive(Debug, Clone, Copy)]
struct SyncPoint {
    unix: UnixSeconds,
    at_ms: u64,
}

impl WallClock {
    #[must_use]
    pub const fn new(utc_offset_minutes: i32) -> Self {
        Self {
            utc_offset_minutes,
            sync_point: None,
        }
    }

    #[must_use]
    pub const fn is_synced(&self) -> bool {
        self.sync_point.is_some()
    }

    /// Anchor the clock to a freshly synced timestamp.
    pub fn mark_synced(&mut self, unix: UnixSeconds, now_ms: u64) {
        self.sync_point = Some(SyncPoint { unix, at_ms: now_ms });
    }

    /// Current civil time. Returns the zero time until the first sync.
    #[must_use]
    pub fn civil_time(&self, now_ms: u64) -> CivilTime {
        let Some(sync_point) = self.sync_point else {
            return CivilTime::unset();
        };
        let elapsed_secs = now_ms.saturating_sub(sync_point.at_ms) / 1000;
        #[expect(
            clippy::cast_possible_wrap,
            reason = "elapsed seconds since boot fit i64 for centuries"
        )]
        let unix = sync_point.unix.as_i64().saturating_add(elapsed_secs as i64);
        let offset_seconds = self.utc_offset_minutes.saturating_mul(60);
        let offset = UtcOffset::from_whole_seconds(offset_seconds).unwrap_or(UtcOffset::UTC);
        let Ok(datetime) = OffsetDateTime::from_unix_timestamp(unix) else {
            return CivilTime::unset();
        };
        let local = datetime.to_offset(offset);
        CivilTime {
            hour: local.hour(),
            minute: local.minute(),
            second: local.second(),
            year_valid: local.year() > 2016,
        }
    }
}
