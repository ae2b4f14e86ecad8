use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};

use crate::{CoreError, CoreResult};

/// Wall clock of the deployment's reference time zone.
///
/// Booking rules compare against "today" as seen in this zone, not in the
/// zone of whichever machine happens to run the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceClock {
    offset: FixedOffset,
}

impl ReferenceClock {
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    pub fn from_offset_minutes(minutes: i32) -> CoreResult<Self> {
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(CoreError::InvalidOffset(minutes))?;
        Ok(Self { offset })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn now(&self) -> NaiveDateTime {
        self.local(Utc::now())
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }

    /// Wall-clock time in the reference zone at `instant`.
    pub fn local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.offset).naive_local()
    }
}

impl Default for ReferenceClock {
    fn default() -> Self {
        Self::utc()
    }
}
