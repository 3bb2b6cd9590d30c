// libs/appointment-cell/src/services/policy.rs
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc, Weekday};
use tracing::warn;

use shared_config::{clamp_horizon, AppConfig};

use crate::models::RejectionReason;

/// Weekday opening window, `[opens_at, closes_at)` for the start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessHours {
    pub opens_at: NaiveTime,
    pub closes_at: NaiveTime,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            opens_at: NaiveTime::from_hms_opt(10, 0, 0).unwrap_or(NaiveTime::MIN),
            closes_at: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingPolicy {
    /// How far past `now` start and end may lie.
    pub booking_horizon: Duration,
    /// `None` disables the weekday and business-hour rule.
    pub business_hours: Option<BusinessHours>,
    /// Calendar dates and clock times are read in this offset.
    pub clinic_offset: FixedOffset,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            booking_horizon: Duration::days(3),
            business_hours: None,
            clinic_offset: utc_offset(),
        }
    }
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

impl SchedulingPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        let clinic_offset = config.clinic_utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                warn!(
                    "CLINIC_UTC_OFFSET_MINUTES={} is out of range, using UTC",
                    config.clinic_utc_offset_minutes
                );
                utc_offset()
            });

        Self {
            booking_horizon: Duration::days(clamp_horizon(config.booking_horizon_days)),
            business_hours: config.enforce_business_hours.then(BusinessHours::default),
            clinic_offset,
        }
    }

    pub fn with_business_hours(mut self, hours: BusinessHours) -> Self {
        self.business_hours = Some(hours);
        self
    }

    pub fn clinic_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.clinic_offset).date_naive()
    }

    /// UTC bounds `[start, end)` of a clinic calendar day.
    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let offset = Duration::seconds(i64::from(self.clinic_offset.local_minus_utc()));
        let start = (date.and_time(NaiveTime::MIN) - offset).and_utc();
        (start, start + Duration::days(1))
    }

    pub fn check_business_hours(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<(), RejectionReason> {
        let Some(hours) = self.business_hours else {
            return Ok(());
        };

        let local_start = start_time.with_timezone(&self.clinic_offset);
        let local_end = end_time.with_timezone(&self.clinic_offset);

        if matches!(local_start.weekday(), Weekday::Sat | Weekday::Sun) {
            return Err(RejectionReason::WeekendBooking);
        }

        let start_clock = local_start.time();
        if start_clock < hours.opens_at || start_clock >= hours.closes_at {
            return Err(RejectionReason::OutsideBusinessHours);
        }

        if local_end.date_naive() != local_start.date_naive() || local_end.time() > hours.closes_at {
            return Err(RejectionReason::OutsideBusinessHours);
        }

        Ok(())
    }
}
