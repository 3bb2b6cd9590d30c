// libs/appointment-cell/src/services/validator.rs
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentCandidate, AppointmentError, AppointmentStatus, RejectionReason,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::policy::SchedulingPolicy;
use crate::services::store::AppointmentStore;

/// Result of the store-independent checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleCheck {
    /// Nothing left to check (status-only change, or the candidate is not Pending).
    Settled,
    /// The candidate must still be compared against the doctor's booked slots.
    NeedsOverlapCheck,
}

/// Decides whether a create or update is admissible. Checks run in a fixed
/// order and the first failure is the reported reason.
#[derive(Debug, Clone, Default)]
pub struct AppointmentValidator {
    policy: SchedulingPolicy,
    lifecycle: AppointmentLifecycleService,
}

impl AppointmentValidator {
    pub fn new(policy: SchedulingPolicy) -> Self {
        Self {
            policy,
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    pub fn policy(&self) -> &SchedulingPolicy {
        &self.policy
    }

    /// Full validation: the pure checks followed by one query for the doctor's
    /// Pending appointments on the candidate's calendar date.
    pub async fn validate(
        &self,
        candidate: &AppointmentCandidate,
        existing: Option<&Appointment>,
        now: DateTime<Utc>,
        store: &dyn AppointmentStore,
    ) -> Result<(), AppointmentError> {
        if self.check(candidate, existing, now)? == ScheduleCheck::Settled {
            return Ok(());
        }

        let exclude_id = existing.map(|e| e.id).or(candidate.id);
        let (from, until) = self.policy.day_bounds(self.policy.clinic_date(candidate.start_time));

        let booked = store
            .pending_for_doctor_on(&candidate.doctor, from, until, exclude_id)
            .await?;

        self.check_overlap(candidate, exclude_id, &booked)?;
        Ok(())
    }

    pub fn check(
        &self,
        candidate: &AppointmentCandidate,
        existing: Option<&Appointment>,
        now: DateTime<Utc>,
    ) -> Result<ScheduleCheck, RejectionReason> {
        if let Some(existing) = existing {
            self.lifecycle.validate_status_transition(existing.status, candidate.status)?;
        }

        if candidate.status_only {
            debug!("Status-only change for appointment {:?}, skipping slot validation", candidate.id);
            return Ok(ScheduleCheck::Settled);
        }

        let horizon = now
            .checked_add_signed(self.policy.booking_horizon)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        if candidate.start_time < now {
            return Err(RejectionReason::StartInPast);
        }
        if candidate.start_time > horizon {
            return Err(RejectionReason::StartTooFarFuture);
        }
        if candidate.end_time < now {
            return Err(RejectionReason::EndInPast);
        }
        if candidate.end_time > horizon {
            return Err(RejectionReason::EndTooFarFuture);
        }
        if candidate.end_time <= candidate.start_time {
            return Err(RejectionReason::EndBeforeStart);
        }

        self.policy.check_business_hours(candidate.start_time, candidate.end_time)?;

        // Only Pending bookings hold a slot.
        if candidate.status != AppointmentStatus::Pending {
            return Ok(ScheduleCheck::Settled);
        }

        Ok(ScheduleCheck::NeedsOverlapCheck)
    }

    /// Inclusive interval test against the same doctor's Pending appointments
    /// starting on the candidate's calendar date. Rows outside that scope are ignored.
    pub fn check_overlap(
        &self,
        candidate: &AppointmentCandidate,
        exclude_id: Option<Uuid>,
        booked: &[Appointment],
    ) -> Result<(), RejectionReason> {
        let date = self.policy.clinic_date(candidate.start_time);

        let conflict = booked.iter()
            .filter(|apt| apt.doctor == candidate.doctor)
            .filter(|apt| apt.status == AppointmentStatus::Pending)
            .filter(|apt| Some(apt.id) != exclude_id)
            .filter(|apt| self.policy.clinic_date(apt.start_time) == date)
            .find(|apt| apt.end_time >= candidate.start_time && apt.start_time <= candidate.end_time);

        if let Some(apt) = conflict {
            warn!(
                "Slot overlap for doctor {}: requested {} - {}, booked {} ({} - {})",
                candidate.doctor, candidate.start_time, candidate.end_time,
                apt.id, apt.start_time, apt.end_time
            );
            return Err(RejectionReason::SlotOverlap);
        }

        Ok(())
    }
}
