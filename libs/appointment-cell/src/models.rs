// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveDate};
use std::fmt;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    /// Doctor's staff code (`DR1001`), stored in the `doctor_id` column.
    #[serde(alias = "doctor_id")]
    pub doctor: String,
    #[serde(alias = "patient_id")]
    pub patient: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub status: AppointmentStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "Pending"),
            AppointmentStatus::Completed => write!(f, "Completed"),
            AppointmentStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// The appointment as it would look after a create or update, before it is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentCandidate {
    /// Present when updating; excluded from the overlap search.
    pub id: Option<Uuid>,
    pub doctor: String,
    pub patient: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    /// The change touches no doctor or time field, so scheduling checks are skipped.
    pub status_only: bool,
}

impl AppointmentCandidate {
    pub fn for_existing(appointment: &Appointment) -> Self {
        Self {
            id: Some(appointment.id),
            doctor: appointment.doctor.clone(),
            patient: appointment.patient,
            start_time: appointment.start_time,
            end_time: appointment.end_time,
            status: appointment.status,
            status_only: false,
        }
    }
}

// ==============================================================================
// RELATED RECORDS (read-only here)
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub id: i64,
    pub department_name: String,
    pub fee: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub staff_id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default = "default_available")]
    pub is_available: bool,
    pub department: Option<Department>,
}

fn default_available() -> bool {
    true
}

impl Doctor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationBill {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub amount: f64,
    pub bill_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub paid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewConsultationBill {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub amount: f64,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor: String,
    pub patient: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl BookAppointmentRequest {
    pub fn into_candidate(self) -> AppointmentCandidate {
        AppointmentCandidate {
            id: None,
            doctor: self.doctor,
            patient: self.patient,
            start_time: self.start_time,
            end_time: self.end_time,
            status: AppointmentStatus::Pending,
            status_only: false,
        }
    }
}

/// Full replacement (PUT). Status defaults to the stored one when omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceAppointmentRequest {
    pub doctor: String,
    pub patient: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: Option<AppointmentStatus>,
}

impl From<ReplaceAppointmentRequest> for AppointmentPatch {
    fn from(request: ReplaceAppointmentRequest) -> Self {
        Self {
            doctor: Some(request.doctor),
            patient: Some(request.patient),
            start_time: Some(request.start_time),
            end_time: Some(request.end_time),
            status: request.status,
        }
    }
}

/// Partial update (PATCH).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentPatch {
    pub doctor: Option<String>,
    pub patient: Option<Uuid>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: Option<AppointmentStatus>,
}

impl AppointmentPatch {
    /// True when the patch moves the slot: a different doctor, start or end
    /// than the stored row. Fields resent unchanged do not count.
    pub fn touches_schedule(&self, existing: &Appointment) -> bool {
        self.doctor.as_ref().is_some_and(|d| *d != existing.doctor)
            || self.start_time.is_some_and(|t| t != existing.start_time)
            || self.end_time.is_some_and(|t| t != existing.end_time)
    }

    pub fn apply_to(&self, existing: &Appointment) -> AppointmentCandidate {
        AppointmentCandidate {
            id: Some(existing.id),
            doctor: self.doctor.clone().unwrap_or_else(|| existing.doctor.clone()),
            patient: self.patient.unwrap_or(existing.patient),
            start_time: self.start_time.unwrap_or(existing.start_time),
            end_time: self.end_time.unwrap_or(existing.end_time),
            status: self.status.unwrap_or(existing.status),
            status_only: !self.touches_schedule(existing),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingOutcome {
    pub appointment: Appointment,
    /// `None` when the appointment was stored but the bill could not be.
    pub bill: Option<ConsultationBill>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub doctor_name: Option<String>,
    pub patient_name: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Store-facing list filter; built from the query plus the caller's role scope.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentFilter {
    pub doctor: Option<String>,
    pub doctor_name: Option<String>,
    pub patient_name: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub page: u32,
    pub page_size: u32,
}

impl AppointmentFilter {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentPage {
    pub count: u64,
    pub total_pages: u64,
    pub page: u32,
    pub page_size: u32,
    pub results: Vec<Appointment>,
}

impl AppointmentPage {
    pub fn new(results: Vec<Appointment>, count: u64, page: u32, page_size: u32) -> Self {
        let total_pages = count.div_ceil(u64::from(page_size.max(1)));
        Self { count, total_pages, page, page_size, results }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

/// Why a scheduling request was refused. The variant names are the wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
pub enum RejectionReason {
    #[error("Appointment start time cannot be in the past")]
    StartInPast,

    #[error("Appointment start time is too far in the future")]
    StartTooFarFuture,

    #[error("Appointment end time cannot be in the past")]
    EndInPast,

    #[error("Appointment end time is too far in the future")]
    EndTooFarFuture,

    #[error("Appointment end time must be after the start time")]
    EndBeforeStart,

    #[error("Appointments cannot be booked on weekends")]
    WeekendBooking,

    #[error("Appointments must be within clinic business hours")]
    OutsideBusinessHours,

    #[error("Doctor already has an appointment in this time slot")]
    SlotOverlap,

    #[error("Completed or cancelled appointments cannot change status")]
    TerminalStatusImmutable,
}

impl RejectionReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::StartInPast => "StartInPast",
            RejectionReason::StartTooFarFuture => "StartTooFarFuture",
            RejectionReason::EndInPast => "EndInPast",
            RejectionReason::EndTooFarFuture => "EndTooFarFuture",
            RejectionReason::EndBeforeStart => "EndBeforeStart",
            RejectionReason::WeekendBooking => "WeekendBooking",
            RejectionReason::OutsideBusinessHours => "OutsideBusinessHours",
            RejectionReason::SlotOverlap => "SlotOverlap",
            RejectionReason::TerminalStatusImmutable => "TerminalStatusImmutable",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Doctor is not accepting appointments")]
    DoctorNotAvailable,

    #[error("{0}")]
    Rejected(#[from] RejectionReason),

    /// The store refused the write because a conflicting booking was committed first.
    #[error("Appointment slot was booked concurrently; please choose another time")]
    ConcurrentConflict,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn stored() -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            doctor: "DR1001".to_string(),
            patient: Uuid::new_v4(),
            start_time: Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 6, 2, 10, 30, 0).unwrap(),
            status: AppointmentStatus::Pending,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_appointment_reads_store_columns() {
        let row = json!({
            "id": "8a1c0d5e-4a5b-4f0e-9a36-1f2f6a7b8c9d",
            "doctor_id": "DR1001",
            "patient_id": "2b7e8c1a-0d3f-4c55-8e2a-6f9d0b1c2e3f",
            "start_time": "2025-06-02T10:00:00Z",
            "end_time": "2025-06-02T10:30:00Z",
            "status": "Pending",
            "created_at": null,
            "updated_at": null,
            "doctor_info": {"first_name": "Test", "last_name": "Doctor"}
        });

        let appointment: Appointment = serde_json::from_value(row).unwrap();
        assert_eq!(appointment.doctor, "DR1001");
        assert_eq!(appointment.status, AppointmentStatus::Pending);
    }

    #[test]
    fn test_status_only_patch() {
        let existing = stored();
        let patch = AppointmentPatch {
            status: Some(AppointmentStatus::Completed),
            ..Default::default()
        };
        let candidate = patch.apply_to(&existing);
        assert!(candidate.status_only);
        assert_eq!(candidate.status, AppointmentStatus::Completed);
        assert_eq!(candidate.start_time, existing.start_time);
        assert_eq!(candidate.id, Some(existing.id));
    }

    #[test]
    fn test_time_patch_is_not_status_only() {
        let existing = stored();
        let patch = AppointmentPatch {
            end_time: Some(existing.end_time + chrono::Duration::minutes(15)),
            ..Default::default()
        };
        assert!(!patch.apply_to(&existing).status_only);
    }

    #[test]
    fn test_resent_schedule_fields_are_status_only() {
        let existing = stored();
        let patch: AppointmentPatch = ReplaceAppointmentRequest {
            doctor: existing.doctor.clone(),
            patient: existing.patient,
            start_time: existing.start_time,
            end_time: existing.end_time,
            status: Some(AppointmentStatus::Cancelled),
        }
        .into();

        let candidate = patch.apply_to(&existing);
        assert!(candidate.status_only);
        assert_eq!(candidate.status, AppointmentStatus::Cancelled);

        let moved = AppointmentPatch {
            doctor: Some("DR2002".to_string()),
            ..patch
        };
        assert!(!moved.apply_to(&existing).status_only);
    }

    #[test]
    fn test_rejection_reason_wire_code() {
        assert_eq!(serde_json::to_value(RejectionReason::SlotOverlap).unwrap(), json!("SlotOverlap"));
        assert_eq!(RejectionReason::TerminalStatusImmutable.code(), "TerminalStatusImmutable");
    }

    #[test]
    fn test_page_math() {
        let page = AppointmentPage::new(vec![], 21, 1, 10);
        assert_eq!(page.total_pages, 3);
        let empty = AppointmentPage::new(vec![], 0, 1, 10);
        assert_eq!(empty.total_pages, 0);

        let filter = AppointmentFilter {
            doctor: None,
            doctor_name: None,
            patient_name: None,
            status: None,
            from: None,
            until: None,
            page: 3,
            page_size: 10,
        };
        assert_eq!(filter.offset(), 20);
    }
}
