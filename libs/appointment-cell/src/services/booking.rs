// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{
    Appointment, AppointmentError, AppointmentFilter, AppointmentPage, AppointmentPatch,
    BookAppointmentRequest, BookingOutcome, Doctor, ReplaceAppointmentRequest,
};
use crate::services::billing::ConsultationBillService;
use crate::services::policy::SchedulingPolicy;
use crate::services::store::{AppointmentStore, SupabaseAppointmentStore};
use crate::services::validator::AppointmentValidator;

pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    validator: AppointmentValidator,
    billing: ConsultationBillService,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig, auth_token: &str) -> Self {
        Self::with_store(
            Arc::new(SupabaseAppointmentStore::new(config, auth_token)),
            SchedulingPolicy::from_config(config),
            config.default_consultation_fee,
        )
    }

    pub fn with_store(store: Arc<dyn AppointmentStore>, policy: SchedulingPolicy, default_fee: f64) -> Self {
        Self {
            store,
            validator: AppointmentValidator::new(policy),
            billing: ConsultationBillService::new(default_fee),
        }
    }

    pub fn validator(&self) -> &AppointmentValidator {
        &self.validator
    }

    /// Validate and persist a new Pending appointment, then bill it.
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
        now: DateTime<Utc>,
    ) -> Result<BookingOutcome, AppointmentError> {
        info!("Booking appointment for patient {} with doctor {}", request.patient, request.doctor);

        let doctor = self.available_doctor(&request.doctor).await?;
        self.ensure_patient(request.patient).await?;

        let candidate = request.into_candidate();
        if let Err(e) = self.validator.validate(&candidate, None, now, self.store.as_ref()).await {
            warn!("Rejected booking for doctor {}: {}", candidate.doctor, e);
            return Err(e);
        }

        let appointment = self.store.insert_appointment(&candidate).await.inspect_err(|e| {
            if matches!(e, AppointmentError::ConcurrentConflict) {
                warn!("Slot for doctor {} was taken by a concurrent booking", candidate.doctor);
            }
        })?;

        info!(
            "Appointment {} booked: doctor {} from {} to {}",
            appointment.id, appointment.doctor, appointment.start_time, appointment.end_time
        );

        let bill = match self.billing.create_for(&appointment, &doctor, self.store.as_ref()).await {
            Ok(bill) => Some(bill),
            Err(e) => {
                error!("Appointment {} booked but billing failed: {}", appointment.id, e);
                None
            },
        };

        Ok(BookingOutcome { appointment, bill })
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment {}", appointment_id);
        self.store.get_appointment(appointment_id).await
    }

    /// Apply a partial update, re-validating against the stored record.
    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        patch: AppointmentPatch,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let existing = self.store.get_appointment(appointment_id).await?;
        self.apply_update(existing, patch, now).await
    }

    /// Full replacement through the same validation path as a partial update.
    pub async fn replace_appointment(
        &self,
        appointment_id: Uuid,
        request: ReplaceAppointmentRequest,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        self.update_appointment(appointment_id, request.into(), now).await
    }

    /// Same as `update_appointment` when the caller already loaded the record.
    pub async fn apply_update(
        &self,
        existing: Appointment,
        patch: AppointmentPatch,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Updating appointment {} with {:?}", existing.id, patch);

        if let Some(doctor) = patch.doctor.as_deref().filter(|d| *d != existing.doctor) {
            self.available_doctor(doctor).await?;
        }
        if let Some(patient) = patch.patient.filter(|p| *p != existing.patient) {
            self.ensure_patient(patient).await?;
        }

        let candidate = patch.apply_to(&existing);
        if let Err(e) = self.validator.validate(&candidate, Some(&existing), now, self.store.as_ref()).await {
            warn!("Rejected update of appointment {}: {}", existing.id, e);
            return Err(e);
        }

        let updated = self.store.update_appointment(existing.id, &candidate).await?;

        info!("Appointment {} updated ({} -> {})", updated.id, existing.status, updated.status);
        Ok(updated)
    }

    pub async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<AppointmentPage, AppointmentError> {
        debug!("Listing appointments with {:?}", filter);
        self.store.list_appointments(filter).await
    }

    async fn available_doctor(&self, staff_code: &str) -> Result<Doctor, AppointmentError> {
        let doctor = self.store
            .find_doctor(staff_code)
            .await?
            .ok_or(AppointmentError::DoctorNotFound)?;

        if !doctor.is_available {
            warn!("Doctor {} is not accepting appointments", staff_code);
            return Err(AppointmentError::DoctorNotAvailable);
        }

        Ok(doctor)
    }

    async fn ensure_patient(&self, patient_id: Uuid) -> Result<(), AppointmentError> {
        if self.store.patient_exists(patient_id).await? {
            Ok(())
        } else {
            Err(AppointmentError::PatientNotFound)
        }
    }
}
