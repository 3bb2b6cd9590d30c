// libs/appointment-cell/src/services/billing.rs
use tracing::{debug, info};

use crate::models::{Appointment, AppointmentError, ConsultationBill, Doctor, NewConsultationBill};
use crate::services::store::AppointmentStore;

pub const DEFAULT_CONSULTATION_FEE: f64 = 500.00;

/// Creates the single consultation bill attached to a booked appointment.
#[derive(Debug, Clone, Copy)]
pub struct ConsultationBillService {
    default_fee: f64,
}

impl Default for ConsultationBillService {
    fn default() -> Self {
        Self::new(DEFAULT_CONSULTATION_FEE)
    }
}

impl ConsultationBillService {
    pub fn new(default_fee: f64) -> Self {
        Self { default_fee }
    }

    /// Department fee when the doctor's department defines one.
    pub fn fee_for(&self, doctor: &Doctor) -> f64 {
        doctor.department
            .as_ref()
            .and_then(|department| department.fee)
            .unwrap_or(self.default_fee)
    }

    pub async fn create_for(
        &self,
        appointment: &Appointment,
        doctor: &Doctor,
        store: &dyn AppointmentStore,
    ) -> Result<ConsultationBill, AppointmentError> {
        let amount = self.fee_for(doctor);
        debug!("Billing appointment {} at {:.2}", appointment.id, amount);

        let bill = store
            .insert_consultation_bill(&NewConsultationBill {
                appointment_id: appointment.id,
                patient_id: appointment.patient,
                amount,
            })
            .await?;

        info!("Consultation bill {} created for appointment {}", bill.id, appointment.id);
        Ok(bill)
    }
}
