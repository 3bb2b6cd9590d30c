// libs/appointment-cell/tests/common/mod.rs
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use appointment_cell::models::{
    Appointment, AppointmentCandidate, AppointmentError, AppointmentFilter, AppointmentPage,
    AppointmentStatus, ConsultationBill, Department, Doctor, NewConsultationBill,
};
use appointment_cell::services::policy::SchedulingPolicy;
use appointment_cell::services::store::AppointmentStore;

#[derive(Default)]
struct Tables {
    appointments: HashMap<Uuid, Appointment>,
    doctors: HashMap<String, Doctor>,
    patients: Vec<Uuid>,
    bills: Vec<ConsultationBill>,
}

/// Store double that behaves like the database, including the
/// per-doctor exclusion constraint on Pending rows partitioned by clinic date.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    fail_billing: bool,
    policy: SchedulingPolicy,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doctor(self, staff_code: &str, fee: Option<f64>, is_available: bool) -> Self {
        self.tables.lock().unwrap().doctors.insert(staff_code.to_string(), Doctor {
            staff_id: staff_code.to_string(),
            first_name: "Test".to_string(),
            last_name: staff_code.to_string(),
            is_available,
            department: Some(Department {
                id: 1,
                department_name: "General Practice".to_string(),
                fee,
            }),
        });
        self
    }

    pub fn with_patient(self, patient_id: Uuid) -> Self {
        self.tables.lock().unwrap().patients.push(patient_id);
        self
    }

    pub fn with_policy(mut self, policy: SchedulingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_failing_billing(mut self) -> Self {
        self.fail_billing = true;
        self
    }

    /// Insert a row directly, bypassing every check.
    pub fn seed(&self, appointment: Appointment) {
        self.tables.lock().unwrap().appointments.insert(appointment.id, appointment);
    }

    pub fn appointments(&self) -> Vec<Appointment> {
        let mut rows: Vec<Appointment> = self.tables.lock().unwrap().appointments.values().cloned().collect();
        rows.sort_by_key(|a| a.start_time);
        rows
    }

    pub fn bills(&self) -> Vec<ConsultationBill> {
        self.tables.lock().unwrap().bills.clone()
    }

    fn violates_exclusion(&self, tables: &Tables, id: Option<Uuid>, candidate: &AppointmentCandidate) -> bool {
        let clinic_date = self.policy.clinic_date(candidate.start_time);
        candidate.status == AppointmentStatus::Pending
            && tables.appointments.values().any(|apt| {
                Some(apt.id) != id
                    && apt.doctor == candidate.doctor
                    && apt.status == AppointmentStatus::Pending
                    && self.policy.clinic_date(apt.start_time) == clinic_date
                    && apt.end_time >= candidate.start_time
                    && apt.start_time <= candidate.end_time
            })
    }
}

#[async_trait]
impl AppointmentStore for InMemoryStore {
    async fn pending_for_doctor_on(
        &self,
        doctor: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        exclude_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.appointments.values()
            .filter(|a| a.doctor == doctor && a.status == AppointmentStatus::Pending)
            .filter(|a| a.start_time >= from && a.start_time < until)
            .filter(|a| Some(a.id) != exclude_id)
            .cloned()
            .collect())
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.tables.lock().unwrap().appointments.get(&id).cloned().ok_or(AppointmentError::NotFound)
    }

    async fn insert_appointment(&self, candidate: &AppointmentCandidate) -> Result<Appointment, AppointmentError> {
        let mut tables = self.tables.lock().unwrap();
        if self.violates_exclusion(&tables, None, candidate) {
            return Err(AppointmentError::ConcurrentConflict);
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            doctor: candidate.doctor.clone(),
            patient: candidate.patient,
            start_time: candidate.start_time,
            end_time: candidate.end_time,
            status: candidate.status,
            created_at: Some(now),
            updated_at: Some(now),
        };
        tables.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn update_appointment(&self, id: Uuid, candidate: &AppointmentCandidate) -> Result<Appointment, AppointmentError> {
        let mut tables = self.tables.lock().unwrap();
        if self.violates_exclusion(&tables, Some(id), candidate) {
            return Err(AppointmentError::ConcurrentConflict);
        }

        let row = tables.appointments.get_mut(&id).ok_or(AppointmentError::NotFound)?;
        row.doctor = candidate.doctor.clone();
        row.patient = candidate.patient;
        row.start_time = candidate.start_time;
        row.end_time = candidate.end_time;
        row.status = candidate.status;
        row.updated_at = Some(Utc::now());
        Ok(row.clone())
    }

    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<AppointmentPage, AppointmentError> {
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<Appointment> = tables.appointments.values()
            .filter(|a| filter.doctor.as_ref().map_or(true, |d| &a.doctor == d))
            .filter(|a| filter.status.map_or(true, |s| a.status == s))
            .filter(|a| filter.from.map_or(true, |f| a.start_time >= f))
            .filter(|a| filter.until.map_or(true, |u| a.start_time < u))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.start_time.cmp(&a.start_time));

        let count = rows.len() as u64;
        let results = rows.into_iter()
            .skip(filter.offset() as usize)
            .take(filter.page_size as usize)
            .collect();
        Ok(AppointmentPage::new(results, count, filter.page, filter.page_size))
    }

    async fn find_doctor(&self, staff_code: &str) -> Result<Option<Doctor>, AppointmentError> {
        Ok(self.tables.lock().unwrap().doctors.get(staff_code).cloned())
    }

    async fn patient_exists(&self, patient_id: Uuid) -> Result<bool, AppointmentError> {
        Ok(self.tables.lock().unwrap().patients.contains(&patient_id))
    }

    async fn insert_consultation_bill(&self, bill: &NewConsultationBill) -> Result<ConsultationBill, AppointmentError> {
        if self.fail_billing {
            return Err(AppointmentError::DatabaseError("consultation_bills unavailable".to_string()));
        }

        let mut tables = self.tables.lock().unwrap();
        if tables.bills.iter().any(|b| b.appointment_id == bill.appointment_id) {
            return Err(AppointmentError::ConcurrentConflict);
        }

        let created = ConsultationBill {
            id: Uuid::new_v4(),
            appointment_id: bill.appointment_id,
            patient_id: bill.patient_id,
            amount: bill.amount,
            bill_date: Some(Utc::now()),
            paid: false,
        };
        tables.bills.push(created.clone());
        Ok(created)
    }
}

/// Wraps a store so the advisory overlap query sees nothing, as when a
/// competing booking commits between the check and the insert.
pub struct StaleReads<S>(pub S);

#[async_trait]
impl<S: AppointmentStore> AppointmentStore for StaleReads<S> {
    async fn pending_for_doctor_on(
        &self,
        _doctor: &str,
        _from: DateTime<Utc>,
        _until: DateTime<Utc>,
        _exclude_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(Vec::new())
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.0.get_appointment(id).await
    }

    async fn insert_appointment(&self, candidate: &AppointmentCandidate) -> Result<Appointment, AppointmentError> {
        self.0.insert_appointment(candidate).await
    }

    async fn update_appointment(&self, id: Uuid, candidate: &AppointmentCandidate) -> Result<Appointment, AppointmentError> {
        self.0.update_appointment(id, candidate).await
    }

    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<AppointmentPage, AppointmentError> {
        self.0.list_appointments(filter).await
    }

    async fn find_doctor(&self, staff_code: &str) -> Result<Option<Doctor>, AppointmentError> {
        self.0.find_doctor(staff_code).await
    }

    async fn patient_exists(&self, patient_id: Uuid) -> Result<bool, AppointmentError> {
        self.0.patient_exists(patient_id).await
    }

    async fn insert_consultation_bill(&self, bill: &NewConsultationBill) -> Result<ConsultationBill, AppointmentError> {
        self.0.insert_consultation_bill(bill).await
    }
}
