// libs/appointment-cell/src/services/store.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{header::{HeaderMap, HeaderValue}, Method};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};

use crate::models::{
    Appointment, AppointmentCandidate, AppointmentError, AppointmentFilter, AppointmentPage,
    ConsultationBill, Doctor, NewConsultationBill,
};
use crate::services::policy::SchedulingPolicy;

/// Persistence seen by the scheduler. The backing store is expected to
/// enforce the per-doctor no-overlap rule itself, keyed on the same clinic
/// date the validator uses, and report a violation as
/// `AppointmentError::ConcurrentConflict`.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Pending appointments of `doctor` whose start lies in `[from, until)`.
    async fn pending_for_doctor_on(
        &self,
        doctor: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        exclude_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    async fn get_appointment(&self, id: Uuid) -> Result<Appointment, AppointmentError>;

    async fn insert_appointment(&self, candidate: &AppointmentCandidate) -> Result<Appointment, AppointmentError>;

    async fn update_appointment(&self, id: Uuid, candidate: &AppointmentCandidate) -> Result<Appointment, AppointmentError>;

    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<AppointmentPage, AppointmentError>;

    async fn find_doctor(&self, staff_code: &str) -> Result<Option<Doctor>, AppointmentError>;

    async fn patient_exists(&self, patient_id: Uuid) -> Result<bool, AppointmentError>;

    async fn insert_consultation_bill(&self, bill: &NewConsultationBill) -> Result<ConsultationBill, AppointmentError>;
}

/// PostgREST-backed store. Requests carry the caller's token so row-level security applies.
///
/// Every written row carries its `clinic_date`, which the `appointments_no_overlap`
/// exclusion constraint partitions on.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
    auth_token: String,
    policy: SchedulingPolicy,
}

const DOCTOR_SELECT: &str = "staff_id,first_name,last_name,is_available,department:departments(id,department_name,fee)";

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig, auth_token: &str) -> Self {
        Self::with_client(
            Arc::new(SupabaseClient::new(config)),
            auth_token,
            SchedulingPolicy::from_config(config),
        )
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, auth_token: &str, policy: SchedulingPolicy) -> Self {
        Self {
            supabase,
            auth_token: auth_token.to_string(),
            policy,
        }
    }

    fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    fn candidate_row(&self, candidate: &AppointmentCandidate) -> Value {
        json!({
            "doctor_id": candidate.doctor,
            "patient_id": candidate.patient,
            "start_time": timestamp(candidate.start_time),
            "end_time": timestamp(candidate.end_time),
            "clinic_date": self.policy.clinic_date(candidate.start_time),
            "status": candidate.status,
        })
    }

    async fn fetch_rows(&self, path: &str) -> Result<Vec<Value>, AppointmentError> {
        self.supabase
            .request(Method::GET, path, Some(&self.auth_token), None)
            .await
            .map_err(map_store_error)
    }

    async fn write_rows(&self, method: Method, path: &str, body: Value) -> Result<Vec<Value>, AppointmentError> {
        self.supabase
            .request_with_headers(
                method,
                path,
                Some(&self.auth_token),
                Some(body),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(map_store_error)
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn pending_for_doctor_on(
        &self,
        doctor: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        exclude_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut query_parts = vec![
            format!("doctor_id=eq.{}", urlencoding::encode(doctor)),
            "status=eq.Pending".to_string(),
            format!("start_time=gte.{}", timestamp(from)),
            format!("start_time=lt.{}", timestamp(until)),
        ];

        if let Some(exclude_id) = exclude_id {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }

        let path = format!("/rest/v1/appointments?{}&order=start_time.asc", query_parts.join("&"));
        debug!("Fetching pending appointments for doctor {} in [{}, {})", doctor, from, until);

        parse_rows(self.fetch_rows(&path).await?)
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        parse_first(self.fetch_rows(&path).await?)?.ok_or(AppointmentError::NotFound)
    }

    async fn insert_appointment(&self, candidate: &AppointmentCandidate) -> Result<Appointment, AppointmentError> {
        let mut row = self.candidate_row(candidate);
        row["created_at"] = json!(timestamp(Utc::now()));
        row["updated_at"] = row["created_at"].clone();

        let rows = self.write_rows(Method::POST, "/rest/v1/appointments", row).await?;
        parse_first(rows)?.ok_or_else(|| AppointmentError::DatabaseError("Failed to create appointment".to_string()))
    }

    async fn update_appointment(&self, id: Uuid, candidate: &AppointmentCandidate) -> Result<Appointment, AppointmentError> {
        let mut row = self.candidate_row(candidate);
        row["updated_at"] = json!(timestamp(Utc::now()));

        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows = self.write_rows(Method::PATCH, &path, row).await?;
        parse_first(rows)?.ok_or(AppointmentError::NotFound)
    }

    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<AppointmentPage, AppointmentError> {
        // Embedded resources are aliased so they never collide with the `doctor`/`patient` fields.
        let mut query_parts = vec![
            "select=*,doctor_info:doctors!inner(first_name,last_name),patient_info:patients!inner(first_name,last_name)".to_string(),
        ];

        if let Some(doctor) = &filter.doctor {
            query_parts.push(format!("doctor_id=eq.{}", urlencoding::encode(doctor)));
        }
        if let Some(name) = &filter.doctor_name {
            query_parts.push(format!("doctor_info.first_name=ilike.*{}*", urlencoding::encode(name)));
        }
        if let Some(name) = &filter.patient_name {
            query_parts.push(format!("patient_info.first_name=ilike.*{}*", urlencoding::encode(name)));
        }
        if let Some(status) = filter.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(from) = filter.from {
            query_parts.push(format!("start_time=gte.{}", timestamp(from)));
        }
        if let Some(until) = filter.until {
            query_parts.push(format!("start_time=lt.{}", timestamp(until)));
        }

        query_parts.push("order=start_time.desc".to_string());
        query_parts.push(format!("limit={}", filter.page_size));
        query_parts.push(format!("offset={}", filter.offset()));

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));

        let (rows, total): (Vec<Value>, Option<u64>) = self.supabase
            .request_counted(&path, Some(&self.auth_token))
            .await
            .map_err(map_store_error)?;

        let results = parse_rows(rows)?;
        let count = total.unwrap_or(results.len() as u64);
        Ok(AppointmentPage::new(results, count, filter.page, filter.page_size))
    }

    async fn find_doctor(&self, staff_code: &str) -> Result<Option<Doctor>, AppointmentError> {
        let path = format!(
            "/rest/v1/doctors?staff_id=eq.{}&select={}",
            urlencoding::encode(staff_code),
            DOCTOR_SELECT
        );
        parse_first(self.fetch_rows(&path).await?)
    }

    async fn patient_exists(&self, patient_id: Uuid) -> Result<bool, AppointmentError> {
        let path = format!("/rest/v1/patients?id=eq.{}&select=id", patient_id);
        Ok(!self.fetch_rows(&path).await?.is_empty())
    }

    async fn insert_consultation_bill(&self, bill: &NewConsultationBill) -> Result<ConsultationBill, AppointmentError> {
        let row = json!({
            "appointment_id": bill.appointment_id,
            "patient_id": bill.patient_id,
            "amount": bill.amount,
            "paid": false,
            "bill_date": timestamp(Utc::now()),
        });

        let rows = self.write_rows(Method::POST, "/rest/v1/consultation_bills", row).await?;
        parse_first(rows)?.ok_or_else(|| AppointmentError::DatabaseError("Failed to create consultation bill".to_string()))
    }
}

/// RFC 3339 with a `Z` suffix so the value is safe inside a query string.
fn timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn map_store_error(err: anyhow::Error) -> AppointmentError {
    match err.downcast_ref::<SupabaseError>() {
        Some(SupabaseError::Conflict { code, .. }) => {
            debug!("Store reported constraint conflict {}", code);
            AppointmentError::ConcurrentConflict
        },
        _ => {
            error!("Appointment store request failed: {}", err);
            AppointmentError::DatabaseError(err.to_string())
        },
    }
}

fn parse_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, AppointmentError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse rows: {}", e)))
}

fn parse_first<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Option<T>, AppointmentError> {
    rows.into_iter()
        .next()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse row: {}", e)))
}
