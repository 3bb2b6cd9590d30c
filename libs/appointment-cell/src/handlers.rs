// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, Extension},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Capability, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_capability;

use crate::models::{
    Appointment, AppointmentError, AppointmentFilter, AppointmentListQuery, AppointmentPatch,
    BookAppointmentRequest, ReplaceAppointmentRequest, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
use crate::services::booking::AppointmentBookingService;
use crate::services::policy::SchedulingPolicy;

// ==============================================================================
// ERROR MAPPING
// ==============================================================================

pub fn map_appointment_error(error: AppointmentError) -> AppError {
    match error {
        AppointmentError::Rejected(reason) => AppError::Rejected {
            code: reason.code().to_string(),
            message: reason.to_string(),
        },
        AppointmentError::ConcurrentConflict => AppError::Conflict(error.to_string()),
        AppointmentError::NotFound
        | AppointmentError::DoctorNotFound
        | AppointmentError::PatientNotFound => AppError::NotFound(error.to_string()),
        AppointmentError::DoctorNotAvailable => AppError::BadRequest(error.to_string()),
        AppointmentError::DatabaseError(msg) => AppError::Internal(msg),
    }
}

/// Staff code a doctor is restricted to; `None` for roles that see every appointment.
fn doctor_scope(user: &User) -> Result<Option<&str>, AppError> {
    if user.can(Capability::ViewAllAppointments) {
        return Ok(None);
    }

    user.staff_code
        .as_deref()
        .map(Some)
        .ok_or_else(|| AppError::Forbidden("Doctor account has no staff code".to_string()))
}

fn ensure_owns(user: &User, appointment: &Appointment) -> Result<(), AppError> {
    match doctor_scope(user)? {
        Some(staff_code) if staff_code != appointment.doctor => Err(AppError::Forbidden(
            "Not authorized to access another doctor's appointment".to_string(),
        )),
        _ => Ok(()),
    }
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_capability(&user, Capability::ScheduleAppointments)?;

    if let Some(staff_code) = doctor_scope(&user)? {
        if staff_code != request.doctor {
            return Err(AppError::Forbidden("Doctors can only book their own appointments".to_string()));
        }
    }

    let booking_service = AppointmentBookingService::new(&state, auth.token());

    let outcome = booking_service.book_appointment(request, Utc::now()).await
        .map_err(map_appointment_error)?;

    let message = if outcome.bill.is_some() {
        "Appointment booked successfully"
    } else {
        "Appointment booked successfully; consultation bill could not be created"
    };

    Ok((StatusCode::CREATED, Json(json!({
        "success": true,
        "appointment": outcome.appointment,
        "bill": outcome.bill,
        "message": message
    }))))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_capability(&user, Capability::ViewAppointments)?;

    let booking_service = AppointmentBookingService::new(&state, auth.token());

    let appointment = booking_service.get_appointment(appointment_id).await
        .map_err(map_appointment_error)?;

    ensure_owns(&user, &appointment)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn replace_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ReplaceAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    update(&state, appointment_id, auth.token(), &user, request.into()).await
}

#[axum::debug_handler]
pub async fn patch_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(patch): Json<AppointmentPatch>,
) -> Result<Json<Value>, AppError> {
    update(&state, appointment_id, auth.token(), &user, patch).await
}

async fn update(
    config: &AppConfig,
    appointment_id: Uuid,
    token: &str,
    user: &User,
    patch: AppointmentPatch,
) -> Result<Json<Value>, AppError> {
    require_capability(user, Capability::ScheduleAppointments)?;

    let booking_service = AppointmentBookingService::new(config, token);

    let existing = booking_service.get_appointment(appointment_id).await
        .map_err(map_appointment_error)?;

    ensure_owns(user, &existing)?;

    if let (Some(staff_code), Some(doctor)) = (doctor_scope(user)?, patch.doctor.as_deref()) {
        if staff_code != doctor {
            return Err(AppError::Forbidden("Doctors cannot reassign appointments".to_string()));
        }
    }

    let updated = booking_service.apply_update(existing, patch, Utc::now()).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated,
        "message": "Appointment updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<AppointmentListQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_capability(&user, Capability::ViewAppointments)?;

    let policy = SchedulingPolicy::from_config(&state);
    let (from, until) = match query.date {
        Some(date) => {
            let (from, until) = policy.day_bounds(date);
            (Some(from), Some(until))
        },
        None => (None, None),
    };

    let filter = AppointmentFilter {
        doctor: doctor_scope(&user)?.map(str::to_string),
        doctor_name: query.doctor_name.filter(|s| !s.trim().is_empty()),
        patient_name: query.patient_name.filter(|s| !s.trim().is_empty()),
        status: query.status,
        from,
        until,
        page: query.page.unwrap_or(1).max(1),
        page_size: query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
    };
    debug!("User {} listing appointments with {:?}", user.id, filter);

    let booking_service = AppointmentBookingService::new(&state, auth.token());

    let page = booking_service.list_appointments(&filter).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "count": page.count,
        "total_pages": page.total_pages,
        "page": page.page,
        "results": page.results
    })))
}
