pub mod billing;
pub mod booking;
pub mod lifecycle;
pub mod policy;
pub mod store;
pub mod validator;

pub use billing::ConsultationBillService;
pub use booking::AppointmentBookingService;
pub use lifecycle::AppointmentLifecycleService;
pub use policy::{BusinessHours, SchedulingPolicy};
pub use store::{AppointmentStore, SupabaseAppointmentStore};
pub use validator::{AppointmentValidator, ScheduleCheck};
