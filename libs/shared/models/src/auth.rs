use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

/// Staff roles. Resolved once when the token is validated; everything
/// downstream matches on this enum instead of looking up group names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Receptionist,
    Doctor,
    Pharmacist,
    #[serde(rename = "labtechnician")]
    LabTechnician,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ViewAppointments,
    ScheduleAppointments,
    /// Not restricted to the caller's own appointments.
    ViewAllAppointments,
}

impl Role {
    /// Highest-ranked role wins when a user carries several groups.
    const PRECEDENCE: [Role; 5] = [
        Role::Admin,
        Role::Receptionist,
        Role::Doctor,
        Role::Pharmacist,
        Role::LabTechnician,
    ];

    pub fn from_group_name(name: &str) -> Option<Role> {
        match name.trim().to_ascii_lowercase().replace(['_', ' ', '-'], "").as_str() {
            "admin" | "superuser" => Some(Role::Admin),
            "receptionist" => Some(Role::Receptionist),
            "doctor" => Some(Role::Doctor),
            "pharmacist" => Some(Role::Pharmacist),
            "labtechnician" => Some(Role::LabTechnician),
            _ => None,
        }
    }

    /// Resolve from Supabase claims: `app_metadata.is_superuser`,
    /// `app_metadata.groups`, `app_metadata.role`, then the top-level `role`.
    pub fn from_claims(claims: &JwtClaims) -> Role {
        let app_metadata = claims.app_metadata.as_ref();

        let is_superuser = app_metadata
            .and_then(|m| m.get("is_superuser"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if is_superuser {
            return Role::Admin;
        }

        let mut held: Vec<Role> = Vec::new();

        if let Some(groups) = app_metadata.and_then(|m| m.get("groups")).and_then(|g| g.as_array()) {
            held.extend(groups.iter().filter_map(|g| g.as_str()).filter_map(Role::from_group_name));
        }
        if let Some(role) = app_metadata.and_then(|m| m.get("role")).and_then(|r| r.as_str()) {
            held.extend(Role::from_group_name(role));
        }
        if let Some(role) = claims.role.as_deref() {
            held.extend(Role::from_group_name(role));
        }

        Self::PRECEDENCE
            .into_iter()
            .find(|candidate| held.contains(candidate))
            .unwrap_or(Role::Unknown)
    }

    pub fn can(self, capability: Capability) -> bool {
        match (self, capability) {
            (Role::Admin, _) => true,
            (Role::Receptionist, _) => true,
            (Role::Doctor, Capability::ViewAppointments) => true,
            (Role::Doctor, Capability::ScheduleAppointments) => true,
            (Role::Doctor, Capability::ViewAllAppointments) => false,
            (Role::Pharmacist | Role::LabTechnician | Role::Unknown, _) => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Receptionist => "receptionist",
            Role::Doctor => "doctor",
            Role::Pharmacist => "pharmacist",
            Role::LabTechnician => "labtechnician",
            Role::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Role,
    /// Staff code from `app_metadata.staff_id` (e.g. `DR1001`), present for staff accounts.
    pub staff_code: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn can(&self, capability: Capability) -> bool {
        self.role.can(capability)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub user_id: String,
    pub email: Option<String>,
    pub role: Role,
}
