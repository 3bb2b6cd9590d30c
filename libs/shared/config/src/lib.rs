use std::env;
use std::str::FromStr;
use tracing::warn;

/// Upper bound for `APPOINTMENT_BOOKING_HORIZON_DAYS`.
pub const MAX_BOOKING_HORIZON_DAYS: i64 = 365;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub enforce_business_hours: bool,
    pub booking_horizon_days: i64,
    pub clinic_utc_offset_minutes: i32,
    pub default_consultation_fee: f64,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            enforce_business_hours: false,
            booking_horizon_days: 3,
            clinic_utc_offset_minutes: 0,
            default_consultation_fee: 500.00,
            port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            enforce_business_hours: parse_flag(
                env::var("APPOINTMENT_ENFORCE_BUSINESS_HOURS").ok().as_deref(),
            ),
            booking_horizon_days: clamp_horizon(parse_or(
                "APPOINTMENT_BOOKING_HORIZON_DAYS",
                env::var("APPOINTMENT_BOOKING_HORIZON_DAYS").ok().as_deref(),
                defaults.booking_horizon_days,
            )),
            clinic_utc_offset_minutes: parse_or(
                "CLINIC_UTC_OFFSET_MINUTES",
                env::var("CLINIC_UTC_OFFSET_MINUTES").ok().as_deref(),
                defaults.clinic_utc_offset_minutes,
            ),
            default_consultation_fee: parse_or(
                "DEFAULT_CONSULTATION_FEE",
                env::var("DEFAULT_CONSULTATION_FEE").ok().as_deref(),
                defaults.default_consultation_fee,
            ),
            port: parse_or("PORT", env::var("PORT").ok().as_deref(), defaults.port),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}

/// Keep the booking horizon within `[0, MAX_BOOKING_HORIZON_DAYS]`.
pub fn clamp_horizon(days: i64) -> i64 {
    let clamped = days.clamp(0, MAX_BOOKING_HORIZON_DAYS);
    if clamped != days {
        warn!("APPOINTMENT_BOOKING_HORIZON_DAYS={} is out of range, using {}", days, clamped);
    }
    clamped
}

fn parse_flag(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1") | Some("true") | Some("yes") | Some("on")
    )
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(name: &str, raw: Option<&str>, default: T) -> T {
    match raw {
        None => default,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", name, value, default);
            default
        }),
    }
}
