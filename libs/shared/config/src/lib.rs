use std::env;

use chrono::{NaiveTime, Weekday};
use tracing::warn;

pub const DEFAULT_OPEN_TIME: &str = "08:00";
pub const DEFAULT_CLOSE_TIME: &str = "18:00";
pub const DEFAULT_SLOT_MINUTES: i64 = 30;
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub supabase_service_role_key: String,
    pub clinic: ClinicHours,
    pub staff_selection_policy: String,
    pub port: u16,
}

/// Operating window of the clinic, interpreted in UTC.
#[derive(Debug, Clone, PartialEq)]
pub struct ClinicHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub slot_minutes: i64,
    pub closed_days: Vec<Weekday>,
}

impl Default for ClinicHours {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
            slot_minutes: DEFAULT_SLOT_MINUTES,
            closed_days: Vec::new(),
        }
    }
}

impl ClinicHours {
    pub fn is_open_on(&self, weekday: Weekday) -> bool {
        !self.closed_days.contains(&weekday)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let open = parse_time(env::var("CLINIC_OPEN_TIME").ok(), DEFAULT_OPEN_TIME);
        let close = parse_time(env::var("CLINIC_CLOSE_TIME").ok(), DEFAULT_CLOSE_TIME);

        let clinic = if open < close {
            ClinicHours {
                open,
                close,
                slot_minutes: parse_slot_minutes(env::var("CLINIC_SLOT_MINUTES").ok()),
                closed_days: parse_closed_days(env::var("CLINIC_CLOSED_DAYS").ok()),
            }
        } else {
            warn!("CLINIC_OPEN_TIME must be before CLINIC_CLOSE_TIME, using default hours");
            ClinicHours {
                slot_minutes: parse_slot_minutes(env::var("CLINIC_SLOT_MINUTES").ok()),
                closed_days: parse_closed_days(env::var("CLINIC_CLOSED_DAYS").ok()),
                ..ClinicHours::default()
            }
        };

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
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            clinic,
            staff_selection_policy: env::var("STAFF_SELECTION_POLICY")
                .unwrap_or_else(|_| "first_eligible".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
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

    /// The scheduling stores write through the service role, so both must be present.
    pub fn is_backend_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_service_role_key.is_empty()
    }
}

fn parse_time(value: Option<String>, default: &str) -> NaiveTime {
    let fallback = NaiveTime::parse_from_str(default, "%H:%M").unwrap_or(NaiveTime::MIN);
    match value {
        Some(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M").unwrap_or_else(|_| {
            warn!("Invalid clinic time '{}', using {}", raw, default);
            fallback
        }),
        None => fallback,
    }
}

fn parse_slot_minutes(value: Option<String>) -> i64 {
    match value.map(|raw| raw.trim().parse::<i64>()) {
        Some(Ok(minutes)) if minutes > 0 => minutes,
        Some(_) => {
            warn!("Invalid CLINIC_SLOT_MINUTES, using {}", DEFAULT_SLOT_MINUTES);
            DEFAULT_SLOT_MINUTES
        }
        None => DEFAULT_SLOT_MINUTES,
    }
}

fn parse_closed_days(value: Option<String>) -> Vec<Weekday> {
    let Some(raw) = value else {
        return Vec::new();
    };

    raw.split(',')
        .map(str::trim)
        .filter(|day| !day.is_empty())
        .filter_map(|day| match day.parse::<Weekday>() {
            Ok(weekday) => Some(weekday),
            Err(_) => {
                warn!("Ignoring unknown weekday '{}' in CLINIC_CLOSED_DAYS", day);
                None
            }
        })
        .collect()
}
