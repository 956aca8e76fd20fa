use chrono::Duration;
use log::{info, warn};
use std::{env, fmt::Display, str::FromStr};
use thiserror::Error;

use crate::db::seed::{DemoStudent, SeedOptions};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("{0} must be set together with {1}")]
    Incomplete(&'static str, &'static str),
}

/// Rules the booking service applies; tunable per deployment.
#[derive(Debug, Clone)]
pub struct BookingSettings {
    pub require_otp: bool,
    pub otp_ttl: Duration,
    pub otp_max_attempts: i32,
    pub bcrypt_cost: u32,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            require_otp: true,
            otp_ttl: Duration::minutes(10),
            otp_max_attempts: 5,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub mongodb_uri: Option<String>,
    pub db_name: String,
    pub cors_origin: String,
    pub booking: BookingSettings,
    pub seed: SeedOptions,
    pub mail: Option<MailConfig>,
}

impl ServerConfig {
    /// Reads `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if dotenv::dotenv().is_err() {
            info!("No .env file found, using process environment");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let booking = BookingSettings {
            require_otp: try_load(&lookup, "REQUIRE_OTP", "true")?,
            otp_ttl: otp_ttl(&lookup)?,
            otp_max_attempts: try_load(&lookup, "OTP_MAX_ATTEMPTS", "5")?,
            bcrypt_cost: try_load(&lookup, "BCRYPT_COST", &bcrypt::DEFAULT_COST.to_string())?,
        };
        if booking.otp_max_attempts < 1 {
            return Err(ConfigError::Invalid {
                key: "OTP_MAX_ATTEMPTS".into(),
                message: "must be at least 1".into(),
            });
        }

        let demo_student = match (
            optional(&lookup, "SEED_STUDENT_EMAIL"),
            optional(&lookup, "SEED_STUDENT_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(DemoStudent {
                email,
                password,
                is_staff: try_load(&lookup, "SEED_STUDENT_STAFF", "false")?,
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::Incomplete("SEED_STUDENT_EMAIL", "SEED_STUDENT_PASSWORD"))
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete("SEED_STUDENT_PASSWORD", "SEED_STUDENT_EMAIL"))
            }
        };

        let mail = optional(&lookup, "MAIL_API_URL").map(|api_url| MailConfig {
            api_url,
            api_key: optional(&lookup, "MAIL_API_KEY"),
            from: optional(&lookup, "MAIL_FROM")
                .unwrap_or_else(|| "transport@college.edu".to_string()),
        });

        let mongodb_uri = optional(&lookup, "MONGODB_URI");
        if mongodb_uri.is_none() {
            warn!("MONGODB_URI not set, bookings will live in memory only");
        }

        Ok(Self {
            host: try_load(&lookup, "HOST", "127.0.0.1")?,
            port: try_load(&lookup, "PORT", "8000")?,
            mongodb_uri,
            db_name: try_load(&lookup, "DB_NAME", "college_transport")?,
            cors_origin: try_load(&lookup, "CORS_ORIGIN", "http://localhost:5173")?,
            seed: SeedOptions {
                force: try_load(&lookup, "FORCE_SEED", "false")?,
                demo_student,
                bcrypt_cost: booking.bcrypt_cost,
            },
            booking,
            mail,
        })
    }
}

const MAX_OTP_TTL_MINUTES: u32 = 24 * 60;

fn otp_ttl<F>(lookup: &F) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let key = "OTP_TTL_MINUTES";
    let out_of_range = || ConfigError::Invalid {
        key: key.into(),
        message: format!("must be between 1 and {MAX_OTP_TTL_MINUTES} minutes"),
    };
    let minutes: u32 = try_load(lookup, key, "10")?;
    if !(1..=MAX_OTP_TTL_MINUTES).contains(&minutes) {
        return Err(out_of_range());
    }
    Duration::try_minutes(i64::from(minutes)).ok_or_else(out_of_range)
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn try_load<F, T>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let raw = optional(lookup, key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key: key.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.db_name, "college_transport");
        assert!(config.mongodb_uri.is_none());
        assert!(config.booking.require_otp);
        assert_eq!(config.booking.otp_ttl, Duration::minutes(10));
        assert!(config.mail.is_none());
        assert!(config.seed.demo_student.is_none());
    }

    #[test]
    fn values_are_parsed() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "9100"),
            ("REQUIRE_OTP", "false"),
            ("OTP_TTL_MINUTES", "3"),
            ("MONGODB_URI", "mongodb://localhost:27017"),
            ("MAIL_API_URL", "https://relay.example/send"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9100);
        assert!(!config.booking.require_otp);
        assert_eq!(config.booking.otp_ttl, Duration::minutes(3));
        assert_eq!(config.mail.unwrap().from, "transport@college.edu");
    }

    #[test]
    fn bad_port_is_reported() {
        let err = ServerConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "PORT"));
    }

    #[test]
    fn otp_ttl_must_be_a_sane_number_of_minutes() {
        for raw in ["-5", "0", "1441", "9223372036854775807", "soon"] {
            let err = ServerConfig::from_lookup(lookup(&[("OTP_TTL_MINUTES", raw)])).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { ref key, .. } if key == "OTP_TTL_MINUTES"),
                "{raw} accepted"
            );
        }
        let config = ServerConfig::from_lookup(lookup(&[("OTP_TTL_MINUTES", "1440")])).unwrap();
        assert_eq!(config.booking.otp_ttl, Duration::hours(24));
    }

    #[test]
    fn half_configured_demo_student_is_rejected() {
        let err =
            ServerConfig::from_lookup(lookup(&[("SEED_STUDENT_EMAIL", "a@b.c")])).unwrap_err();
        assert!(matches!(err, ConfigError::Incomplete(..)));
    }
}
