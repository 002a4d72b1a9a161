//! Config schema, loaded from environment variables with strict validation.
//!
//! The donor loads YAML once at startup and calls `validate()` before the
//! server binds; this protocol's configuration table is env-var driven
//! instead, so `GatewayConfig::from_env` plays the same role `load_from_str`
//! played there.

use std::time::Duration;

use relay_core::error::{RelayError, Result};

/// Floor applied to every scaled timeout so a large `RELAY_TEST_TIMING_SCALE`
/// can't collapse a state machine into flakiness.
const MIN_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub node_env: String,
    pub log_level: String,
    pub database_url: String,

    pub classroom_code_expiration: Duration,
    pub classroom_code_cleanup_interval: Duration,
    pub session_stale_timeout: Duration,
    pub session_all_students_left_timeout: Duration,
    pub session_empty_teacher_timeout: Duration,
    pub session_cleanup_interval: Duration,
    pub session_very_short_threshold: Duration,
    pub health_check_interval: Duration,
    pub teacher_reconnection_grace_period: Duration,
    pub session_expired_message_delay: Duration,
    pub invalid_classroom_message_delay: Duration,
    pub min_audio_data_length: usize,
    pub enable_detailed_translation_logging: bool,

    /// Scales every duration above; lets integration tests drive the full
    /// session lifecycle in seconds rather than hours. 1.0 in production.
    pub test_timing_scale: f64,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let scale = env_f64("RELAY_TEST_TIMING_SCALE", 1.0)?;
        if scale <= 0.0 {
            return Err(RelayError::BadRequest(
                "RELAY_TEST_TIMING_SCALE must be > 0".into(),
            ));
        }

        let cfg = Self {
            host: env_string("HOST", "0.0.0.0"),
            port: env_u16("PORT", 8080)?,
            node_env: env_string("NODE_ENV", "development"),
            log_level: env_string("LOG_LEVEL", "info"),
            database_url: env_string("DATABASE_URL", "postgres://localhost/classroom_relay"),

            classroom_code_expiration: scaled_ms("CLASSROOM_CODE_EXPIRATION_MS", 7_200_000, scale),
            classroom_code_cleanup_interval: scaled_ms(
                "CLASSROOM_CODE_CLEANUP_INTERVAL_MS",
                900_000,
                scale,
            ),
            session_stale_timeout: scaled_ms("SESSION_STALE_TIMEOUT_MS", 5_400_000, scale),
            session_all_students_left_timeout: scaled_ms(
                "SESSION_ALL_STUDENTS_LEFT_TIMEOUT_MS",
                600_000,
                scale,
            ),
            session_empty_teacher_timeout: scaled_ms(
                "SESSION_EMPTY_TEACHER_TIMEOUT_MS",
                900_000,
                scale,
            ),
            session_cleanup_interval: scaled_ms("SESSION_CLEANUP_INTERVAL_MS", 120_000, scale),
            session_very_short_threshold: scaled_ms("SESSION_VERY_SHORT_THRESHOLD_MS", 5_000, scale),
            health_check_interval: scaled_ms("HEALTH_CHECK_INTERVAL_MS", 30_000, scale),
            teacher_reconnection_grace_period: scaled_ms(
                "TEACHER_RECONNECTION_GRACE_PERIOD_MS",
                300_000,
                scale,
            ),
            session_expired_message_delay: scaled_ms("SESSION_EXPIRED_MESSAGE_DELAY_MS", 1_000, scale),
            invalid_classroom_message_delay: scaled_ms(
                "INVALID_CLASSROOM_MESSAGE_DELAY_MS",
                100,
                scale,
            ),
            min_audio_data_length: env_usize("MIN_AUDIO_DATA_LENGTH", 100)?,
            enable_detailed_translation_logging: env_bool(
                "ENABLE_DETAILED_TRANSLATION_LOGGING",
                false,
            )?,
            test_timing_scale: scale,
        };

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_url.is_empty() {
            return Err(RelayError::BadRequest("DATABASE_URL must not be empty".into()));
        }
        if self.min_audio_data_length == 0 {
            return Err(RelayError::BadRequest("MIN_AUDIO_DATA_LENGTH must be > 0".into()));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn scaled_ms(key: &str, default_ms: u64, scale: f64) -> Duration {
    let raw = env_u64(key, default_ms);
    let scaled = (raw as f64 * scale).round().max(0.0) as u64;
    Duration::from_millis(scaled).max(MIN_TIMEOUT)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u16(key: &str, default: u16) -> Result<u16> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(v) => v.parse().map_err(|_| RelayError::BadRequest(format!("{key} must be a valid port"))),
    }
}

fn env_usize(key: &str, default: usize) -> Result<usize> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(v) => v
            .parse()
            .map_err(|_| RelayError::BadRequest(format!("{key} must be a non-negative integer"))),
    }
}

fn env_f64(key: &str, default: f64) -> Result<f64> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(v) => v.parse().map_err(|_| RelayError::BadRequest(format!("{key} must be a number"))),
    }
}

fn env_bool(key: &str, default: bool) -> Result<bool> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(v) => match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(RelayError::BadRequest(format!("{key} must be a boolean"))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_apply_without_env() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        for key in ["PORT", "CLASSROOM_CODE_EXPIRATION_MS", "RELAY_TEST_TIMING_SCALE"] {
            std::env::remove_var(key);
        }
        let cfg = GatewayConfig::from_env().expect("defaults are valid");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.classroom_code_expiration, Duration::from_millis(7_200_000));
    }

    #[test]
    fn test_timing_scale_shrinks_and_floors_durations() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var("RELAY_TEST_TIMING_SCALE", "0.001");
        std::env::set_var("SESSION_VERY_SHORT_THRESHOLD_MS", "5000");
        let cfg = GatewayConfig::from_env().expect("valid");
        assert_eq!(cfg.session_very_short_threshold, MIN_TIMEOUT);
        std::env::remove_var("RELAY_TEST_TIMING_SCALE");
        std::env::remove_var("SESSION_VERY_SHORT_THRESHOLD_MS");
    }

    #[test]
    fn rejects_non_numeric_port() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var("PORT", "not-a-port");
        assert!(GatewayConfig::from_env().is_err());
        std::env::remove_var("PORT");
    }
}
