//! Leveled stderr logging for the VM and its command-line tools.
//!
//! Use the [`info!`](crate::info), [`warn!`](crate::warn) and
//! [`error!`](crate::error) macros. Each line carries an optional UTC
//! timestamp and an optional level tag; both are toggled through
//! [`SHOW_TIMESTAMP`] and [`SHOW_TYPE`]. Messages are suppressed in unit
//! tests.

use std::fmt::Display;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Environment variable that disables timestamps when set to `0` or `false`.
pub const ENV_LOG_TIMESTAMPS: &str = "STACKVM_LOG_TIMESTAMPS";

pub static SHOW_TIMESTAMP: AtomicBool = AtomicBool::new(true);
pub static SHOW_TYPE: AtomicBool = AtomicBool::new(true);

/// Log level for filtering messages.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        })
    }
}

impl Level {
    fn color_spec(self) -> ColorSpec {
        let mut spec = ColorSpec::new();
        match self {
            Level::Info => {}
            Level::Warn => {
                spec.set_fg(Some(Color::Yellow)).set_bold(true);
            }
            Level::Error => {
                spec.set_fg(Some(Color::Red)).set_bold(true);
            }
        }
        spec
    }
}

/// Applies [`ENV_LOG_TIMESTAMPS`] to [`SHOW_TIMESTAMP`].
///
/// Called once by the binaries at startup.
pub fn init_from_env() {
    if let Some(show) = timestamps_enabled(std::env::var(ENV_LOG_TIMESTAMPS).ok().as_deref()) {
        SHOW_TIMESTAMP.store(show, Ordering::Relaxed);
    }
}

/// Interprets the value of [`ENV_LOG_TIMESTAMPS`]; `None` keeps the current setting.
fn timestamps_enabled(raw: Option<&str>) -> Option<bool> {
    match raw?.trim().to_ascii_lowercase().as_str() {
        "0" | "false" | "off" | "no" => Some(false),
        "1" | "true" | "on" | "yes" => Some(true),
        _ => None,
    }
}

/// Converts days since Unix epoch to (year, month, day).
fn days_to_date(days: u64) -> (u32, u32, u32) {
    // Howard Hinnant's civil_from_days
    let z = days as i64 + 719468;
    let era = z.div_euclid(146097);
    let doe = z.rem_euclid(146097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y as u32, m, d)
}

/// Formats a duration since the Unix epoch as `YYYY-MM-DD HH:MM:SS.mmm`.
fn format_timestamp(since_epoch: Duration) -> String {
    let secs = since_epoch.as_secs();
    let (year, month, day) = days_to_date(secs / 86400);
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
        year,
        month,
        day,
        (secs / 3600) % 24,
        (secs / 60) % 60,
        secs % 60,
        since_epoch.subsec_millis()
    )
}

/// Internal logging function. Use the `info!`, `warn!`, or `error!` macros instead.
#[doc(hidden)]
pub fn log(level: Level, message: &str) {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    let _ = stderr.set_color(&level.color_spec());

    if SHOW_TIMESTAMP.load(Ordering::Relaxed) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let _ = write!(stderr, "{} ", format_timestamp(now));
    }
    if SHOW_TYPE.load(Ordering::Relaxed) {
        let _ = write!(stderr, "[{:5}] ", level);
    }
    let _ = writeln!(stderr, "{}", message);
    let _ = stderr.reset();
}

/// Logs an info-level message.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {{
        if cfg!(not(test)) {
            $crate::utils::log::log($crate::utils::log::Level::Info, &format!($($arg)*))
        }
    }};
}

/// Logs a warning-level message.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {{
        if cfg!(not(test)) {
            $crate::utils::log::log($crate::utils::log::Level::Warn, &format!($($arg)*))
        }
    }};
}

/// Logs an error-level message.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {{
        if cfg!(not(test)) {
            $crate::utils::log::log($crate::utils::log::Level::Error, &format!($($arg)*))
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering() {
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
    }

    #[test]
    fn level_display_is_padded() {
        assert_eq!(format!("[{:5}]", Level::Info), "[INFO ]");
        assert_eq!(format!("[{:5}]", Level::Warn), "[WARN ]");
        assert_eq!(format!("[{:5}]", Level::Error), "[ERROR]");
        assert_eq!(format!("{:>5}", Level::Warn), " WARN");
        assert_eq!(Level::Info.to_string(), "INFO");
    }

    #[test]
    fn days_to_date_known_dates() {
        assert_eq!(days_to_date(0), (1970, 1, 1));
        // 2024-02-29 (leap day)
        assert_eq!(days_to_date(19782), (2024, 2, 29));
        assert_eq!(days_to_date(19783), (2024, 3, 1));
    }

    #[test]
    fn timestamp_format() {
        let at = Duration::from_secs(19723 * 86400 + 3 * 3600 + 4 * 60 + 5)
            + Duration::from_millis(67);
        assert_eq!(format_timestamp(at), "2024-01-01 03:04:05.067");
        assert_eq!(format_timestamp(Duration::ZERO), "1970-01-01 00:00:00.000");
    }

    #[test]
    fn timestamp_env_values() {
        assert_eq!(timestamps_enabled(None), None);
        assert_eq!(timestamps_enabled(Some("0")), Some(false));
        assert_eq!(timestamps_enabled(Some(" False ")), Some(false));
        assert_eq!(timestamps_enabled(Some("1")), Some(true));
        assert_eq!(timestamps_enabled(Some("maybe")), None);
    }

    #[test]
    fn macros_expand_in_tests() {
        crate::info!("value {}", 1);
        crate::warn!("value {}", 2);
        crate::error!("value {}", 3);
    }
}
