//! Optional JSON trace logging for arbitration decisions.
//!
//! The arbiter runs inside a host process it does not own, so traces go to a
//! file rather than the host's console.

use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_subscriber::fmt::time::UtcTime;

use crate::config::LogConfig;

const TRACE_LOG_ENV: &str = "NARRATOR_TRACE_LOG";

static TRACING_INIT: OnceLock<PathBuf> = OnceLock::new();

/// Trace file location: `NARRATOR_TRACE_LOG`, then the config value, then the
/// temp dir.
#[must_use]
pub fn tracing_log_path(config: &LogConfig) -> PathBuf {
    env::var_os(TRACE_LOG_ENV)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .or_else(|| config.trace_path.clone())
        .unwrap_or_else(|| env::temp_dir().join("narrator_trace.jsonl"))
}

/// Tracing is on when the config enables it or a trace file is named through
/// `NARRATOR_TRACE_LOG`.
#[must_use]
pub fn tracing_enabled(config: &LogConfig) -> bool {
    config.enabled
        || env::var_os(TRACE_LOG_ENV).is_some_and(|path| !path.is_empty())
}

fn install_json_subscriber(path: &Path) -> bool {
    let Ok(file) = OpenOptions::new().create(true).append(true).open(path) else {
        return false;
    };
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(file)
        .with_current_span(false)
        .with_span_list(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).is_ok()
}

fn init_tracing_once(config: &LogConfig, once: &OnceLock<PathBuf>) {
    if !tracing_enabled(config) || once.get().is_some() {
        return;
    }
    let path = tracing_log_path(config);
    if install_json_subscriber(&path) {
        let _ = once.set(path);
    }
}

/// Install the global JSON subscriber once per process when logging is enabled.
pub fn init_tracing(config: &LogConfig) {
    init_tracing_once(config, &TRACING_INIT);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn unique_trace_path(suffix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be after epoch")
            .as_nanos();
        env::temp_dir().join(format!("narrator-trace-{suffix}-{nanos}.jsonl"))
    }

    #[test]
    fn tracing_log_path_prefers_env_over_config() {
        let _guard = env_lock().lock().expect("env lock");
        let env_path = unique_trace_path("env");
        let config = LogConfig {
            enabled: true,
            trace_path: Some(unique_trace_path("config")),
        };
        unsafe {
            env::set_var("NARRATOR_TRACE_LOG", &env_path);
        }
        assert_eq!(tracing_log_path(&config), env_path);
        unsafe {
            env::remove_var("NARRATOR_TRACE_LOG");
        }
        assert_eq!(tracing_log_path(&config), config.trace_path.clone().unwrap_or_default());
    }

    #[test]
    fn tracing_log_path_defaults_to_temp_dir() {
        let _guard = env_lock().lock().expect("env lock");
        unsafe {
            env::remove_var("NARRATOR_TRACE_LOG");
        }
        let expected = env::temp_dir().join("narrator_trace.jsonl");
        assert_eq!(tracing_log_path(&LogConfig::default()), expected);
    }

    #[test]
    fn disabled_logging_leaves_once_unset() {
        let _guard = env_lock().lock().expect("env lock");
        unsafe {
            env::remove_var("NARRATOR_TRACE_LOG");
        }
        let once = OnceLock::new();
        init_tracing_once(&LogConfig::default(), &once);
        assert!(once.get().is_none());
    }

    #[test]
    fn trace_log_env_enables_tracing_without_config_flag() {
        let _guard = env_lock().lock().expect("env lock");
        let config = LogConfig::default();
        unsafe {
            env::set_var("NARRATOR_TRACE_LOG", unique_trace_path("flag"));
        }
        assert!(tracing_enabled(&config));
        unsafe {
            env::set_var("NARRATOR_TRACE_LOG", "");
        }
        assert!(!tracing_enabled(&config));
        assert_eq!(
            tracing_log_path(&config),
            env::temp_dir().join("narrator_trace.jsonl")
        );
        unsafe {
            env::remove_var("NARRATOR_TRACE_LOG");
        }
        assert!(!tracing_enabled(&config));
        assert!(tracing_enabled(&LogConfig {
            enabled: true,
            trace_path: None,
        }));
    }

    #[test]
    fn enabled_logging_creates_trace_file() {
        let _guard = env_lock().lock().expect("env lock");
        unsafe {
            env::remove_var("NARRATOR_TRACE_LOG");
        }
        let path = unique_trace_path("init");
        let config = LogConfig {
            enabled: true,
            trace_path: Some(path.clone()),
        };
        let once = OnceLock::new();
        init_tracing_once(&config, &once);
        assert!(path.exists());
        assert!(once.get().is_none_or(|installed| installed == &path));
        let _ = fs::remove_file(&path);
    }
}
