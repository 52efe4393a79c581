use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use chrono::Local;

/// Optional append-only log file (unset: logs go to stdout only).
pub const LOG_FILE_ENV: &str = "MIP_LOG_FILE";

static QUIET: AtomicBool = AtomicBool::new(false);

/// Silence stdout logging for the rest of the process (log file still written).
pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

pub fn is_quiet() -> bool {
    if QUIET.load(Ordering::Relaxed) {
        return true;
    }
    if env::var("MIP_QUIET").map(|v| v == "1" || v == "true").unwrap_or(false) {
        return true;
    }
    env::var("MIP_LOG")
        .map(|v| v.to_lowercase() == "quiet" || v.to_lowercase() == "error")
        .unwrap_or(false)
}

pub fn log(message: &str) {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    let log_message = format!("[{}] {}", timestamp, message);

    if !is_quiet() {
        println!("{}", log_message);
    }

    if let Ok(path) = env::var(LOG_FILE_ENV) {
        if path.is_empty() {
            return;
        }
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&path) {
            let _ = writeln!(file, "{}", log_message);
        }
    }
}

pub fn log_error(message: &str) {
    eprintln!("{}", message);
    log(message);
}

/// Join a target root and a manifest-relative path with `/`. No normalization.
pub fn join_path(root: &str, relative: &str) -> String {
    format!("{}/{}", root, relative)
}

/// Last `/`-separated segment of a path or URL.
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
