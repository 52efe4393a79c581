//! Install options, optional `.miprc` (JSON) config, and the host module search path.
//! Precedence: CLI flags, then env, then `.miprc` in the working dir, then `~/.miprc`.

use std::path::{Path, PathBuf};

use crate::download::DEFAULT_CHUNK_SIZE;

/// Public MicroPython package index.
pub const DEFAULT_INDEX: &str = "https://micropython.org/pi/v2";
/// Used when `MICROPYPATH` is not set (MicroPython unix port default).
pub const DEFAULT_SEARCH_PATH: &str = "~/.micropython/lib:/usr/lib/micropython";
pub const LIB_DIR_SUFFIX: &str = "/lib";
pub const CONFIG_FILE_NAME: &str = ".miprc";

/// Settings for one install run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallOptions {
    /// Index base URL, without trailing `/`
    pub index: String,
    /// Target directory; `None` means pick the lib dir from the search path
    pub target: Option<String>,
    /// Version of the top-level package (branch for `github:` references)
    pub version: Option<String>,
    /// Ask the index for precompiled `.mpy` files when `mpy_version` is known
    pub prefer_binary: bool,
    /// Bytecode version the device runs
    pub mpy_version: Option<u32>,
    /// Chunk size for copying and hashing
    pub chunk_size: usize,
    /// No progress lines on stdout
    pub quiet: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            index: DEFAULT_INDEX.to_string(),
            target: None,
            version: None,
            prefer_binary: true,
            mpy_version: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            quiet: false,
        }
    }
}

impl InstallOptions {
    /// Options from config files and env, layered over the defaults.
    pub fn from_env_and_config(dir: &Path) -> Self {
        let cfg = load_config(dir);
        let mut opts = InstallOptions::default();
        if let Some(index) = env_non_empty("MIP_INDEX").or(cfg.index) {
            opts.index = index;
        }
        opts.target = env_non_empty("MIP_TARGET").or(cfg.target);
        opts.mpy_version = env_non_empty("MIP_MPY_VERSION")
            .and_then(|v| v.parse::<u32>().ok())
            .or(cfg.mpy_version);
        if let Some(prefer) = cfg.prefer_binary {
            opts.prefer_binary = prefer;
        }
        if let Some(chunk) = cfg.chunk_size.filter(|&c| c > 0) {
            opts.chunk_size = chunk;
        }
        opts
    }

    /// Index URL with any trailing `/` removed; empty falls back to the default.
    pub fn index_url(&self) -> &str {
        let trimmed = self.index.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            DEFAULT_INDEX
        } else {
            trimmed
        }
    }
}

/// Optional config from file. CLI and env override these.
#[derive(Default, Debug, PartialEq, Eq)]
pub struct Config {
    pub index: Option<String>,
    pub target: Option<String>,
    pub prefer_binary: Option<bool>,
    pub mpy_version: Option<u32>,
    pub chunk_size: Option<usize>,
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Load config from .miprc in dir, then ~/.miprc. Missing or invalid file = default.
pub fn load_config(dir: &Path) -> Config {
    let mut candidates = vec![dir.join(CONFIG_FILE_NAME)];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(CONFIG_FILE_NAME));
    }
    for path in &candidates {
        if path.is_file() {
            return read_config(path);
        }
    }
    Config::default()
}

fn read_config(path: &Path) -> Config {
    let mut cfg = Config::default();
    let Ok(s) = std::fs::read_to_string(path) else {
        return cfg;
    };
    let Ok(v) = serde_json::from_str::<serde_json::Value>(&s) else {
        return cfg;
    };
    if let Some(i) = v.get("index").and_then(|x| x.as_str()) {
        cfg.index = Some(i.trim_end_matches('/').to_string());
    }
    if let Some(t) = v.get("target").and_then(|x| x.as_str()) {
        cfg.target = Some(expand_home(t));
    }
    if let Some(b) = v.get("preferBinary").and_then(|x| x.as_bool()) {
        cfg.prefer_binary = Some(b);
    }
    if let Some(m) = v.get("mpyVersion").and_then(|x| x.as_u64()) {
        cfg.mpy_version = u32::try_from(m).ok();
    }
    if let Some(c) = v.get("chunkSize").and_then(|x| x.as_u64()) {
        cfg.chunk_size = usize::try_from(c).ok();
    }
    cfg
}

/// Replace a leading `~` with the home directory.
pub fn expand_home(path: &str) -> String {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return path.to_string(),
    };
    match dirs::home_dir() {
        Some(home) => format!("{}{}", home.to_string_lossy(), rest),
        None => path.to_string(),
    }
}

/// Host module search path: `MICROPYPATH` split on `:`, or the unix-port default.
pub fn module_search_path() -> Vec<String> {
    let raw = env_non_empty("MICROPYPATH").unwrap_or_else(|| DEFAULT_SEARCH_PATH.to_string());
    raw.split(':')
        .filter(|p| !p.is_empty())
        .map(expand_home)
        .collect()
}

/// First search path entry ending in `/lib`.
pub fn find_lib_dir<S: AsRef<str>>(search_path: &[S]) -> Option<String> {
    search_path
        .iter()
        .map(|p| p.as_ref())
        .find(|p| p.ends_with(LIB_DIR_SUFFIX))
        .map(String::from)
}

pub fn config_path_in(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE_NAME)
}
