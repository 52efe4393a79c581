//! Core library for mip: URL rewriting, manifest install, content fetch and hash verification.
//! Used by the CLI binary; everything is blocking and single-threaded.

pub mod config;
pub mod download;
pub mod error_handling;
pub mod http_client;
pub mod install;
pub mod integrity;
pub mod manifest;
pub mod url;
pub mod utils;

// Re-export main API for CLI
pub use config::{find_lib_dir, load_config, module_search_path, Config, InstallOptions, DEFAULT_INDEX};
pub use download::{download_file, DEFAULT_CHUNK_SIZE};
pub use error_handling::{MipError, Result};
pub use http_client::{HttpClient, HttpResponse, HttpTransport, MemoryTransport};
pub use install::{install, install_with, resolve_target, InstallReport, Installer};
pub use integrity::{check_file, file_short_hash, verify, FileCheck};
pub use manifest::{Manifest, MpyTag, PackageRef};
pub use url::{is_url, rewrite_url};
pub use utils::{log, log_error};
