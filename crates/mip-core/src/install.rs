//! Manifest installer: resolve a package reference, install its hashed files, its URL
//! files, then its dependencies, stopping at the first failure. Files written before a
//! failure stay on disk; re-running skips everything whose hash already matches.

use std::path::Path;

use crate::config::{self, InstallOptions};
use crate::download;
use crate::error_handling::{MipError, Result};
use crate::http_client::{HttpClient, HttpTransport};
use crate::integrity::{self, FileCheck};
use crate::manifest::{self, Manifest, MpyTag, PackageRef};
use crate::url;
use crate::utils;

/// What an install did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Files fetched or copied
    pub downloaded: usize,
    /// Hashed files already present with matching content
    pub skipped: usize,
    /// Manifests installed, including dependencies
    pub packages: usize,
}

pub struct Installer<T: HttpTransport> {
    transport: T,
    index: String,
    prefer_binary: bool,
    mpy_version: Option<u32>,
    chunk_size: usize,
    /// Fetch URLs of the manifests currently being installed, outermost first
    in_progress: Vec<String>,
    report: InstallReport,
}

impl<T: HttpTransport> Installer<T> {
    pub fn new(transport: T, options: &InstallOptions) -> Self {
        Self {
            transport,
            index: options.index_url().to_string(),
            prefer_binary: options.prefer_binary,
            mpy_version: options.mpy_version,
            chunk_size: options.chunk_size.max(1),
            in_progress: Vec::new(),
            report: InstallReport::default(),
        }
    }

    pub fn report(&self) -> &InstallReport {
        &self.report
    }

    pub fn into_report(self) -> InstallReport {
        self.report
    }

    /// Install `package` into `target`. `version` is the index version for bare names
    /// and the branch for `github:` references.
    pub fn install_package(&mut self, package: &str, target: &str, version: Option<&str>) -> Result<()> {
        match PackageRef::classify(package) {
            PackageRef::SingleFile(reference) => {
                utils::log(&format!("Downloading {} to {}", reference, target));
                let source = url::rewrite_url(&reference, version, None)?;
                let dest = utils::join_path(target, utils::basename(&reference));
                download::download_file(&self.transport, &source, &dest, self.chunk_size)?;
                self.report.downloaded += 1;
                Ok(())
            }
            PackageRef::ManifestUrl(manifest_url) => {
                utils::log(&format!("Installing {} to {}", manifest_url, target));
                self.install_json(&manifest_url, target, version)
            }
            PackageRef::Indexed(name) => {
                let shown = version.filter(|v| !v.is_empty()).unwrap_or(manifest::LATEST);
                utils::log(&format!(
                    "Installing {} ({}) from {} to {}",
                    name, shown, self.index, target
                ));
                let tag = MpyTag::select(self.prefer_binary, self.mpy_version);
                let manifest_url = manifest::index_manifest_url(&self.index, tag, &name, version);
                self.install_json(&manifest_url, target, version)
            }
        }
    }

    fn install_json(&mut self, manifest_url: &str, target: &str, version: Option<&str>) -> Result<()> {
        // Keyed on the fetch URL: `github:a/b` at two branches are two manifests.
        let key = url::rewrite_url(manifest_url, version, None).unwrap_or_else(|_| manifest_url.to_string());
        if self.in_progress.contains(&key) {
            utils::log(&format!(
                "Dependency cycle: {} is already being installed, skipping",
                key
            ));
            return Ok(());
        }
        let manifest = manifest::fetch_manifest(&self.transport, manifest_url, version)?;
        self.in_progress.push(key);
        let result = self.install_manifest(&manifest, manifest_url, target, version);
        self.in_progress.pop();
        if result.is_ok() {
            self.report.packages += 1;
        }
        result
    }

    fn install_manifest(
        &mut self,
        manifest: &Manifest,
        manifest_url: &str,
        target: &str,
        version: Option<&str>,
    ) -> Result<()> {
        if let Some((target_path, short_hash)) = manifest
            .hashes
            .iter()
            .find(|(_, h)| !integrity::is_valid_short_hash(h))
        {
            return Err(MipError::ManifestUnavailable {
                url: manifest_url.to_string(),
                source: format!("invalid hash {:?} for {}", short_hash, target_path),
            });
        }

        for (target_path, short_hash) in &manifest.hashes {
            let fs_target_path = utils::join_path(target, target_path);
            match integrity::check_file(Path::new(&fs_target_path), short_hash, self.chunk_size) {
                FileCheck::Match => {
                    utils::log(&format!("Exists: {}", fs_target_path));
                    self.report.skipped += 1;
                    continue;
                }
                FileCheck::Unreadable(e) => {
                    utils::log(&format!("Cannot verify {} ({}), fetching", fs_target_path, e));
                }
                FileCheck::Mismatch { .. } | FileCheck::NotFound => {}
            }
            let file_url = manifest::index_file_url(&self.index, short_hash);
            if let Err(e) = download::download_file(&self.transport, &file_url, &fs_target_path, self.chunk_size) {
                utils::log_error(&format!("File not found: {} {}", target_path, short_hash));
                return Err(partial(manifest_url, target_path, e));
            }
            self.report.downloaded += 1;
        }

        for (target_path, file_url) in &manifest.urls {
            let fs_target_path = utils::join_path(target, target_path);
            let fetched = url::rewrite_url(file_url, version, Some(manifest_url)).and_then(|source| {
                download::download_file(&self.transport, &source, &fs_target_path, self.chunk_size)
            });
            if let Err(e) = fetched {
                utils::log_error(&format!("File not found: {} {}", target_path, file_url));
                return Err(partial(manifest_url, target_path, e));
            }
            self.report.downloaded += 1;
        }

        for (dep, dep_version) in &manifest.deps {
            if let Err(e) = self.install_package(dep, target, dep_version.as_deref()) {
                return Err(partial(manifest_url, dep, e));
            }
        }
        Ok(())
    }
}

fn partial(package: &str, step: &str, source: MipError) -> MipError {
    MipError::PartialInstall {
        package: package.to_string(),
        step: step.to_string(),
        source: Box::new(source),
    }
}

/// Target directory from options, or the first `/lib` entry of the module search path.
pub fn resolve_target(options: &InstallOptions) -> Result<String> {
    if let Some(target) = options.target.as_deref().filter(|t| !t.is_empty()) {
        return Ok(target.trim_end_matches('/').to_string());
    }
    config::find_lib_dir(&config::module_search_path()).ok_or_else(|| {
        MipError::configuration("install", "Unable to find lib dir in module search path")
    })
}

/// Install `package` with the given transport. Reports "Done" or a partial-install warning.
pub fn install_with<T: HttpTransport>(
    transport: T,
    package: &str,
    options: &InstallOptions,
) -> Result<InstallReport> {
    if options.quiet {
        utils::set_quiet(true);
    }
    let target = match resolve_target(options) {
        Ok(t) => t,
        Err(e) => {
            utils::log_error(&e.to_string());
            return Err(e);
        }
    };
    let mut installer = Installer::new(transport, options);
    match installer.install_package(package, &target, options.version.as_deref()) {
        Ok(()) => {
            utils::log("Done");
            Ok(installer.into_report())
        }
        Err(e) => {
            utils::log_error(&format!("Package may be partially installed: {}", e));
            Err(e)
        }
    }
}

/// Install `package` over HTTP. Returns true on full success.
pub fn install(package: &str, options: &InstallOptions) -> bool {
    install_with(HttpClient::new(), package, options).is_ok()
}
