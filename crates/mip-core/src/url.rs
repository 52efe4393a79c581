//! Package reference and URL rewriting: `github:` shorthand to raw content URLs,
//! relative manifest entries to absolute URLs.

use crate::error_handling::{MipError, Result};

pub const GITHUB_PREFIX: &str = "github:";
pub const FILE_PREFIX: &str = "file://";
pub const GITHUB_RAW_BASE: &str = "https://raw.githubusercontent.com";
pub const DEFAULT_BRANCH: &str = "HEAD";

const URL_PREFIXES: [&str; 4] = ["http://", "https://", GITHUB_PREFIX, FILE_PREFIX];

/// True if `name` starts with a scheme we know how to fetch.
pub fn is_url(name: &str) -> bool {
    URL_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// Local path of a `file://` URL, or `None` for any other scheme.
pub fn file_path(url: &str) -> Option<&str> {
    url.strip_prefix(FILE_PREFIX)
}

/// `github:owner/repo/path...` -> `https://raw.githubusercontent.com/owner/repo/<branch>/path...`
fn rewrite_github(shorthand: &str, branch: Option<&str>) -> String {
    let branch = branch.filter(|b| !b.is_empty()).unwrap_or(DEFAULT_BRANCH);
    let mut parts = shorthand.split('/');
    let owner = parts.next().unwrap_or("");
    let repo = parts.next().unwrap_or("");
    let path: Vec<&str> = parts.collect();
    format!(
        "{}/{}/{}/{}/{}",
        GITHUB_RAW_BASE,
        owner,
        repo,
        branch,
        path.join("/")
    )
}

/// Resolve `reference` into an absolute, fetchable URL.
///
/// `branch` selects the ref for `github:` shorthand (default `HEAD`).
/// Relative references are appended to the directory of `base`, which may itself be
/// `github:` shorthand; the joined result is then rewritten like any other shorthand.
pub fn rewrite_url(reference: &str, branch: Option<&str>, base: Option<&str>) -> Result<String> {
    if let Some(rest) = reference.strip_prefix(GITHUB_PREFIX) {
        return Ok(rewrite_github(rest, branch));
    }
    if is_url(reference) {
        return Ok(reference.to_string());
    }
    let base = base.filter(|b| !b.is_empty()).ok_or_else(|| {
        MipError::configuration(
            "rewrite_url",
            format!("no base URL to resolve {} against", reference),
        )
    })?;
    let joined = join_relative(base, reference);
    match joined.strip_prefix(GITHUB_PREFIX) {
        Some(rest) => Ok(rewrite_github(rest, branch)),
        None => Ok(joined),
    }
}

/// Strip the last `/` segment of `base` and append `relative`.
pub fn join_relative(base: &str, relative: &str) -> String {
    let dir = match base.rfind('/') {
        Some(idx) => &base[..idx],
        None => base,
    };
    format!("{}/{}", dir, relative)
}
