//! Package manifest (`package.json` served by the index or a repository) and
//! classification of package references.

use std::fmt;
use std::fs::File;
use std::io::BufReader;

use serde::Deserialize;

use crate::error_handling::{MipError, Result};
use crate::http_client::HttpTransport;
use crate::url;
use crate::utils;

pub const MANIFEST_NAME: &str = "package.json";
pub const LATEST: &str = "latest";

/// Files and dependencies of one package. Unknown keys are ignored; missing lists are empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Manifest {
    /// (target-relative path, short hash), fetched from the index by hash
    #[serde(default)]
    pub hashes: Vec<(String, String)>,
    /// (target-relative path, absolute or manifest-relative URL)
    #[serde(default)]
    pub urls: Vec<(String, String)>,
    /// (package reference, version); a null version means latest
    #[serde(default)]
    pub deps: Vec<(String, Option<String>)>,
    #[serde(default)]
    pub version: Option<String>,
}

impl Manifest {
    pub fn from_slice(bytes: &[u8]) -> std::result::Result<Self, String> {
        serde_json::from_slice(bytes).map_err(|e| e.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty() && self.urls.is_empty() && self.deps.is_empty()
    }
}

/// Bytecode selector in index manifest URLs: a `.mpy` format version, or plain source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MpyTag {
    Source,
    Bytecode(u8),
}

impl MpyTag {
    /// Bytecode when binaries are preferred and the host reports an mpy version.
    pub fn select(prefer_binary: bool, host_mpy: Option<u32>) -> Self {
        match host_mpy {
            Some(v) if prefer_binary => MpyTag::Bytecode((v & 0xFF) as u8),
            _ => MpyTag::Source,
        }
    }
}

impl fmt::Display for MpyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MpyTag::Source => f.write_str("py"),
            MpyTag::Bytecode(v) => write!(f, "{}", v),
        }
    }
}

/// What a package argument points at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PackageRef {
    /// Direct `.py` / `.mpy` URL installed as `target/<basename>`
    SingleFile(String),
    /// URL of a manifest (may still be `github:` shorthand)
    ManifestUrl(String),
    /// Bare name looked up on the index
    Indexed(String),
}

impl PackageRef {
    pub fn classify(package: &str) -> Self {
        if !url::is_url(package) {
            return PackageRef::Indexed(package.to_string());
        }
        if package.ends_with(".py") || package.ends_with(".mpy") {
            return PackageRef::SingleFile(package.to_string());
        }
        if package.ends_with(".json") {
            return PackageRef::ManifestUrl(package.to_string());
        }
        let mut manifest_url = package.to_string();
        if !manifest_url.ends_with('/') {
            manifest_url.push('/');
        }
        manifest_url.push_str(MANIFEST_NAME);
        PackageRef::ManifestUrl(manifest_url)
    }
}

/// `<index>/package/<tag>/<name>/<version>.json`
pub fn index_manifest_url(index: &str, tag: MpyTag, name: &str, version: Option<&str>) -> String {
    let version = version.filter(|v| !v.is_empty()).unwrap_or(LATEST);
    format!("{}/package/{}/{}/{}.json", index, tag, name, version)
}

/// `<index>/file/<hash[0:2]>/<hash>`
pub fn index_file_url(index: &str, short_hash: &str) -> String {
    let prefix = short_hash.get(..2).unwrap_or(short_hash);
    format!("{}/file/{}/{}", index, prefix, short_hash)
}

/// Fetch and parse a manifest. `file://` URLs are read from disk; anything else is
/// rewritten (`version` as branch for `github:`) and fetched over HTTP.
pub fn fetch_manifest<T: HttpTransport + ?Sized>(
    transport: &T,
    manifest_url: &str,
    version: Option<&str>,
) -> Result<Manifest> {
    if let Some(path) = url::file_path(manifest_url) {
        utils::log(&format!("Reading manifest {}", path));
        let file = File::open(path).map_err(|e| MipError::ManifestUnavailable {
            url: manifest_url.to_string(),
            source: format!("File {} not found: {}", path, e),
        })?;
        return serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            MipError::ManifestUnavailable {
                url: manifest_url.to_string(),
                source: e.to_string(),
            }
        });
    }

    let fetch_url = url::rewrite_url(manifest_url, version, None)?;
    utils::log(&format!("Fetching manifest {}", fetch_url));
    let response = transport
        .get(&fetch_url)
        .map_err(|e| MipError::ManifestUnavailable {
            url: manifest_url.to_string(),
            source: e,
        })?;
    if !response.is_ok() {
        return Err(MipError::ManifestUnavailable {
            url: manifest_url.to_string(),
            source: format!("HTTP {}", response.status()),
        });
    }
    response
        .json::<Manifest>()
        .map_err(|e| MipError::ManifestUnavailable {
            url: manifest_url.to_string(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::MemoryTransport;

    #[test]
    fn test_manifest_missing_keys_and_unknown_keys() {
        let m = Manifest::from_slice(br#"{"v": 1, "name": "x"}"#).unwrap();
        assert!(m.is_empty());

        let m = Manifest::from_slice(
            br#"{
                "hashes": [["foo/__init__.py", "2cf24dba"]],
                "urls": [["bar.py", "github:a/b/bar.py"]],
                "deps": [["baz", "1.0"], ["qux", null]],
                "version": "0.3"
            }"#,
        )
        .unwrap();
        assert_eq!(m.hashes, vec![("foo/__init__.py".into(), "2cf24dba".into())]);
        assert_eq!(m.urls[0].1, "github:a/b/bar.py");
        assert_eq!(m.deps[0], ("baz".into(), Some("1.0".into())));
        assert_eq!(m.deps[1], ("qux".into(), None));
        assert_eq!(m.version.as_deref(), Some("0.3"));
    }

    #[test]
    fn test_manifest_malformed_entry_rejected() {
        assert!(Manifest::from_slice(br#"{"hashes": [["only-path"]]}"#).is_err());
        assert!(Manifest::from_slice(br#"{"deps": "nope"}"#).is_err());
    }

    #[test]
    fn test_classify() {
        assert_eq!(PackageRef::classify("aioble"), PackageRef::Indexed("aioble".into()));
        assert_eq!(
            PackageRef::classify("github:a/b/x.py"),
            PackageRef::SingleFile("github:a/b/x.py".into())
        );
        assert_eq!(
            PackageRef::classify("https://h/x.mpy"),
            PackageRef::SingleFile("https://h/x.mpy".into())
        );
        assert_eq!(
            PackageRef::classify("github:a/b"),
            PackageRef::ManifestUrl("github:a/b/package.json".into())
        );
        assert_eq!(
            PackageRef::classify("https://h/pkg/"),
            PackageRef::ManifestUrl("https://h/pkg/package.json".into())
        );
        assert_eq!(
            PackageRef::classify("file:///tmp/other.json"),
            PackageRef::ManifestUrl("file:///tmp/other.json".into())
        );
    }

    #[test]
    fn test_index_urls() {
        assert_eq!(
            index_manifest_url("https://micropython.org/pi/v2", MpyTag::Source, "aioble", None),
            "https://micropython.org/pi/v2/package/py/aioble/latest.json"
        );
        assert_eq!(
            index_manifest_url("https://i", MpyTag::Bytecode(6), "ssd1306", Some("0.1.0")),
            "https://i/package/6/ssd1306/0.1.0.json"
        );
        assert_eq!(index_file_url("https://i", "2cf24dba"), "https://i/file/2c/2cf24dba");
    }

    #[test]
    fn test_mpy_tag_select() {
        assert_eq!(MpyTag::select(true, Some(0x0106)), MpyTag::Bytecode(6));
        assert_eq!(MpyTag::select(false, Some(6)), MpyTag::Source);
        assert_eq!(MpyTag::select(true, None), MpyTag::Source);
        assert_eq!(MpyTag::Source.to_string(), "py");
    }

    #[test]
    fn test_fetch_manifest_github_uses_version_as_branch() {
        let transport = MemoryTransport::new().with(
            "https://raw.githubusercontent.com/a/b/v2/package.json",
            r#"{"urls": [["x.py", "x.py"]]}"#,
        );
        let m = fetch_manifest(&transport, "github:a/b/package.json", Some("v2")).unwrap();
        assert_eq!(m.urls.len(), 1);
    }

    #[test]
    fn test_fetch_manifest_failures() {
        let mut transport = MemoryTransport::new();
        transport.insert("https://h/bad.json", 200, "{not json");
        assert!(matches!(
            fetch_manifest(&transport, "https://h/missing.json", None),
            Err(MipError::ManifestUnavailable { .. })
        ));
        assert!(matches!(
            fetch_manifest(&transport, "https://h/bad.json", None),
            Err(MipError::ManifestUnavailable { .. })
        ));
        assert!(matches!(
            fetch_manifest(&transport, "file:///definitely/not/here.json", None),
            Err(MipError::ManifestUnavailable { .. })
        ));
    }
}
