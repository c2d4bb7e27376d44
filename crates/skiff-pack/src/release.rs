//! Releases and release manifests.
//!
//! A release pins the versions of warehouse packages that go into a
//! bundle. Local-only builds use [`Release::None`] and resolve packages
//! from the application's own `packages/` directory alone.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The release a bundle is built against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Release {
    /// Local-only build; no warehouse versions are pinned.
    None,
    /// A named release with a version manifest.
    Named(String),
}

impl Release {
    pub fn parse(s: &str) -> Self {
        if s == "none" {
            Release::None
        } else {
            Release::Named(s.to_string())
        }
    }

    /// The release name recorded in `app.json`, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            Release::None => None,
            Release::Named(name) => Some(name),
        }
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name().unwrap_or("none"))
    }
}

/// Pinned package versions for a release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseManifest {
    #[serde(default)]
    pub packages: BTreeMap<String, String>,
}

impl ReleaseManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| Error::ReleaseManifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// The pinned version of a package, if the release names it.
    pub fn version_of(&self, package: &str) -> Option<&str> {
        self.packages.get(package).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_none_and_named() {
        assert_eq!(Release::parse("none"), Release::None);
        assert_eq!(
            Release::parse("0.4.2"),
            Release::Named("0.4.2".to_string())
        );
        assert_eq!(Release::parse("0.4.2").name(), Some("0.4.2"));
        assert_eq!(Release::None.name(), None);
    }

    #[test]
    fn manifest_lookup() {
        let manifest: ReleaseManifest =
            serde_json::from_str(r#"{"packages": {"session": "1.2.0"}}"#).unwrap();
        assert_eq!(manifest.version_of("session"), Some("1.2.0"));
        assert_eq!(manifest.version_of("absent"), None);
    }
}
