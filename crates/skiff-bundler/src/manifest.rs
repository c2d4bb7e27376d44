//! Machine-readable bundle manifests: `app.json` and `dependencies.json`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Who consumes a manifest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestWhere {
    /// Served to browsers.
    Client,
    /// Consumed by the server runtime itself.
    Internal,
}

/// The kind of a client-visible manifest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestKind {
    Js,
    Css,
    Static,
}

/// One emitted artifact, as recorded in `app.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Bundle-relative path of the artifact.
    pub path: String,
    #[serde(rename = "where")]
    pub location: ManifestWhere,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ManifestKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cacheable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Hex SHA-1 of the artifact contents.
    pub hash: String,
}

impl ManifestEntry {
    /// A content-addressed entry served with a long TTL.
    pub fn cacheable(path: String, kind: ManifestKind, url: String, size: u64, hash: String) -> Self {
        Self {
            path,
            location: ManifestWhere::Client,
            kind: Some(kind),
            cacheable: Some(true),
            url: Some(url),
            size: Some(size),
            hash,
        }
    }

    /// A client entry that must be revalidated on every load.
    pub fn plain(path: String, kind: ManifestKind, url: String, size: u64, hash: String) -> Self {
        Self {
            path,
            location: ManifestWhere::Client,
            kind: Some(kind),
            cacheable: Some(false),
            url: Some(url),
            size: Some(size),
            hash,
        }
    }

    /// An artifact consumed by the server runtime, not served.
    pub fn internal(path: String, hash: String) -> Self {
        Self {
            path,
            location: ManifestWhere::Internal,
            kind: None,
            cacheable: None,
            url: None,
            size: None,
            hash,
        }
    }
}

/// The `app.json` document: what the bundle contains and what the server
/// must load, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppJson {
    pub manifest: Vec<ManifestEntry>,
    pub load: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
}

/// The `dependencies.json` document: every input that fed the bundle,
/// for the development watcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependenciesJson {
    /// Runtime directories the bundle was assembled from.
    pub core: Vec<String>,
    /// Application source files, across all roles.
    pub app: Vec<String>,
    /// Per-package source files, across all roles.
    pub packages: BTreeMap<String, Vec<String>>,
    /// Source extensions the application understands.
    pub extensions: Vec<String>,
    /// Ignore pattern sources, verbatim, for the watcher to recompile.
    pub exclude: Vec<String>,
}
