//! Emitted artifact fragments.

use std::fmt;

/// The kind of a bundled resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// JavaScript to be loaded in order.
    Js,
    /// A stylesheet (client only; server stylesheets are discarded).
    Css,
    /// An HTML fragment appended to the document head (client only).
    Head,
    /// An HTML fragment appended to the document body (client only).
    Body,
    /// An opaque asset served verbatim.
    Static,
}

impl ResourceKind {
    /// Head and body fragments have no serve path of their own.
    pub fn is_html_fragment(self) -> bool {
        matches!(self, ResourceKind::Head | ResourceKind::Body)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Js => "js",
            ResourceKind::Css => "css",
            ResourceKind::Head => "head",
            ResourceKind::Body => "body",
            ResourceKind::Static => "static",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One emitted artifact fragment.
///
/// Resources are append-only within a package bundling record; their order
/// within an environment is preserved end-to-end and defines the in-bundle
/// load order.
#[derive(Debug, Clone)]
pub struct Resource {
    pub kind: ResourceKind,
    pub data: Vec<u8>,
    /// Absolute forward-slash path at which the resource wants to be
    /// served. `None` for head/body fragments.
    pub serve_path: Option<String>,
}

impl Resource {
    pub fn new(kind: ResourceKind, data: Vec<u8>, serve_path: impl Into<String>) -> Self {
        Self {
            kind,
            data,
            serve_path: Some(serve_path.into()),
        }
    }

    pub fn fragment(kind: ResourceKind, data: Vec<u8>) -> Self {
        debug_assert!(kind.is_html_fragment());
        Self {
            kind,
            data,
            serve_path: None,
        }
    }

    /// The serve path, for resource kinds that always carry one.
    pub fn serve_path(&self) -> &str {
        self.serve_path.as_deref().unwrap_or_default()
    }
}
