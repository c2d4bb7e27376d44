//! Packages, source handlers, and the resource emit interface.
//!
//! A [`Package`] is the unit of reuse: it contributes source files per
//! role and environment, declares which other packages it uses and which
//! symbols it exports, and may register extension handlers that turn a
//! source file into emitted resources. The unnamed package is the
//! application itself.
//!
//! Packages are immutable once loaded. Computed exports produced during
//! linking live in the bundler's exports registry, not on the package.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use path_clean::PathClean;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Error, Result};
use crate::fsutil;
use crate::resource::ResourceKind;
use crate::role::{Env, PerEnv, PerRole, Role};

/// Stable identity of a loaded package within one bundling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(u32);

impl PackageId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pkg#{}", self.0)
    }
}

/// Where the bytes of an emitted resource come from.
#[derive(Debug, Clone)]
pub enum DataSource {
    /// Raw bytes supplied by the handler.
    Bytes(Vec<u8>),
    /// UTF-8 text supplied by the handler.
    Text(String),
    /// Read from an explicit file on disk.
    File(PathBuf),
    /// Read from the package file that corresponds to the serve path.
    FromServePath,
}

/// One resource emission requested by an extension handler.
///
/// `kind` and `envs` are mandatory; `serve_path` is mandatory for every
/// kind except head/body fragments, which must not carry one.
#[derive(Debug, Clone)]
pub struct EmitOptions {
    pub kind: ResourceKind,
    pub envs: Vec<Env>,
    pub serve_path: Option<String>,
    pub source: DataSource,
}

impl EmitOptions {
    /// A single-environment emission backed by a file on disk.
    pub fn file(kind: ResourceKind, env: Env, serve_path: &str, path: &Path) -> Self {
        Self {
            kind,
            envs: vec![env],
            serve_path: Some(serve_path.to_string()),
            source: DataSource::File(path.to_path_buf()),
        }
    }

    /// Check the shape rules before any bytes are read.
    pub fn validate(&self) -> Result<()> {
        if self.envs.is_empty() {
            return Err(Error::Emit(format!(
                "{} resource targets no environment",
                self.kind
            )));
        }
        if self.kind.is_html_fragment() {
            if self.serve_path.is_some() {
                return Err(Error::Emit(format!(
                    "{} fragments must not set a serve path",
                    self.kind
                )));
            }
            if self.envs.contains(&Env::Server) {
                return Err(Error::Emit(format!(
                    "{} fragments cannot target the server",
                    self.kind
                )));
            }
        } else {
            match self.serve_path.as_deref() {
                Some(path) if path.starts_with('/') => {}
                Some(path) => {
                    return Err(Error::Emit(format!(
                        "serve path '{path}' is not absolute"
                    )));
                }
                None => {
                    return Err(Error::Emit(format!(
                        "{} resource is missing a serve path",
                        self.kind
                    )));
                }
            }
        }
        if matches!(self.source, DataSource::FromServePath) && self.serve_path.is_none() {
            return Err(Error::Emit(
                "cannot infer a source file without a serve path".to_string(),
            ));
        }
        Ok(())
    }
}

/// Receives resource emissions from an extension handler.
pub trait EmitSink {
    fn emit(&mut self, options: EmitOptions) -> Result<()>;
}

/// The source file a handler was invoked for.
#[derive(Debug)]
pub struct HandlerInput<'a> {
    /// Absolute path of the source file on disk.
    pub source_path: &'a Path,
    /// Serve path derived from the package serve root.
    pub serve_path: &'a str,
    /// The environment the file was declared for.
    pub env: Env,
}

/// A package-supplied transformation from one source file to zero or more
/// emitted resources.
pub trait SourceHandler: Send + Sync {
    fn handle(&self, sink: &mut dyn EmitSink, input: &HandlerInput<'_>) -> Result<()>;
}

/// Built-in handler for plain `.js` sources: one js resource, verbatim.
pub struct JsHandler;

impl SourceHandler for JsHandler {
    fn handle(&self, sink: &mut dyn EmitSink, input: &HandlerInput<'_>) -> Result<()> {
        sink.emit(EmitOptions::file(
            ResourceKind::Js,
            input.env,
            input.serve_path,
            input.source_path,
        ))
    }
}

/// Built-in handler for plain `.css` sources: one css resource, verbatim.
pub struct CssHandler;

impl SourceHandler for CssHandler {
    fn handle(&self, sink: &mut dyn EmitSink, input: &HandlerInput<'_>) -> Result<()> {
        sink.emit(EmitOptions::file(
            ResourceKind::Css,
            input.env,
            input.serve_path,
            input.source_path,
        ))
    }
}

/// A reusable unit of application code, or the application itself.
pub struct Package {
    id: PackageId,
    /// `None` for the application package.
    name: Option<String>,
    source_root: PathBuf,
    /// Forward-slash prefix under which this package's resources serve.
    /// Empty for the application, `/packages/<name>` otherwise.
    serve_root: String,
    uses: PerRole<PerEnv<Vec<String>>>,
    sources: PerRole<PerEnv<Vec<String>>>,
    exports: PerRole<PerEnv<Vec<String>>>,
    unordered: FxHashSet<String>,
    native_dependencies: BTreeMap<String, String>,
    handlers: FxHashMap<(Role, Env, String), Arc<dyn SourceHandler>>,
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Package")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("source_root", &self.source_root)
            .finish_non_exhaustive()
    }
}

impl Package {
    pub fn builder(id: PackageId, name: Option<&str>, source_root: impl Into<PathBuf>) -> PackageBuilder {
        PackageBuilder::new(id, name, source_root)
    }

    pub fn id(&self) -> PackageId {
        self.id
    }

    /// The package name; `None` for the application.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The name used in diagnostics.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("the application")
    }

    pub fn is_app(&self) -> bool {
        self.name.is_none()
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn serve_root(&self) -> &str {
        &self.serve_root
    }

    pub fn uses(&self, role: Role, env: Env) -> &[String] {
        &self.uses[role][env]
    }

    pub fn sources(&self, role: Role, env: Env) -> &[String] {
        &self.sources[role][env]
    }

    /// Declared exports: the symbols the linker must keep alive.
    pub fn exports(&self, role: Role, env: Env) -> &[String] {
        &self.exports[role][env]
    }

    /// Whether an edge to `name` is exempt from load ordering.
    pub fn is_unordered(&self, name: &str) -> bool {
        self.unordered.contains(name)
    }

    pub fn native_dependencies(&self) -> &BTreeMap<String, String> {
        &self.native_dependencies
    }

    /// The prebuilt native module tree shipped with the package, when it
    /// declares native dependencies.
    pub fn native_modules_source(&self) -> Option<PathBuf> {
        if self.native_dependencies.is_empty() {
            None
        } else {
            Some(self.source_root.join("node_modules"))
        }
    }

    /// Ensure the declared native modules are present on disk.
    pub fn install_native_modules(&self) -> Result<()> {
        if let Some(dir) = self.native_modules_source() {
            if !dir.is_dir() {
                return Err(Error::MissingNativeModules {
                    package: self.display_name().to_string(),
                    path: dir,
                });
            }
        }
        Ok(())
    }

    pub fn source_handler(
        &self,
        role: Role,
        env: Env,
        ext: &str,
    ) -> Option<&Arc<dyn SourceHandler>> {
        self.handlers.get(&(role, env, ext.to_string()))
    }

    /// All extensions with a registered handler, across every role and
    /// environment.
    pub fn registered_extensions(&self) -> BTreeSet<String> {
        self.handlers.keys().map(|(_, _, ext)| ext.clone()).collect()
    }

    /// Serve path of a source file, derived from the serve root.
    pub fn serve_path_for(&self, rel_path: &str) -> String {
        let rel = rel_path.replace('\\', "/");
        format!("{}/{}", self.serve_root, rel.trim_start_matches('/'))
    }

    /// Resolve the bytes of an emission, validating its shape first.
    pub fn read_emit_data(&self, options: &EmitOptions) -> Result<Vec<u8>> {
        options.validate()?;
        match &options.source {
            DataSource::Bytes(bytes) => Ok(bytes.clone()),
            DataSource::Text(text) => Ok(text.clone().into_bytes()),
            DataSource::File(path) => fs::read(path).map_err(|e| Error::io(path, e)),
            DataSource::FromServePath => {
                let serve_path = options.serve_path.as_deref().unwrap_or_default();
                let rel = serve_path
                    .strip_prefix(&self.serve_root)
                    .filter(|rest| rest.starts_with('/'))
                    .map(|rest| rest.trim_start_matches('/'))
                    .filter(|rest| !rest.is_empty())
                    .ok_or_else(|| {
                        Error::Emit(format!(
                            "serve path '{serve_path}' is outside package serve root '{}'",
                            self.serve_root
                        ))
                    })?;
                // The remainder is handler-controlled; `..` components
                // must not walk out of the package tree.
                let path = self.source_root.join(fsutil::path_from_slash(rel)).clean();
                if !path.starts_with(&self.source_root) {
                    return Err(Error::Emit(format!(
                        "serve path '{serve_path}' escapes the package source tree"
                    )));
                }
                fs::read(&path).map_err(|e| Error::io(path, e))
            }
        }
    }
}

/// Builds an immutable [`Package`].
pub struct PackageBuilder {
    package: Package,
}

impl PackageBuilder {
    fn new(id: PackageId, name: Option<&str>, source_root: impl Into<PathBuf>) -> Self {
        let serve_root = match name {
            Some(name) => format!("/packages/{name}"),
            None => String::new(),
        };
        Self {
            package: Package {
                id,
                name: name.map(str::to_string),
                source_root: source_root.into(),
                serve_root,
                uses: PerRole::default(),
                sources: PerRole::default(),
                exports: PerRole::default(),
                unordered: FxHashSet::default(),
                native_dependencies: BTreeMap::new(),
                handlers: FxHashMap::default(),
            },
        }
    }

    pub fn uses<I, S>(mut self, role: Role, env: Env, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.package.uses[role][env] = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn sources<I, S>(mut self, role: Role, env: Env, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.package.sources[role][env] = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn exports<I, S>(mut self, role: Role, env: Env, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.package.exports[role][env] = symbols.into_iter().map(Into::into).collect();
        self
    }

    pub fn unordered<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.package.unordered = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn native_dependencies(mut self, deps: BTreeMap<String, String>) -> Self {
        self.package.native_dependencies = deps;
        self
    }

    /// Register a handler for one extension across every role and
    /// environment.
    pub fn handler(mut self, ext: &str, handler: Arc<dyn SourceHandler>) -> Self {
        for role in Role::ALL {
            for env in Env::ALL {
                self.package
                    .handlers
                    .insert((role, env, ext.to_string()), Arc::clone(&handler));
            }
        }
        self
    }

    /// Register a handler for one (role, env, extension) slot.
    pub fn handler_for(
        mut self,
        role: Role,
        env: Env,
        ext: &str,
        handler: Arc<dyn SourceHandler>,
    ) -> Self {
        self.package
            .handlers
            .insert((role, env, ext.to_string()), handler);
        self
    }

    /// Install the built-in js and css handlers.
    pub fn default_handlers(self) -> Self {
        self.handler("js", Arc::new(JsHandler))
            .handler("css", Arc::new(CssHandler))
    }

    pub fn build(self) -> Package {
        self.package
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_package() -> Package {
        Package::builder(PackageId::new(1), Some("session"), "/tmp/session")
            .exports(Role::Use, Env::Client, ["Session"])
            .default_handlers()
            .build()
    }

    #[test]
    fn serve_paths_are_rooted_per_package() {
        let pkg = sample_package();
        assert_eq!(pkg.serve_path_for("lib/session.js"), "/packages/session/lib/session.js");

        let app = Package::builder(PackageId::new(0), None, "/tmp/app").build();
        assert_eq!(app.serve_path_for("main.js"), "/main.js");
        assert!(app.is_app());
    }

    #[test]
    fn fragment_emissions_reject_paths_and_server() {
        let head_with_path = EmitOptions {
            kind: ResourceKind::Head,
            envs: vec![Env::Client],
            serve_path: Some("/head.html".to_string()),
            source: DataSource::Text(String::new()),
        };
        assert!(head_with_path.validate().is_err());

        let head_on_server = EmitOptions {
            kind: ResourceKind::Body,
            envs: vec![Env::Server],
            serve_path: None,
            source: DataSource::Text(String::new()),
        };
        assert!(head_on_server.validate().is_err());
    }

    #[test]
    fn non_fragment_requires_absolute_serve_path() {
        let missing = EmitOptions {
            kind: ResourceKind::Js,
            envs: vec![Env::Client],
            serve_path: None,
            source: DataSource::Text(String::new()),
        };
        assert!(missing.validate().is_err());

        let relative = EmitOptions {
            kind: ResourceKind::Js,
            envs: vec![Env::Client],
            serve_path: Some("main.js".to_string()),
            source: DataSource::Text(String::new()),
        };
        assert!(relative.validate().is_err());
    }

    #[test]
    fn emit_data_from_text_and_bytes() {
        let pkg = sample_package();
        let text = EmitOptions {
            kind: ResourceKind::Js,
            envs: vec![Env::Client],
            serve_path: Some("/packages/session/x.js".to_string()),
            source: DataSource::Text("var x;".to_string()),
        };
        assert_eq!(pkg.read_emit_data(&text).unwrap(), b"var x;".to_vec());
    }

    #[test]
    fn emit_data_from_serve_path_stays_inside_package() {
        let pkg = sample_package();
        let outside = EmitOptions {
            kind: ResourceKind::Js,
            envs: vec![Env::Client],
            serve_path: Some("/packages/other/x.js".to_string()),
            source: DataSource::FromServePath,
        };
        assert!(pkg.read_emit_data(&outside).is_err());
    }

    #[test]
    fn emit_data_from_serve_path_rejects_parent_traversal() {
        let pkg = sample_package();
        for serve_path in [
            "/packages/session/../../../etc/passwd",
            "/packages/session/lib/../../../other/x.js",
        ] {
            let escape = EmitOptions {
                kind: ResourceKind::Js,
                envs: vec![Env::Client],
                serve_path: Some(serve_path.to_string()),
                source: DataSource::FromServePath,
            };
            let err = pkg.read_emit_data(&escape).unwrap_err();
            assert!(
                err.to_string().contains("escapes the package source tree"),
                "expected a containment error for '{serve_path}', got: {err}"
            );
        }
    }

    #[test]
    fn emit_data_from_serve_path_allows_contained_dotdot() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("lib")).unwrap();
        std::fs::write(dir.path().join("session.js"), b"Session = {};").unwrap();

        let pkg = Package::builder(PackageId::new(3), Some("session"), dir.path())
            .default_handlers()
            .build();
        // `lib/../session.js` resolves back inside the package.
        let contained = EmitOptions {
            kind: ResourceKind::Js,
            envs: vec![Env::Client],
            serve_path: Some("/packages/session/lib/../session.js".to_string()),
            source: DataSource::FromServePath,
        };
        assert_eq!(
            pkg.read_emit_data(&contained).unwrap(),
            b"Session = {};".to_vec()
        );
    }

    #[test]
    fn missing_native_modules_dir_is_an_error() {
        let pkg = Package::builder(PackageId::new(2), Some("mongo"), "/nonexistent/mongo")
            .native_dependencies(BTreeMap::from([(
                "mongodb".to_string(),
                "1.0.0".to_string(),
            )]))
            .build();
        assert!(pkg.install_native_modules().is_err());
    }
}
