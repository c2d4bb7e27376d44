//! Error types for the bundling pipeline.
//!
//! Every failure class from resolution through writing is a variant here.
//! Nothing escapes the orchestrator: `bundle()` converts errors into the
//! caller-facing list of message strings.

use std::path::PathBuf;

use thiserror::Error;

use skiff_pack::Env;

pub type Result<T> = std::result::Result<T, BundleError>;

#[derive(Debug, Error)]
pub enum BundleError {
    /// A package name failed to resolve.
    #[error("unknown package: {name}")]
    Resolution { name: String },

    /// A dependency back-edge was found during load ordering.
    #[error("circular dependency between packages {a} and {b}")]
    Cycle { a: String, b: String },

    /// An extension handler failed or emitted invalid options.
    #[error("error processing '{source_path}' in {package}: {source}")]
    Handler {
        package: String,
        source_path: String,
        #[source]
        source: skiff_pack::Error,
    },

    /// An HTML fragment was aggregated into the server environment.
    #[error("{kind} section can only be emitted to the client (package {package})")]
    FragmentOnServer { kind: String, package: String },

    /// Two resources want the same serve path in one environment.
    #[error("serve path conflict: '{serve_path}' emitted twice for the {env}")]
    PathConflict { serve_path: String, env: Env },

    /// The transport-code linker rejected its input.
    #[error("linker failed for {package}: {message}")]
    Link { package: String, message: String },

    /// A minifier collaborator rejected its input.
    #[error("{kind} minification failed: {message}")]
    Minify { kind: String, message: String },

    /// The app.html template failed to expand.
    #[error("failed to expand app.html template: {0}")]
    Template(String),

    /// I/O failure, with the path that was being touched.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Package model or loading failure.
    #[error(transparent)]
    Pack(#[from] skiff_pack::Error),
}

impl BundleError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BundleError::Io {
            path: path.into(),
            source,
        }
    }

    /// Render the full cause chain into one message.
    pub fn render(&self) -> String {
        let mut message = self.to_string();
        let mut cause: Option<&dyn std::error::Error> = std::error::Error::source(self);
        while let Some(err) = cause {
            message.push_str("\n  caused by: ");
            message.push_str(&err.to_string());
            cause = err.source();
        }
        message
    }
}
