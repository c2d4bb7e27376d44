//! Error types for package loading and resource emission.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure, with the path that was being touched.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A package descriptor failed to parse or carried invalid fields.
    #[error("invalid package descriptor '{}': {message}", path.display())]
    Descriptor { path: PathBuf, message: String },

    /// A release manifest failed to parse.
    #[error("invalid release manifest '{}': {message}", path.display())]
    ReleaseManifest { path: PathBuf, message: String },

    /// An ignore pattern source failed to compile.
    #[error("invalid ignore pattern '{source_text}': {message}")]
    Pattern {
        source_text: String,
        message: String,
    },

    /// A handler passed inconsistent emit options.
    #[error("invalid resource emission: {0}")]
    Emit(String),

    /// A package declares native module dependencies but its prebuilt
    /// module tree is missing.
    #[error("package '{package}' declares native modules but '{}' does not exist", path.display())]
    MissingNativeModules { package: String, path: PathBuf },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
