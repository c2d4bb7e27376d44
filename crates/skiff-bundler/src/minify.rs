//! Client asset minification.
//!
//! The driver concatenates the bundle's client JavaScript and
//! stylesheets, hands each blob to the corresponding minifier
//! collaborator, and replaces the originals with one content-addressed
//! cacheable entry per kind.
//!
//! Minifiers are pure byte-to-byte collaborators. The built-in
//! [`LightningCssMinifier`] performs real stylesheet compression; the
//! built-in [`StripJsMinifier`] only removes comment and blank lines,
//! leaving heavier JavaScript compression to an external collaborator.

use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, StyleSheet};
use tracing::debug;

use skiff_pack::Env;

use crate::bundle::Bundle;
use crate::error::{BundleError, Result};
use crate::fingerprint::sha1_hex;
use crate::manifest::{ManifestEntry, ManifestKind};

/// JavaScript minifier contract: pure bytes to bytes.
pub trait JsMinifier {
    fn minify(&self, source: &[u8]) -> std::result::Result<Vec<u8>, String>;
}

/// CSS minifier contract: pure bytes to bytes.
pub trait CssMinifier {
    fn minify(&self, source: &[u8]) -> std::result::Result<Vec<u8>, String>;
}

/// Conservative JavaScript reducer: drops lines that are entirely
/// comments or whitespace. Never touches code lines, so it is safe
/// without parsing.
pub struct StripJsMinifier;

impl JsMinifier for StripJsMinifier {
    fn minify(&self, source: &[u8]) -> std::result::Result<Vec<u8>, String> {
        let text =
            std::str::from_utf8(source).map_err(|e| format!("js is not UTF-8: {e}"))?;
        let mut out = String::with_capacity(text.len());
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("//") {
                continue;
            }
            out.push_str(line.trim_end());
            out.push('\n');
        }
        Ok(out.into_bytes())
    }
}

/// Stylesheet minification through lightningcss.
pub struct LightningCssMinifier;

impl CssMinifier for LightningCssMinifier {
    fn minify(&self, source: &[u8]) -> std::result::Result<Vec<u8>, String> {
        let text =
            std::str::from_utf8(source).map_err(|e| format!("css is not UTF-8: {e}"))?;
        let mut stylesheet = StyleSheet::parse(text, ParserOptions::default())
            .map_err(|e| format!("failed to parse css: {e}"))?;
        stylesheet
            .minify(MinifyOptions::default())
            .map_err(|e| format!("failed to minify css: {e}"))?;
        let result = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                ..PrinterOptions::default()
            })
            .map_err(|e| format!("failed to print css: {e}"))?;
        Ok(result.code.into_bytes())
    }
}

/// Replace the client JS and CSS tables with one minified,
/// content-addressed entry each.
pub(crate) fn minify_client(
    bundle: &mut Bundle,
    js: &dyn JsMinifier,
    css: &dyn CssMinifier,
) -> Result<()> {
    let js_names = std::mem::take(&mut bundle.js[Env::Client]);
    if !js_names.is_empty() {
        let joined = concat_bodies(bundle, &js_names, b"\n;\n")?;
        let minified = js.minify(&joined).map_err(|message| BundleError::Minify {
            kind: "js".to_string(),
            message,
        })?;
        install_cacheable(bundle, minified, "js", ManifestKind::Js);
        for name in &js_names {
            bundle.files.client.shift_remove(name);
        }
    }

    let css_names = std::mem::take(&mut bundle.css);
    if !css_names.is_empty() {
        let joined = concat_bodies(bundle, &css_names, b"\n")?;
        let minified = css.minify(&joined).map_err(|message| BundleError::Minify {
            kind: "css".to_string(),
            message,
        })?;
        install_cacheable(bundle, minified, "css", ManifestKind::Css);
        for name in &css_names {
            bundle.files.client.shift_remove(name);
        }
    }

    Ok(())
}

fn concat_bodies(bundle: &Bundle, names: &[String], joiner: &[u8]) -> Result<Vec<u8>> {
    let mut joined = Vec::new();
    for (i, name) in names.iter().enumerate() {
        let body = bundle.files.client.get(name).ok_or_else(|| BundleError::Minify {
            kind: "client".to_string(),
            message: format!("aggregated file '{name}' is missing from the client table"),
        })?;
        if i > 0 {
            joined.extend_from_slice(joiner);
        }
        joined.extend_from_slice(body);
    }
    Ok(joined)
}

fn install_cacheable(bundle: &mut Bundle, contents: Vec<u8>, ext: &str, kind: ManifestKind) {
    let hash = sha1_hex(&contents);
    let serve_path = format!("/{hash}.{ext}");
    let size = contents.len() as u64;
    debug!(path = %serve_path, size, "installed minified client {ext}");
    bundle
        .files
        .client_cacheable
        .insert(serve_path.clone(), contents);
    bundle.manifest.push(ManifestEntry::cacheable(
        format!("static_cacheable{serve_path}"),
        kind,
        serve_path,
        size,
        hash,
    ));
}
