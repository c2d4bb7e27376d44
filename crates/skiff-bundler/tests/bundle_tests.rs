//! End-to-end bundling tests: real application directories in, bundle
//! trees and manifests out.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use skiff_bundler::{
    bundle, sha1_hex, AppJson, BundleOptions, DependenciesJson, ManifestKind, ManifestWhere,
};
use skiff_pack::{
    DataSource, EmitOptions, EmitSink, Env, HandlerInput, Package, PackageId, ReleaseManifest,
    ResourceKind, Role, SourceHandler, StaticLoader, Warehouse,
};

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn no_minify() -> BundleOptions {
    let mut options = BundleOptions::default();
    options.minify = false;
    options
}

fn run(app_dir: &Path, out: &Path, options: &BundleOptions) -> Vec<String> {
    let loader = Warehouse::new(app_dir, None, ReleaseManifest::default());
    bundle(app_dir, out, &loader, options)
}

fn read_app_json(out: &Path) -> AppJson {
    serde_json::from_slice(&fs::read(out.join("app.json")).unwrap()).unwrap()
}

fn client_js_urls(app_json: &AppJson) -> Vec<String> {
    app_json
        .manifest
        .iter()
        .filter(|e| e.location == ManifestWhere::Client && e.kind == Some(ManifestKind::Js))
        .filter_map(|e| e.url.clone())
        .collect()
}

#[test]
fn hello_world_server_only_app() {
    let dir = TempDir::new().unwrap();
    let app_dir = dir.path().join("app");
    let out = dir.path().join("build");
    write(&app_dir.join("main.js"), "console.log('hi');\n");

    let errors = run(&app_dir, &out, &no_minify());
    assert_eq!(errors, Vec::<String>::new());

    let app_json = read_app_json(&out);
    assert_eq!(app_json.load, ["app/main.js"]);
    assert_eq!(app_json.release, None);
    assert!(app_json
        .manifest
        .iter()
        .any(|e| e.path == "app.html" && e.location == ManifestWhere::Internal));

    assert_eq!(
        fs::read_to_string(out.join("main.js")).unwrap(),
        "require(\"./server/server.js\");\n"
    );
    assert_eq!(
        fs::read_to_string(out.join("app").join("main.js")).unwrap(),
        "console.log('hi');\n"
    );
    assert!(out.join("README").is_file());
    assert!(out.join("server").is_dir());
    // The build area was swapped away.
    assert!(!dir.path().join(".build.build").exists());
}

fn two_package_app(dir: &TempDir) -> (PathBuf, PathBuf) {
    let app_dir = dir.path().join("app");
    let out = dir.path().join("build");
    write(
        &app_dir.join("packages/a/skiff.json"),
        r#"{"name": "a", "sources": {"client": ["a.js"]}, "exports": {"client": ["X"]}}"#,
    );
    write(&app_dir.join("packages/a/a.js"), "X = 1;\n");
    write(
        &app_dir.join("packages/b/skiff.json"),
        r#"{"name": "b", "uses": ["a"], "sources": {"client": ["b.js"]}, "exports": {"client": ["Y"]}}"#,
    );
    write(&app_dir.join("packages/b/b.js"), "Y = X + 1;\n");
    write(&app_dir.join("client/app.js"), "console.log(X, Y);\n");
    (app_dir, out)
}

#[test]
fn linear_chain_links_in_load_order() {
    let dir = TempDir::new().unwrap();
    let (app_dir, out) = two_package_app(&dir);

    let errors = run(&app_dir, &out, &no_minify());
    assert_eq!(errors, Vec::<String>::new());

    let app_json = read_app_json(&out);
    let urls = client_js_urls(&app_json);
    assert_eq!(urls.len(), 4);
    assert!(urls[0].starts_with("/packages/a.js?"));
    assert!(urls[1].starts_with("/packages/b.js?"));
    assert!(urls[2].starts_with("/packages/global-imports.js?"));
    assert!(urls[3].starts_with("/client/app.js?"));

    // b links against a's exports; the app imports from both.
    let b_js =
        fs::read_to_string(out.join("static_cacheable/packages/b.js")).unwrap();
    assert!(b_js.contains("var X = Package[\"a\"][\"X\"];"));
    assert!(b_js.contains("Package[\"b\"] = {"));

    let stub =
        fs::read_to_string(out.join("static_cacheable/packages/global-imports.js")).unwrap();
    assert!(stub.contains("X = Package[\"a\"][\"X\"];"));
    assert!(stub.contains("Y = Package[\"b\"][\"Y\"];"));
}

#[test]
fn manifest_entries_match_written_files() {
    let dir = TempDir::new().unwrap();
    let (app_dir, out) = two_package_app(&dir);
    write(&app_dir.join("client/style.css"), "body { color: red; }\n");
    write(&app_dir.join("public/logo.txt"), "logo\n");

    let errors = run(&app_dir, &out, &no_minify());
    assert_eq!(errors, Vec::<String>::new());

    let app_json = read_app_json(&out);
    let html = fs::read_to_string(out.join("app.html")).unwrap();

    for entry in &app_json.manifest {
        let on_disk = fs::read(out.join(&entry.path)).unwrap();
        assert_eq!(sha1_hex(&on_disk), entry.hash, "hash mismatch for {}", entry.path);
        if let Some(size) = entry.size {
            assert_eq!(on_disk.len() as u64, size, "size mismatch for {}", entry.path);
        }
        match entry.kind {
            Some(ManifestKind::Js) => {
                let url = entry.url.as_deref().unwrap();
                assert!(
                    html.contains(&format!("<script type=\"text/javascript\" src=\"{url}\">")),
                    "script tag missing for {url}"
                );
            }
            Some(ManifestKind::Css) => {
                let url = entry.url.as_deref().unwrap();
                assert!(
                    html.contains(&format!("<link rel=\"stylesheet\" href=\"{url}\">")),
                    "link tag missing for {url}"
                );
            }
            _ => {}
        }
    }

    // The public asset was copied and recorded.
    assert!(app_json
        .manifest
        .iter()
        .any(|e| e.path == "static/logo.txt" && e.url.as_deref() == Some("/logo.txt")));
    assert_eq!(fs::read_to_string(out.join("static/logo.txt")).unwrap(), "logo\n");
}

#[test]
fn cycle_aborts_with_both_endpoints_named() {
    let dir = TempDir::new().unwrap();
    let app_dir = dir.path().join("app");
    let out = dir.path().join("build");
    write(
        &app_dir.join("packages/a/skiff.json"),
        r#"{"name": "a", "uses": ["b"]}"#,
    );
    write(
        &app_dir.join("packages/b/skiff.json"),
        r#"{"name": "b", "uses": ["a"]}"#,
    );
    write(&app_dir.join("main.js"), "1;\n");

    let errors = run(&app_dir, &out, &no_minify());
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("circular dependency between packages"));
    assert!(errors[0].contains('a') && errors[0].contains('b'));
    assert!(!out.exists(), "no bundle must be written on failure");
}

#[test]
fn unordered_edge_allows_mutual_use() {
    let dir = TempDir::new().unwrap();
    let app_dir = dir.path().join("app");
    let out = dir.path().join("build");
    write(
        &app_dir.join("packages/a/skiff.json"),
        r#"{"name": "a", "uses": ["b"], "unordered": ["b"], "sources": {"client": ["a.js"]}}"#,
    );
    write(&app_dir.join("packages/a/a.js"), "1;\n");
    write(
        &app_dir.join("packages/b/skiff.json"),
        r#"{"name": "b", "uses": ["a"], "sources": {"client": ["b.js"]}}"#,
    );
    write(&app_dir.join("packages/b/b.js"), "2;\n");

    let errors = run(&app_dir, &out, &no_minify());
    assert_eq!(errors, Vec::<String>::new());

    let urls = client_js_urls(&read_app_json(&out));
    let a_count = urls.iter().filter(|u| u.starts_with("/packages/a.js?")).count();
    let b_count = urls.iter().filter(|u| u.starts_with("/packages/b.js?")).count();
    assert_eq!((a_count, b_count), (1, 1));
}

#[test]
fn test_role_bundles_package_tests_against_production_exports() {
    let dir = TempDir::new().unwrap();
    let app_dir = dir.path().join("app");
    let out = dir.path().join("build");
    write(
        &app_dir.join("packages/a/skiff.json"),
        r#"{
            "name": "a",
            "uses": ["b"],
            "sources": {"client": ["a.js"]},
            "exports": {"client": ["A1"]},
            "test_uses": ["b"],
            "test_sources": {"client": ["a_tests.js"]}
        }"#,
    );
    write(&app_dir.join("packages/a/a.js"), "A1 = B1 + 1;\n");
    write(&app_dir.join("packages/a/a_tests.js"), "check(A1, B1);\n");
    write(
        &app_dir.join("packages/b/skiff.json"),
        r#"{"name": "b", "sources": {"client": ["b.js"]}, "exports": {"client": ["B1"]}}"#,
    );
    write(&app_dir.join("packages/b/b.js"), "B1 = 1;\n");
    write(&app_dir.join("client/app.js"), "go();\n");

    let mut options = no_minify();
    options.test_packages = vec!["a".to_string()];
    let errors = run(&app_dir, &out, &options);
    assert_eq!(errors, Vec::<String>::new());

    let urls = client_js_urls(&read_app_json(&out));
    let pos = |prefix: &str| {
        urls.iter()
            .position(|u| u.starts_with(prefix))
            .unwrap_or_else(|| panic!("{prefix} missing from {urls:?}"))
    };
    let use_b = pos("/packages/b.js?");
    let use_a = pos("/packages/a.js?");
    let test_a = pos("/package-tests/a.js?");
    assert!(use_b < use_a && use_a < test_a);

    // Test code imports from production-role exports.
    let tests_js =
        fs::read_to_string(out.join("static_cacheable/package-tests/a.js")).unwrap();
    assert!(tests_js.contains("var A1 = Package[\"a\"][\"A1\"];"));
    assert!(tests_js.contains("var B1 = Package[\"b\"][\"B1\"];"));
}

#[test]
fn minification_collapses_client_assets() {
    let dir = TempDir::new().unwrap();
    let app_dir = dir.path().join("app");
    let out = dir.path().join("build");
    write(&app_dir.join("client/one.js"), "// banner\nvar one = 1;\n");
    write(&app_dir.join("client/two.js"), "var two = 2;\n\n");
    write(&app_dir.join("client/style.css"), "body {\n  color: #ff0000;\n}\n");

    let errors = run(&app_dir, &out, &BundleOptions::default());
    assert_eq!(errors, Vec::<String>::new());

    let app_json = read_app_json(&out);
    let js_entries: Vec<_> = app_json
        .manifest
        .iter()
        .filter(|e| e.kind == Some(ManifestKind::Js))
        .collect();
    assert_eq!(js_entries.len(), 1);
    let js_entry = js_entries[0];
    assert_eq!(js_entry.cacheable, Some(true));

    // The single cacheable file is named by its own content hash.
    let url = js_entry.url.as_deref().unwrap();
    let contents = fs::read(out.join(&js_entry.path)).unwrap();
    assert_eq!(url, format!("/{}.js", sha1_hex(&contents)));
    assert_eq!(js_entry.size, Some(contents.len() as u64));

    // Comment lines are gone; both files made it in.
    let text = String::from_utf8(contents).unwrap();
    assert!(!text.contains("banner"));
    assert!(text.contains("var one = 1;"));
    assert!(text.contains("var two = 2;"));

    let css_entries: Vec<_> = app_json
        .manifest
        .iter()
        .filter(|e| e.kind == Some(ManifestKind::Css))
        .collect();
    assert_eq!(css_entries.len(), 1);
    let css = fs::read_to_string(out.join(&css_entries[0].path)).unwrap();
    assert!(css.len() < "body {\n  color: #ff0000;\n}\n".len());

    // Nothing non-cacheable remains on the client.
    assert!(!out.join("static/client").exists());
}

#[test]
fn rebundling_identical_inputs_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let (app_dir, _) = two_package_app(&dir);
    write(&app_dir.join("public/logo.txt"), "logo\n");
    let out_one = dir.path().join("build-one");
    let out_two = dir.path().join("build-two");

    assert_eq!(run(&app_dir, &out_one, &no_minify()), Vec::<String>::new());
    assert_eq!(run(&app_dir, &out_two, &no_minify()), Vec::<String>::new());

    let app_one = fs::read(out_one.join("app.json")).unwrap();
    let app_two = fs::read(out_two.join("app.json")).unwrap();
    assert_eq!(app_one, app_two);

    let deps_one = fs::read(out_one.join("dependencies.json")).unwrap();
    let deps_two = fs::read(out_two.join("dependencies.json")).unwrap();
    assert_eq!(deps_one, deps_two);
}

#[test]
fn server_css_produces_no_output_and_no_error() {
    let dir = TempDir::new().unwrap();
    let app_dir = dir.path().join("app");
    let out = dir.path().join("build");
    write(
        &app_dir.join("packages/styles/skiff.json"),
        r#"{"name": "styles", "sources": {"server": ["s.css"]}}"#,
    );
    write(&app_dir.join("packages/styles/s.css"), "body { margin: 0; }\n");
    write(&app_dir.join("main.js"), "1;\n");

    let errors = run(&app_dir, &out, &no_minify());
    assert_eq!(errors, Vec::<String>::new());

    let app_json = read_app_json(&out);
    assert_eq!(app_json.load, ["app/main.js"]);
    assert!(!app_json
        .manifest
        .iter()
        .any(|e| e.kind == Some(ManifestKind::Css)));
    assert!(!out.join("app/packages/styles/s.css").exists());
}

#[test]
fn failed_rebundle_leaves_previous_output_intact() {
    let dir = TempDir::new().unwrap();
    let app_dir = dir.path().join("app");
    let out = dir.path().join("build");
    write(&app_dir.join("main.js"), "console.log('v1');\n");

    assert_eq!(run(&app_dir, &out, &no_minify()), Vec::<String>::new());
    let first = fs::read(out.join("app.json")).unwrap();

    // Now the app depends on a package that does not exist.
    write(&app_dir.join("skiff.json"), r#"{"uses": ["ghost"]}"#);
    let errors = run(&app_dir, &out, &no_minify());
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("unknown package: ghost"));

    assert_eq!(fs::read(out.join("app.json")).unwrap(), first);
}

#[test]
fn dependencies_json_records_inputs_for_the_watcher() {
    let dir = TempDir::new().unwrap();
    let (app_dir, out) = two_package_app(&dir);

    assert_eq!(run(&app_dir, &out, &no_minify()), Vec::<String>::new());

    let deps: DependenciesJson =
        serde_json::from_slice(&fs::read(out.join("dependencies.json")).unwrap()).unwrap();
    assert_eq!(deps.app, ["client/app.js"]);
    assert_eq!(deps.packages["a"], ["a.js"]);
    assert_eq!(deps.packages["b"], ["b.js"]);
    assert_eq!(deps.extensions, ["css", "js"]);
    assert!(deps.exclude.iter().any(|p| p == "~$"));
}

/// A handler that emits one head fragment plus an uppercased static
/// copy of its source file.
struct ShoutHandler;

impl SourceHandler for ShoutHandler {
    fn handle(&self, sink: &mut dyn EmitSink, input: &HandlerInput<'_>) -> skiff_pack::Result<()> {
        let text = std::fs::read_to_string(input.source_path)
            .map_err(|e| skiff_pack::Error::io(input.source_path, e))?;
        sink.emit(EmitOptions {
            kind: ResourceKind::Head,
            envs: vec![Env::Client],
            serve_path: None,
            source: DataSource::Text(format!("<meta name=\"shout\" content=\"{}\">\n", text.trim())),
        })?;
        sink.emit(EmitOptions {
            kind: ResourceKind::Static,
            envs: vec![input.env],
            serve_path: Some(input.serve_path.to_string()),
            source: DataSource::Text(text.to_uppercase()),
        })
    }
}

#[test]
fn extension_handlers_drive_resource_emission() {
    let dir = TempDir::new().unwrap();
    let app_dir = dir.path().join("app");
    let out = dir.path().join("build");
    write(&app_dir.join("client/greeting.shout"), "hello\n");

    let app = Arc::new(
        Package::builder(PackageId::new(0), None, &app_dir)
            .sources(Role::Use, Env::Client, ["client/greeting.shout"])
            .handler("shout", Arc::new(ShoutHandler))
            .build(),
    );
    let loader = StaticLoader::new(app, []);
    let errors = bundle(&app_dir, &out, &loader, &no_minify());
    assert_eq!(errors, Vec::<String>::new());

    let html = fs::read_to_string(out.join("app.html")).unwrap();
    assert!(html.contains("<meta name=\"shout\" content=\"hello\">"));
    assert_eq!(
        fs::read_to_string(out.join("static/client/greeting.shout")).unwrap(),
        "HELLO\n"
    );
}

#[test]
fn unhandled_extensions_become_static_resources() {
    let dir = TempDir::new().unwrap();
    let app_dir = dir.path().join("app");
    let out = dir.path().join("build");
    write(&app_dir.join("client/notes.txt"), "plain text\n");
    write(&app_dir.join("main.js"), "1;\n");

    let app = Arc::new(
        Package::builder(PackageId::new(0), None, &app_dir)
            .sources(Role::Use, Env::Client, ["client/notes.txt"])
            .sources(Role::Use, Env::Server, ["main.js"])
            .default_handlers()
            .build(),
    );
    let loader = StaticLoader::new(app, []);
    let errors = bundle(&app_dir, &out, &loader, &no_minify());
    assert_eq!(errors, Vec::<String>::new());

    assert_eq!(
        fs::read_to_string(out.join("static/client/notes.txt")).unwrap(),
        "plain text\n"
    );
    let app_json = read_app_json(&out);
    assert!(app_json
        .manifest
        .iter()
        .any(|e| e.path == "static/client/notes.txt"
            && e.kind == Some(ManifestKind::Static)
            && e.cacheable == Some(false)));
}

#[test]
fn release_name_is_recorded_in_app_json() {
    let dir = TempDir::new().unwrap();
    let app_dir = dir.path().join("app");
    let out = dir.path().join("build");
    write(&app_dir.join("main.js"), "1;\n");

    let mut options = no_minify();
    options.release = skiff_pack::Release::parse("0.9.1");
    let errors = run(&app_dir, &out, &options);
    assert_eq!(errors, Vec::<String>::new());
    assert_eq!(read_app_json(&out).release.as_deref(), Some("0.9.1"));
}

#[test]
fn missing_native_modules_are_a_fatal_error() {
    let dir = TempDir::new().unwrap();
    let app_dir = dir.path().join("app");
    let out = dir.path().join("build");
    write(
        &app_dir.join("packages/db/skiff.json"),
        r#"{"name": "db", "native_dependencies": {"leveldb": "1.0.0"}}"#,
    );
    write(&app_dir.join("main.js"), "1;\n");

    let errors = run(&app_dir, &out, &no_minify());
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("native modules"));

    // With the prebuilt tree present the bundle goes through; the tree
    // itself is skipped because nothing under app/ hosts it.
    write(&app_dir.join("packages/db/node_modules/leveldb/index.js"), "x\n");
    let errors = run(&app_dir, &out, &no_minify());
    assert_eq!(errors, Vec::<String>::new());
    assert!(!out.join("app/packages/db/node_modules").exists());
}
