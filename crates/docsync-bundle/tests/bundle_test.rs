use docsync_bundle::{
    compute_digest, verify_digest, Error, PackageSpec, Wheel, WheelBuilder, WheelFilename,
    WorkerManifest,
};
use tempfile::TempDir;

#[test]
fn wheel_builder_writes_conventional_file_name() {
    let temp = TempDir::new().unwrap();

    let path = WheelBuilder::new("pkg-a", "1.0")
        .with_file("pkg_a/__init__.py", b"VALUE = 1\n")
        .write_to_dir(temp.path())
        .unwrap();

    let file_name = path.file_name().unwrap().to_string_lossy().to_string();
    assert_eq!(file_name, "pkg_a-1.0-py3-none-any.whl");

    let parsed = WheelFilename::parse(&file_name).unwrap();
    assert!(parsed.matches("pkg-a", Some("1.0")));

    let bytes = std::fs::read(&path).unwrap();
    let wheel = Wheel::from_bytes(&bytes).unwrap();
    assert_eq!(wheel.name(), "pkg-a");
    assert_eq!(wheel.version(), "1.0");
    assert_eq!(wheel.files().len(), 3);
}

#[test]
fn wheel_builder_requires_name_and_version() {
    let err = WheelBuilder::new("", "1.0").to_bytes().unwrap_err();
    assert!(matches!(err, Error::InvalidWheel(_)));
}

#[test]
fn manifest_hash_matches_built_wheel() {
    let bytes = WheelBuilder::new("pkgB", "2.0").to_bytes().unwrap();
    let digest = compute_digest(&bytes);

    let text = format!(
        r#"
[worker]
name = "hashed"
runtime = "native"

[[packages]]
locator = "pkgB-2.0-py3-none-any.whl"
hash = "{}"

[application]
entry = "demo"
location = false
"#,
        digest
    );

    let manifest = WorkerManifest::from_toml(text.as_bytes()).unwrap();
    let package = &manifest.packages[0];
    assert_eq!(package.display_name(), "pkgB");
    assert!(!manifest.application.location);

    let expected = package.hash.as_deref().unwrap();
    verify_digest(&bytes, expected).unwrap();

    let tampered = WheelBuilder::new("pkgB", "2.0")
        .with_file("extra.txt", b"tampered")
        .to_bytes()
        .unwrap();
    assert!(matches!(
        verify_digest(&tampered, expected),
        Err(Error::DigestMismatch { .. })
    ));
}

#[test]
fn manifest_survives_toml_serialization() {
    let text = r#"
[worker]
name = "roundtrip"

[[packages]]
locator = "https://cdn.example.com/wheels/bokeh-2.4.3-py3-none-any.whl"

[application]
entry = "demo"
requires = ["bokeh"]

[application.bindings]
title = "Demo"
columns = 3
"#;

    let manifest = WorkerManifest::from_toml(text.as_bytes()).unwrap();
    let rendered = manifest.to_toml().unwrap();
    let reparsed = WorkerManifest::from_toml(rendered.as_bytes()).unwrap();

    assert_eq!(reparsed.packages, manifest.packages);
    assert_eq!(reparsed.application.requires, vec!["bokeh".to_string()]);
    assert_eq!(
        reparsed.application.binding::<u32>("columns").unwrap(),
        Some(3)
    );
}

#[test]
fn package_spec_builder_attaches_hash() {
    let spec = PackageSpec::new("pkgA==1.0").with_hash("blake3:00");
    assert_eq!(spec.hash.as_deref(), Some("blake3:00"));
}
